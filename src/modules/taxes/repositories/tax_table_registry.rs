use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{AppError, PayPeriod, Result};
use crate::modules::taxes::models::TaxYear;

/// Tables shipped with the crate
const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("2022-2023.yaml", include_str!("../../../../tax_tables/2022-2023.yaml")),
    ("2023-2024.yaml", include_str!("../../../../tax_tables/2023-2024.yaml")),
    ("2024-2025.yaml", include_str!("../../../../tax_tables/2024-2025.yaml")),
    ("2025-2026.yaml", include_str!("../../../../tax_tables/2025-2026.yaml")),
];

/// Registry of published tax years.
///
/// A tax year id can be published once. Publishing the same contents again
/// is a no-op; publishing different contents under an existing id is a
/// configuration error, so a later table never rewrites history.
#[derive(Debug, Clone, Default)]
pub struct TaxTableRegistry {
    years: BTreeMap<String, Arc<TaxYear>>,
}

impl TaxTableRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in tables
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        for (name, source) in BUILTIN_TABLES {
            let tax_year = TaxYear::from_yaml(source).map_err(|e| {
                AppError::configuration(format!("Built-in tax table {} is invalid: {}", name, e))
            })?;
            registry.publish(tax_year)?;
        }
        Ok(registry)
    }

    /// Publish a tax year; its version is always re-derived from the contents
    pub fn publish(&mut self, tax_year: TaxYear) -> Result<Arc<TaxYear>> {
        let tax_year = tax_year.sealed()?;

        if let Some(existing) = self.years.get(&tax_year.id) {
            if existing.version == tax_year.version {
                return Ok(Arc::clone(existing));
            }
            return Err(AppError::configuration(format!(
                "Tax year {} is already published with version {}; refusing version {}",
                tax_year.id, existing.version, tax_year.version
            )));
        }

        if let Some(overlap) = self.years.values().find(|other| {
            tax_year.starts_on <= other.ends_on && other.starts_on <= tax_year.ends_on
        }) {
            return Err(AppError::configuration(format!(
                "Tax year {} overlaps published tax year {}",
                tax_year.id, overlap.id
            )));
        }

        info!(
            tax_year = tax_year.id.as_str(),
            version = tax_year.version.as_str(),
            "Published tax table"
        );

        let tax_year = Arc::new(tax_year);
        self.years.insert(tax_year.id.clone(), Arc::clone(&tax_year));
        Ok(tax_year)
    }

    /// Load every `.yaml`/`.yml` file in a directory
    ///
    /// Returns the number of tables published.
    pub fn load_dir(&mut self, path: &Path) -> Result<usize> {
        if !path.is_dir() {
            return Err(AppError::configuration(format!(
                "Tax table directory {} does not exist",
                path.display()
            )));
        }

        let mut files: Vec<_> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|ext| ext == "yaml" || ext == "yml")
                        .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut published = 0;
        for file in files {
            let source = std::fs::read_to_string(&file)?;
            let tax_year = TaxYear::from_yaml(&source).map_err(|e| {
                warn!(file = %file.display(), error = %e, "Rejected tax table");
                AppError::configuration(format!("{}: {}", file.display(), e))
            })?;
            self.publish(tax_year)?;
            published += 1;
        }

        Ok(published)
    }

    /// Look up a tax year by id; unknown ids are fatal configuration errors
    pub fn get(&self, id: &str) -> Result<Arc<TaxYear>> {
        self.years.get(id).cloned().ok_or_else(|| {
            AppError::configuration(format!("Tax year {} is not published", id))
        })
    }

    /// The tax year covering a pay period
    pub fn for_period(&self, period: PayPeriod) -> Result<Arc<TaxYear>> {
        self.get(&period.tax_year_id())
            .and_then(|ty| {
                if ty.contains(period) {
                    Ok(ty)
                } else {
                    Err(AppError::configuration(format!(
                        "Tax year {} does not cover period {}",
                        ty.id, period
                    )))
                }
            })
    }

    /// Published ids in ascending order
    pub fn ids(&self) -> Vec<String> {
        self.years.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}
