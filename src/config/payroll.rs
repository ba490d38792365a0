use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Payroll engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct PayrollConfig {
    /// Threads for per-employee computation
    pub workers: usize,
    /// Extra YAML tax tables published on top of the built-in ones
    pub tax_table_dir: Option<PathBuf>,
}

impl PayrollConfig {
    pub fn from_env() -> Result<Self> {
        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Ok(PayrollConfig {
            workers: match env::var("PAYROLL_WORKERS") {
                Ok(value) => value
                    .parse()
                    .map_err(|_| AppError::Configuration("Invalid PAYROLL_WORKERS".to_string()))?,
                Err(_) => default_workers,
            },
            tax_table_dir: env::var("TAX_TABLE_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(AppError::Configuration(
                "PAYROLL_WORKERS must be greater than 0".to_string(),
            ));
        }

        if let Some(dir) = &self.tax_table_dir {
            if !dir.is_dir() {
                return Err(AppError::Configuration(format!(
                    "TAX_TABLE_DIR {} is not a directory",
                    dir.display()
                )));
            }
        }

        Ok(())
    }
}
