use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::core::{AppError, Result};
use crate::modules::advances::models::PayAdvance;
use crate::modules::advances::repositories::AdvanceRepository;
use crate::modules::employees::repositories::EmployeeDirectory;

/// Request and decision workflow for pay advances.
///
/// Recovery through payroll (attach, deducted) is driven by
/// [`PayrollService`](crate::modules::payroll::services::PayrollService).
pub struct AdvanceService {
    repository: Arc<dyn AdvanceRepository>,
    directory: Arc<dyn EmployeeDirectory>,
}

impl AdvanceService {
    pub fn new(repository: Arc<dyn AdvanceRepository>, directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self {
            repository,
            directory,
        }
    }

    /// Record an employee's request for an advance
    ///
    /// # Arguments
    /// * `practice_id` - Practice the employee works for
    /// * `employee_id` - Requesting employee; must be active in that practice
    /// * `amount` - Positive amount with at most two decimals
    /// * `reason` - Optional free text
    pub async fn request(
        &self,
        practice_id: &str,
        employee_id: &str,
        amount: Decimal,
        reason: Option<String>,
    ) -> Result<PayAdvance> {
        let employee = self
            .directory
            .find_employee(employee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Employee {}", employee_id)))?;

        if employee.practice_id != practice_id {
            return Err(AppError::validation(format!(
                "Employee {} does not belong to practice {}",
                employee_id, practice_id
            )));
        }
        if !employee.active {
            return Err(AppError::validation(format!(
                "Employee {} is not active",
                employee_id
            )));
        }

        let advance = PayAdvance::request(
            practice_id.to_string(),
            employee_id.to_string(),
            amount,
            reason,
        )?;
        self.repository.insert(&advance).await?;

        info!(
            advance_id = advance.id.as_str(),
            employee_id = employee_id,
            amount = %amount,
            "Pay advance requested"
        );

        Ok(advance)
    }

    pub async fn approve(&self, advance_id: &str) -> Result<PayAdvance> {
        let mut advance = self.get(advance_id).await?;
        advance.approve()?;
        self.repository.update(&advance).await?;

        info!(advance_id = advance_id, "Pay advance approved");
        Ok(advance)
    }

    pub async fn reject(&self, advance_id: &str) -> Result<PayAdvance> {
        let mut advance = self.get(advance_id).await?;
        advance.reject()?;
        self.repository.update(&advance).await?;

        info!(advance_id = advance_id, "Pay advance rejected");
        Ok(advance)
    }

    pub async fn get(&self, advance_id: &str) -> Result<PayAdvance> {
        self.repository
            .find(advance_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Pay advance {}", advance_id)))
    }

    pub async fn for_employee(&self, employee_id: &str) -> Result<Vec<PayAdvance>> {
        self.repository.for_employee(employee_id).await
    }
}
