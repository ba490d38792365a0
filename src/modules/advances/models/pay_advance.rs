use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::money::validate_amount;
use crate::core::{AppError, Result};

/// Pay advance lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    /// Requested by the employee, awaiting a decision
    Pending,
    /// Approved, waiting to be recovered through payroll
    Approved,
    Rejected,
    /// Recovered by a paid payroll run
    Deducted,
}

impl AdvanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deducted => "deducted",
        }
    }
}

impl std::fmt::Display for AdvanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for AdvanceStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "deducted" => Ok(Self::Deducted),
            _ => Err(format!("Invalid pay advance status: {}", value)),
        }
    }
}

/// An employee-initiated salary advance.
///
/// Once approved it is pulled into the next payroll run as a deduction
/// (`attach`), and marked deducted when that run is paid. An advance can be
/// attached to one run only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayAdvance {
    pub id: String,
    pub practice_id: String,
    pub employee_id: String,
    pub amount: Decimal,
    pub status: AdvanceStatus,
    pub reason: Option<String>,
    /// Run that recovers this advance
    pub run_id: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub deducted_at: Option<DateTime<Utc>>,
}

impl PayAdvance {
    /// Create a pending request
    pub fn request(
        practice_id: String,
        employee_id: String,
        amount: Decimal,
        reason: Option<String>,
    ) -> Result<Self> {
        validate_amount("Advance amount", amount)?;
        if amount == Decimal::ZERO {
            return Err(AppError::validation("Advance amount must be positive"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            practice_id,
            employee_id,
            amount,
            status: AdvanceStatus::Pending,
            reason,
            run_id: None,
            requested_at: Utc::now(),
            decided_at: None,
            deducted_at: None,
        })
    }

    pub fn approve(&mut self) -> Result<()> {
        self.decide(AdvanceStatus::Approved)
    }

    pub fn reject(&mut self) -> Result<()> {
        self.decide(AdvanceStatus::Rejected)
    }

    fn decide(&mut self, outcome: AdvanceStatus) -> Result<()> {
        if self.status != AdvanceStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "Pay advance {} is {}, only pending advances can be {}",
                self.id, self.status, outcome
            )));
        }
        self.status = outcome;
        self.decided_at = Some(Utc::now());
        Ok(())
    }

    /// Approved, not yet recovered, and free or already held by `run_id`
    pub fn is_eligible_for(&self, run_id: &str) -> bool {
        self.status == AdvanceStatus::Approved
            && self.run_id.as_deref().map_or(true, |held| held == run_id)
    }

    /// Hold the advance for recovery by a run; idempotent for the same run
    pub fn attach(&mut self, run_id: &str) -> Result<()> {
        if self.status != AdvanceStatus::Approved {
            return Err(AppError::invalid_state(format!(
                "Pay advance {} is {} and cannot be attached to a run",
                self.id, self.status
            )));
        }
        match self.run_id.as_deref() {
            Some(held) if held != run_id => Err(AppError::invalid_state(format!(
                "Pay advance {} is already attached to run {}",
                self.id, held
            ))),
            _ => {
                self.run_id = Some(run_id.to_string());
                Ok(())
            }
        }
    }

    /// Release the hold when a draft run is deleted or regenerated without it
    pub fn detach(&mut self, run_id: &str) {
        if self.status == AdvanceStatus::Approved && self.run_id.as_deref() == Some(run_id) {
            self.run_id = None;
        }
    }

    /// One-shot transition once the holding run is paid
    pub fn mark_deducted(&mut self, run_id: &str, at: DateTime<Utc>) -> Result<()> {
        if self.status != AdvanceStatus::Approved || self.run_id.as_deref() != Some(run_id) {
            return Err(AppError::invalid_state(format!(
                "Pay advance {} ({}) is not held by run {}",
                self.id, self.status, run_id
            )));
        }
        self.status = AdvanceStatus::Deducted;
        self.deducted_at = Some(at);
        Ok(())
    }
}
