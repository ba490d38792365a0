use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payroll_entry::AdditionKind;

/// Who bears a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contributor {
    Employee,
    Employer,
}

/// One figure on a payroll entry.
///
/// Closed set: every earning, deduction and employer contribution the engine
/// produces is one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    Paye {
        amount: Decimal,
    },
    Uif {
        amount: Decimal,
        contributor: Contributor,
    },
    Pension {
        amount: Decimal,
    },
    MedicalAid {
        amount: Decimal,
    },
    Other {
        label: String,
        amount: Decimal,
    },
    PayAdvance {
        advance_id: String,
        amount: Decimal,
    },
    Addition {
        addition_kind: AdditionKind,
        description: String,
        amount: Decimal,
    },
    Sdl {
        amount: Decimal,
    },
}

impl LineItem {
    pub fn amount(&self) -> Decimal {
        match self {
            LineItem::Paye { amount }
            | LineItem::Uif { amount, .. }
            | LineItem::Pension { amount }
            | LineItem::MedicalAid { amount }
            | LineItem::Other { amount, .. }
            | LineItem::PayAdvance { amount, .. }
            | LineItem::Addition { amount, .. }
            | LineItem::Sdl { amount } => *amount,
        }
    }

    pub fn contributor(&self) -> Contributor {
        match self {
            LineItem::Uif { contributor, .. } => *contributor,
            LineItem::Sdl { .. } => Contributor::Employer,
            _ => Contributor::Employee,
        }
    }

    /// Withheld from the employee's pay
    pub fn is_deduction(&self) -> bool {
        !matches!(self, LineItem::Addition { .. }) && self.contributor() == Contributor::Employee
    }

    /// Paid by the employer on top of remuneration
    pub fn is_employer_contribution(&self) -> bool {
        self.contributor() == Contributor::Employer
    }

    /// Label for payslips and exports
    pub fn label(&self) -> String {
        match self {
            LineItem::Paye { .. } => "PAYE".to_string(),
            LineItem::Uif { contributor: Contributor::Employee, .. } => "UIF (employee)".to_string(),
            LineItem::Uif { contributor: Contributor::Employer, .. } => "UIF (employer)".to_string(),
            LineItem::Pension { .. } => "Pension fund".to_string(),
            LineItem::MedicalAid { .. } => "Medical aid".to_string(),
            LineItem::Other { label, .. } => label.clone(),
            LineItem::PayAdvance { .. } => "Pay advance recovery".to_string(),
            LineItem::Addition { description, .. } => description.clone(),
            LineItem::Sdl { .. } => "Skills development levy".to_string(),
        }
    }
}
