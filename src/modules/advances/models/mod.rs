pub mod pay_advance;

pub use pay_advance::{AdvanceStatus, PayAdvance};
