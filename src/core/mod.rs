pub mod clock;
mod engine;
mod error;
mod types;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{calculate, compute_breakdown, compute_emi, compute_schedule, compute_summary};
pub use error::{LoanError, LoanResult};
pub use types::{
    Breakdown, BreakdownSlice, LoanCalculation, LoanRequest, PeriodRecord, StartPeriod, Summary,
};
pub use validation::{LoanForm, LoanTerms, ValidationPolicy};
