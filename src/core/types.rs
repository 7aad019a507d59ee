use serde::Serialize;

/// Validated loan input. Construct through `core::validation` or directly in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanRequest {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub term_months: u32,
}

impl LoanRequest {
    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate_percent / 12.0 / 100.0
    }
}

/// Calendar month the schedule starts at. `month` is 1-based.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StartPeriod {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub year: i32,
    pub month: &'static str,
    pub principal_portion: f64,
    pub interest_portion: f64,
    pub installment_amount: f64,
    pub remaining_balance: f64,
    pub percent_paid_to_date: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub installment_amount: f64,
    pub total_interest: f64,
    pub total_payment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownSlice {
    pub label: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub title: &'static str,
    pub slices: Vec<BreakdownSlice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanCalculation {
    pub loan_amount: f64,
    pub interest_rate: f64,
    pub tenure_months: u32,
    pub summary: Summary,
    pub breakdown: Breakdown,
    pub schedule: Vec<PeriodRecord>,
}
