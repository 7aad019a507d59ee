use serde::{Deserialize, Deserializer, Serialize};

use super::error::{LoanError, LoanResult};
use super::types::LoanRequest;

pub const MIN_PRINCIPAL: f64 = 100.0;
pub const MAX_PRINCIPAL: f64 = 1_000_000_000.0;
pub const MIN_RATE_PERCENT: f64 = 2.0;
pub const MAX_RATE_PERCENT: f64 = 20.0;
pub const DEFAULT_MAX_TERM_MONTHS: u32 = 1200;

/// The four user-facing input fields, exactly as submitted.
///
/// JSON clients may send numbers instead of strings; they are kept in their textual form so
/// every transport goes through the same parser.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoanForm {
    #[serde(
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub loan_amount: Option<String>,
    #[serde(
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub interest_rate: Option<String>,
    #[serde(
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenure_years: Option<String>,
    #[serde(
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenure_months: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawField {
    Text(String),
    Number(serde_json::Number),
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawField>::deserialize(deserializer)?.map(|raw| match raw {
        RawField::Text(text) => text,
        RawField::Number(number) => number.to_string(),
    }))
}

/// Numeric terms after parsing, before the range policy runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanTerms {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub term_months: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    pub max_term_months: u32,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_term_months: DEFAULT_MAX_TERM_MONTHS,
        }
    }
}

impl LoanForm {
    /// Drops empty fields so the form round-trips cleanly through a share link.
    pub fn normalized(&self) -> LoanForm {
        LoanForm {
            loan_amount: present(&self.loan_amount).map(str::to_string),
            interest_rate: present(&self.interest_rate).map(str::to_string),
            tenure_years: present(&self.tenure_years).map(str::to_string),
            tenure_months: present(&self.tenure_months).map(str::to_string),
        }
    }

    pub fn parse(&self) -> LoanResult<LoanTerms> {
        let (Some(amount), Some(rate)) = (present(&self.loan_amount), present(&self.interest_rate))
        else {
            return Err(LoanError::MissingInput);
        };
        let years = present(&self.tenure_years);
        let months = present(&self.tenure_months);
        if years.is_none() && months.is_none() {
            return Err(LoanError::MissingInput);
        }

        let principal = parse_real(amount, "loan_amount")?;
        let annual_rate_percent = parse_real(rate, "interest_rate")?;
        let term_months = match (years, months) {
            (Some(years), _) => parse_int(years, "tenure_years")?
                .checked_mul(12)
                .ok_or(LoanError::MalformedNumber {
                    field: "tenure_years",
                })?,
            (None, Some(months)) => parse_int(months, "tenure_months")?,
            (None, None) => return Err(LoanError::MissingInput),
        };

        Ok(LoanTerms {
            principal,
            annual_rate_percent,
            term_months,
        })
    }

    pub fn validate(&self, policy: &ValidationPolicy) -> LoanResult<LoanRequest> {
        self.parse()?.validate(policy)
    }
}

impl LoanTerms {
    pub fn validate(self, policy: &ValidationPolicy) -> LoanResult<LoanRequest> {
        if !(MIN_PRINCIPAL..=MAX_PRINCIPAL).contains(&self.principal) {
            return Err(out_of_range(
                "Loan amount must be between 100 and 1,000,000,000.",
            ));
        }
        if !(MIN_RATE_PERCENT..=MAX_RATE_PERCENT).contains(&self.annual_rate_percent) {
            return Err(out_of_range("Interest rate must be between 2% and 20%."));
        }
        if self.term_months < 1 {
            return Err(out_of_range("Loan tenure must be at least 1 month."));
        }
        let term_months = u32::try_from(self.term_months)
            .ok()
            .filter(|months| *months <= policy.max_term_months)
            .ok_or_else(|| {
                out_of_range(&format!(
                    "Loan tenure must not exceed {} months.",
                    policy.max_term_months
                ))
            })?;

        Ok(LoanRequest {
            principal: self.principal,
            annual_rate_percent: self.annual_rate_percent,
            term_months,
        })
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_real(raw: &str, field: &'static str) -> LoanResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(LoanError::MalformedNumber { field })
}

fn parse_int(raw: &str, field: &'static str) -> LoanResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| LoanError::MalformedNumber { field })
}

fn out_of_range(message: &str) -> LoanError {
    LoanError::OutOfRange {
        message: message.to_string(),
    }
}
