use super::clock::month_abbreviation;
use super::error::{LoanError, LoanResult};
use super::types::{
    Breakdown, BreakdownSlice, LoanCalculation, LoanRequest, PeriodRecord, StartPeriod, Summary,
};

/// Fixed-payment annuity installment for `request`, unrounded.
pub fn compute_emi(request: &LoanRequest) -> LoanResult<f64> {
    let monthly_rate = request.monthly_rate();
    if !monthly_rate.is_finite() || monthly_rate <= 0.0 {
        return Err(LoanError::Domain(format!(
            "monthly rate must be > 0, got {monthly_rate}"
        )));
    }
    if request.term_months == 0 {
        return Err(LoanError::Domain("term must be >= 1 month".to_string()));
    }

    let growth = (1.0 + monthly_rate).powf(request.term_months as f64);
    Ok(request.principal * monthly_rate * growth / (growth - 1.0))
}

pub fn compute_schedule(request: &LoanRequest, start: StartPeriod) -> LoanResult<Vec<PeriodRecord>> {
    let installment = compute_emi(request)?;
    let monthly_rate = request.monthly_rate();
    month_label(start.month)?;

    let mut schedule = Vec::with_capacity(request.term_months as usize);
    let mut balance = request.principal;
    let mut principal_paid = 0.0;
    let mut year = start.year;
    let mut month = start.month;

    for _ in 0..request.term_months {
        let interest_portion = balance * monthly_rate;
        let principal_portion = installment - interest_portion;
        balance -= principal_portion;
        principal_paid += principal_portion;

        schedule.push(PeriodRecord {
            year,
            month: month_label(month)?,
            principal_portion: round_cents(principal_portion),
            interest_portion: round_cents(interest_portion),
            installment_amount: round_cents(installment),
            remaining_balance: round_cents(balance),
            percent_paid_to_date: round_cents(principal_paid / request.principal * 100.0),
        });

        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }

    Ok(schedule)
}

/// Headline totals. Computed from the exact installment, never from the schedule rows.
pub fn compute_summary(request: &LoanRequest) -> LoanResult<Summary> {
    let installment = compute_emi(request)?;
    let total_payment = installment * request.term_months as f64;
    let total_interest = total_payment - request.principal;

    Ok(Summary {
        installment_amount: round_whole(installment),
        total_interest: round_whole(total_interest),
        total_payment: round_whole(total_payment),
    })
}

pub fn compute_breakdown(request: &LoanRequest, summary: &Summary) -> Breakdown {
    Breakdown {
        title: "Break-up of Total Payment",
        slices: vec![
            BreakdownSlice {
                label: "Total Interest",
                value: summary.total_interest,
            },
            BreakdownSlice {
                label: "Principal Loan Amount",
                value: request.principal,
            },
        ],
    }
}

pub fn calculate(request: &LoanRequest, start: StartPeriod) -> LoanResult<LoanCalculation> {
    let summary = compute_summary(request)?;
    let schedule = compute_schedule(request, start)?;
    log::debug!(
        "computed {} periods for principal {} at {}%",
        schedule.len(),
        request.principal,
        request.annual_rate_percent
    );

    Ok(LoanCalculation {
        loan_amount: request.principal,
        interest_rate: request.annual_rate_percent,
        tenure_months: request.term_months,
        breakdown: compute_breakdown(request, &summary),
        summary,
        schedule,
    })
}

fn month_label(month: u32) -> LoanResult<&'static str> {
    month_abbreviation(month).ok_or_else(|| {
        LoanError::Domain(format!("start month must be between 1 and 12, got {month}"))
    })
}

// Half-to-even rounding; `+ 0.0` folds a negative zero into positive zero.
fn round_whole(value: f64) -> f64 {
    value.round_ties_even() + 0.0
}

// `{:.2}` rounds the exact binary value half-to-even, so ties are never decided twice.
fn round_cents(value: f64) -> f64 {
    format!("{value:.2}").parse::<f64>().unwrap_or(value) + 0.0
}
