use csv::{Terminator, WriterBuilder};

use crate::core::{LoanCalculation, LoanError, LoanResult, Summary};

pub const REPORT_FILE_NAME: &str = "emi_report.csv";

const SCHEDULE_HEADER: [&str; 7] = [
    "Year",
    "Month",
    "Principal",
    "Interest",
    "Total Payment",
    "Balance",
    "Loan Paid To Date (%)",
];

/// Renders the downloadable report: a summary block, a blank record, then the schedule table.
///
/// `summary` overrides the calculation's own summary when the caller already showed the user
/// a set of totals and wants the document to repeat them.
pub fn render_csv(calculation: &LoanCalculation, summary: Option<&Summary>) -> LoanResult<Vec<u8>> {
    let summary = summary.unwrap_or(&calculation.summary);
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(["Loan Amount", money(calculation.loan_amount).as_str()])?;
    writer.write_record(["Interest Rate (%)", calculation.interest_rate.to_string().as_str()])?;
    writer.write_record(["Tenure (months)", calculation.tenure_months.to_string().as_str()])?;
    writer.write_record(["EMI", whole(summary.installment_amount).as_str()])?;
    writer.write_record(["Total Interest", whole(summary.total_interest).as_str()])?;
    writer.write_record(["Total Payment", whole(summary.total_payment).as_str()])?;
    writer.write_record([""])?;

    writer.write_record(SCHEDULE_HEADER)?;
    for record in &calculation.schedule {
        writer.write_record([
            record.year.to_string(),
            record.month.to_string(),
            money(record.principal_portion),
            money(record.interest_portion),
            money(record.installment_amount),
            money(record.remaining_balance),
            money(record.percent_paid_to_date),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| LoanError::Export(e.to_string()))
}

/// Plain-text rendering for the terminal: summary lines followed by a fixed-width schedule.
pub fn render_table(calculation: &LoanCalculation) -> String {
    let summary = &calculation.summary;
    let mut out = format!(
        "Loan amount    {}\nInterest rate  {}%\nTenure         {} months\n\nEMI            {}\nTotal interest {}\nTotal payment  {}\n\n",
        money(calculation.loan_amount),
        calculation.interest_rate,
        calculation.tenure_months,
        whole(summary.installment_amount),
        whole(summary.total_interest),
        whole(summary.total_payment),
    );
    out.push_str(&format!(
        "{:>6} {:>5} {:>16} {:>16} {:>16} {:>18} {:>8}\n",
        "Year", "Month", "Principal", "Interest", "Total Payment", "Balance", "Paid %"
    ));
    for record in &calculation.schedule {
        out.push_str(&format!(
            "{:>6} {:>5} {:>16.2} {:>16.2} {:>16.2} {:>18.2} {:>8.2}\n",
            record.year,
            record.month,
            record.principal_portion,
            record.interest_portion,
            record.installment_amount,
            record.remaining_balance,
            record.percent_paid_to_date,
        ));
    }
    out
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn whole(value: f64) -> String {
    format!("{value:.0}")
}
