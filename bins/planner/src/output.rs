//! Rendering of command results.

use tabled::{Table, builder::Builder};

use crate::OutputFormat;
use crate::quote::Quote;

/// Render a quote in the requested format.
pub fn render(quote: &Quote, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(quote)?),
        OutputFormat::Table => Ok(render_table(quote)),
    }
}

fn render_table(quote: &Quote) -> String {
    let schedule = &quote.schedule;

    let mut rows = Builder::default();
    rows.push_record(["#", "Due", "Principal", "Interest", "Total", "Remaining"]);
    for installment in &schedule.installments {
        rows.push_record([
            installment.number.to_string(),
            installment.due_date.to_string(),
            installment.principal_portion.to_string(),
            installment.interest_portion.to_string(),
            installment.total_amount.to_string(),
            installment.remaining_principal_after.to_string(),
        ]);
    }

    let mut totals = Builder::default();
    totals.push_record(["Field", "Value"]);
    for (field, value) in [
        ("requested_amount", quote.requested_amount),
        ("down_payment", quote.down_payment),
        ("financed", schedule.principal),
        ("annual_rate_percent", quote.annual_interest_rate_percent),
        ("monthly_rate", schedule.monthly_rate),
        ("installment_amount", schedule.installment_amount),
        ("total_interest", schedule.total_interest),
        ("total_payable", schedule.total_payable),
    ] {
        totals.push_record([field.to_string(), value.to_string()]);
    }

    format!("{}\n\n{}", Table::from(totals), Table::from(rows))
}
