//! The `quote` command.

use anyhow::ensure;
use chrono::{NaiveDate, Utc};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use medfin_core::financing::{AmortizationSchedule, ScheduleGenerator};
use medfin_shared::FinancingConfig;

/// Arguments of `planner quote`.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Treatment amount before the down payment
    #[arg(long)]
    pub amount: Decimal,

    /// Nominal annual interest rate in percent (12 means 12% APR)
    #[arg(long)]
    pub rate: Decimal,

    /// Number of monthly installments
    #[arg(long)]
    pub installments: u32,

    /// Amount paid upfront, outside the schedule
    #[arg(long, default_value = "0")]
    pub down_payment: Decimal,

    /// Installments fall due monthly after this date [default: today]
    #[arg(long)]
    pub start: Option<NaiveDate>,
}

/// A computed quote.
#[derive(Debug, Serialize)]
pub struct Quote {
    pub requested_amount: Decimal,
    pub down_payment: Decimal,
    pub annual_interest_rate_percent: Decimal,
    pub start_date: NaiveDate,
    pub schedule: AmortizationSchedule,
}

/// Builds the schedule for `args` at the configured money scale.
pub fn run(config: &FinancingConfig, args: &QuoteArgs) -> anyhow::Result<Quote> {
    ensure!(
        args.down_payment >= Decimal::ZERO,
        "down payment must not be negative, got {}",
        args.down_payment
    );
    let principal = args.amount - args.down_payment;
    ensure!(
        principal > Decimal::ZERO,
        "down payment {} leaves nothing to finance from {}",
        args.down_payment,
        args.amount
    );

    let start_date = args.start.unwrap_or_else(|| Utc::now().date_naive());
    let schedule = ScheduleGenerator::with_scale(config.money_scale).generate(
        principal,
        args.rate,
        args.installments,
        start_date,
    )?;

    info!(
        principal = %principal,
        installments = args.installments,
        installment_amount = %schedule.installment_amount,
        total_interest = %schedule.total_interest,
        "Quote computed"
    );

    Ok(Quote {
        requested_amount: args.amount,
        down_payment: args.down_payment,
        annual_interest_rate_percent: args.rate,
        start_date,
        schedule,
    })
}
