//! Core business logic for Medfin.
//!
//! This crate contains pure financing logic with no web or database
//! dependencies. Domain types, plan rules, schedule math, and the agreement
//! ledger live here.
//!
//! # Modules
//!
//! - `financing` - Amortization schedules and installment agreements

pub mod financing;
