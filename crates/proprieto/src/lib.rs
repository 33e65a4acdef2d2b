//! Rental portfolio management with ANAF fiscal calculation support.
//!
//! The `workflows::fiscal` module carries the computation engine: ownership
//! allocation, contract income normalization, portfolio aggregation, and the
//! D212 income tax / CASS calculator.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
