//! Observability for the Drinks Service.

pub mod metrics;
