//! HTTP request handlers for the Drinks Service.

pub mod drinks;
pub mod health;
pub mod metrics;

pub use drinks::{
    create_drink, delete_drink, list_drink_details, list_drinks, not_found, update_drink,
};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
