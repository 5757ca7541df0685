//! Passenger survival classifier.
//!
//! A training job fits a preprocessing pipeline and a logistic regression on
//! a CSV dataset and persists them as one artifact; an HTTP service loads the
//! artifact once and answers `POST /predict` requests.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod telemetry;

pub use error::{AppError, Result};
