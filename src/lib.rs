//! railcheck: validation engine for rail operator status messages.

pub mod batch;
pub mod config;
pub mod error;
pub mod reference;
pub mod validation;
