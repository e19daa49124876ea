//! Utility modules
//!
//! This module contains common utilities used throughout the application,
//! including error handling, logging setup, retries and helper functions.

pub mod errors;
pub mod logging;
pub mod helpers;
pub mod retry;

pub use errors::{CbxError, Result};
