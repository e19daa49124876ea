//! Test helpers
//!
//! Builders for domain records and a database helper for the integration
//! tests that need PostgreSQL.

#![allow(dead_code)]

pub mod database_helper;
pub mod test_data;

pub use database_helper::*;
pub use test_data::*;
