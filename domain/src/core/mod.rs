//! Core domain concepts shared across all subdomains.
//!
//! - [`worker_id::WorkerId`]: identifier of a worker taking part in a run
//! - [`error::DomainError`]: domain-level errors
//! - [`string`]: UTF-8 safe truncation and normalization helpers

pub mod error;
pub mod string;
pub mod worker_id;
