//! Integration tests for Glance Runner.

pub mod connection_test;
pub mod http_test;
pub mod query_test;
