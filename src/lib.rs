//! Glance Runner - a lightweight browser-based runner for read-only MySQL queries.
//!
//! This library exposes the core modules for use by the binary and integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod logging;
pub mod probe;
pub mod safety;
pub mod seed;
pub mod service;
pub mod web;
