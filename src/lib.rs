//! Air quality monitoring service.
//!
//! Samples the IQAir provider for a fixed location every minute, appends
//! each reading to PostgreSQL, and serves a live lookup plus the
//! historically most polluted timestamp over HTTP.

pub mod config;
pub mod db;
pub mod ingest;
pub mod location;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod web;
