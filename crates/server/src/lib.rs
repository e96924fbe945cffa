//! HTTP API, Postgres stores and background evaluation for attackwatch.

pub mod api;
pub mod cli;
pub mod db;
pub mod generator;
pub mod pg_store;
pub mod router;
pub mod rule_runner;
pub mod startup;
pub mod state;
