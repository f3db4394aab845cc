//! Library crate for tls-sweep-rs exposing reusable modules.
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod registry;
pub mod report;
pub mod types;
