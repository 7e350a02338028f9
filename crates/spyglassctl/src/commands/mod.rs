//! Subcommand implementations.

pub mod cache;
pub mod clear;
pub mod health;
