//! Persona backend: per-user history and profile state over a soft-fail
//! key-value store, stage gating, reply shaping and citation lookups.

pub mod cognition;
pub mod config;
pub mod dialogue;
pub mod identity;
pub mod memory;
pub mod random;
pub mod sources;
pub mod store;
