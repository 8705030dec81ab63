//! Core library for the `loadfleet` CLI.
//!
//! This crate provides the building blocks used by the binary: CLI argument
//! types, the mergeable statistics engine, and the master↔slave coordination
//! layer (worker pool, slave agent, and wire protocol). The primary
//! user-facing interface is the `loadfleet` command-line application;
//! library APIs may evolve as the CLI grows.
pub mod args;
pub mod error;
pub mod logger;
pub mod remote;
pub mod stats;
