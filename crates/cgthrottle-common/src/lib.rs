//! # cgthrottle-common
//!
//! Shared types, error definitions, and constants used across the
//! cgthrottle workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives the I/O throttling pipeline
//! builds upon.

pub mod constants;
pub mod error;
pub mod types;
