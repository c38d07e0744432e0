//! # devx-common
//!
//! Shared constants, error primitives, and the persisted runtime-state
//! record used across the devx workspace.
//!
//! This crate is the leaf of the dependency graph — it depends on no other
//! internal crate and provides the foundational pieces that all other
//! crates build upon.

pub mod constants;
pub mod error;
pub mod state;
