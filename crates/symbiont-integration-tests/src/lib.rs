//! Integration test crate for the Symbiont marketplace.
//!
//! This crate exists solely to run integration tests that span the core
//! and market crates. It has no public API - all functionality is in the
//! test modules.

#![forbid(unsafe_code)]
