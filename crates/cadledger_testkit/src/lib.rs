//! # cadledger testkit
//!
//! Test utilities for cadledger.
//!
//! This crate provides:
//! - Session fixtures and model scenarios
//! - Handle-free world digests for state comparisons
//! - Fault injection: a failing kernel and a failing operation
//! - Property-based edit sequence generators using proptest
//! - Integration checks for history, structure and associativity
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadledger_testkit::prelude::*;
//!
//! #[test]
//! fn destroy_round_trips() {
//!     with_session(|session| {
//!         let names = scenarios::segment_with_edge(session);
//!         history::check_round_trip(session, |s| s.geometry().destroy(&[names.a], false));
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod digest;
pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::digest::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use digest::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
