//! # ZainDB Testkit
//!
//! Test utilities for ZainDB.
//!
//! This crate provides:
//! - Fixtures for boards and engines backed by temporary directories
//! - Factories that fail on purpose (flaky opens, unsupported storage)
//! - An event sink that collects engine diagnostics
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zaindb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_board() {
//!     let board = TestBoard::memory().await;
//!     board.messages().try_create().await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
