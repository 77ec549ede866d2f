//! Shared components and utilities for the temp-from-bias workspace.
//!
//! Generic numeric helpers that do not depend on any particular detector live
//! here so the instrument crates stay focused on their calibration logic.

pub mod algo;
