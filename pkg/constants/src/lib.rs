//! Centralized constants for node-endpoints.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod labels;
pub mod network;
pub mod paths;
pub mod state;
pub mod sync;
