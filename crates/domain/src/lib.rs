//! Shared types for the Threadkeeper crates: the error type, structured
//! trace events, and configuration.

pub mod config;
pub mod error;
pub mod trace;
