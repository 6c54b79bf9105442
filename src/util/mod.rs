//! Utility types and functions

pub mod codec;
pub mod config;
pub mod logger;
