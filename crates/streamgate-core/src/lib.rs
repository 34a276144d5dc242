//! Portable primitives shared by streamgate platform adapters.

pub mod body;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
