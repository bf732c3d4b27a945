//! Device verification client for Stride workspaces

pub mod api;
pub mod cli;
pub mod error;
mod logging;
pub mod paths;
pub mod session;
pub mod settings;
pub mod verifier;
