//! Library entrypoint for vince-dist.
//!
//! The primary interface is the `vince-dist` binary. This lib target exposes
//! the packaging modules to integration tests.

pub mod archive;
pub mod checksums;
pub mod config;
pub mod dist;
pub mod git;
pub mod output;
pub mod process;
pub mod project;
pub mod release;
pub mod targets;
