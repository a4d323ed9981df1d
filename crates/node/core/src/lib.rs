//! Shared infrastructure of the podscope binary: CLI argument groups,
//! layered configuration, data directories and logging.

pub mod args;
pub mod config;
pub mod constants;
pub mod dirs;
pub mod logging;
pub mod version;
