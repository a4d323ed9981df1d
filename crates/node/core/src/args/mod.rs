//! CLI argument groups.
//!
//! `LogArgs` and `DataDirArgs` are read directly. `CrawlerArgs` and
//! `MetricsArgs` only carry overrides: every field is optional and is
//! applied on top of the loaded configuration by
//! [`PodscopeConfig::apply_overrides`](crate::config::PodscopeConfig::apply_overrides).

mod crawler;
mod datadir;
mod log;
mod metrics;

pub use crawler::CrawlerArgs;
pub use datadir::DataDirArgs;
pub use log::LogArgs;
pub use metrics::MetricsArgs;
