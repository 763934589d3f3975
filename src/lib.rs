pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::ProcessRunner;
pub use config::{CommonsSettings, ModuleOptions};
pub use core::{engine::CommonsEngine, pipeline::CommonsPipeline};
pub use domain::model::MergePolicy;
pub use utils::error::{CommonsError, Result};
