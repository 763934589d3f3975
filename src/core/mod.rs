pub mod engine;
pub mod pipeline;
pub mod plan;
pub mod sites;

pub use crate::domain::command::GisCommand;
pub use crate::domain::model::{CommonsResult, CostSurface, RunReport, Site};
pub use crate::domain::ports::{GisRunner, Pipeline};
pub use crate::utils::error::Result;
