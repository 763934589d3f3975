use crate::domain::command::GisCommand;
use crate::domain::model::{CommonsResult, RunReport, Site};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Executes host GIS commands. It is the only way the crate touches rasters,
/// vectors or the attribute database.
pub trait GisRunner: Send + Sync {
    /// Runs the command and returns its standard output.
    fn run(&self, command: &GisCommand)
        -> impl std::future::Future<Output = Result<String>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<Site>>;
    async fn transform(&self, sites: Vec<Site>) -> Result<CommonsResult>;
    async fn load(&self, result: CommonsResult) -> Result<RunReport>;
}
