use crate::core::{Pipeline, RunReport};
use crate::utils::error::Result;
use crate::utils::monitor::PhaseMonitor;

/// Drives a pipeline through its three phases: sites, surfaces, cleanup.
pub struct CommonsEngine<P: Pipeline> {
    pipeline: P,
    monitor: PhaseMonitor,
}

impl<P: Pipeline> CommonsEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: PhaseMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting commons run");

        let sites = self.pipeline.extract().await?;
        self.monitor.log_phase("sites");

        let result = self.pipeline.transform(sites).await?;
        tracing::info!(
            "Built {} cost surface(s) for {} site(s)",
            result.surfaces.len(),
            result.sites.len()
        );
        self.monitor.log_phase("surfaces");

        let report = self.pipeline.load(result).await?;
        self.monitor.log_phase("cleanup");
        self.monitor.log_final();

        Ok(report)
    }
}
