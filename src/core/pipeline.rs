use crate::config::CommonsSettings;
use crate::core::plan::{self, RunPlan};
use crate::core::sites;
use crate::core::{CommonsResult, GisCommand, GisRunner, Pipeline, RunReport, Site};
use crate::utils::error::{CommonsError, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;

pub struct CommonsPipeline<R: GisRunner> {
    runner: Arc<R>,
    settings: CommonsSettings,
}

impl<R: GisRunner + 'static> CommonsPipeline<R> {
    pub fn new(runner: R, settings: CommonsSettings) -> Self {
        Self {
            runner: Arc::new(runner),
            settings,
        }
    }

    pub fn settings(&self) -> &CommonsSettings {
        &self.settings
    }

    pub fn plan(&self, sites: &[Site]) -> Result<RunPlan> {
        plan::build_plan(&self.settings, sites)
    }

    async fn run_all(&self, commands: &[GisCommand]) -> Result<()> {
        for command in commands {
            self.runner.run(command).await?;
        }
        Ok(())
    }

    /// Runs the cost accumulations, at most `jobs` at a time. The first
    /// failure aborts the ones still running.
    async fn run_walks(&self, walks: Vec<GisCommand>) -> Result<()> {
        let jobs = self.settings.jobs.max(1);
        if jobs == 1 {
            return self.run_all(&walks).await;
        }

        let total = walks.len();
        let mut pending = walks.into_iter();
        let mut in_flight = JoinSet::new();
        let mut finished = 0usize;

        loop {
            while in_flight.len() < jobs {
                let Some(command) = pending.next() else {
                    break;
                };
                let runner = Arc::clone(&self.runner);
                in_flight.spawn(async move { runner.run(&command).await.map(|_| command) });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let command = joined.map_err(|e| CommonsError::ProcessingError {
                message: format!("cost surface task failed: {}", e),
            })??;

            finished += 1;
            tracing::debug!(
                "Cost surface {} done ({}/{})",
                command.param_value("output").unwrap_or("?"),
                finished,
                total
            );
        }

        Ok(())
    }

    async fn execute(&self, plan: &RunPlan) -> Result<()> {
        if !plan.setup.is_empty() {
            tracing::info!(
                "No friction map given, using constant friction {}",
                self.settings.walk.default_friction
            );
            self.run_all(&plan.setup).await?;
        }

        tracing::info!(
            "🥾 Computing {} cost surface(s) from {} (knight's move: {})",
            plan.walks.len(),
            self.settings.elevation,
            self.settings.knight_move
        );
        for surface in &plan.surfaces {
            tracing::debug!(
                site = %surface.site_name,
                max_cost = surface.max_cost,
                "planned cost surface {}",
                surface.map
            );
        }
        self.run_walks(plan.walks.clone()).await?;

        tracing::info!(
            "🧮 Merging cost surfaces into {} ({} policy)",
            plan.maps.classification,
            self.settings.policy
        );
        self.run_all(&plan.merge).await
    }

    /// Best-effort removal of interim maps after a failed run. Cost surfaces
    /// stay when they are to be kept.
    async fn discard_interim_maps(&self, plan: &RunPlan) {
        let mut maps = plan.scratch_maps.clone();
        if !self.settings.keep_surfaces {
            maps.extend(plan.surfaces.iter().map(|s| s.map.clone()));
        }
        let Some(cleanup) = plan::cleanup_command(&maps) else {
            return;
        };

        tracing::debug!("Removing {} interim map(s) after failure", maps.len());
        if let Err(e) = self.runner.run(&cleanup).await {
            tracing::warn!("⚠️ Could not remove interim maps {}: {}", maps.join(","), e);
        }
    }
}

#[async_trait::async_trait]
impl<R: GisRunner + 'static> Pipeline for CommonsPipeline<R> {
    async fn extract(&self) -> Result<Vec<Site>> {
        let query = plan::query_command(&self.settings);
        tracing::debug!("Querying sites from {}", self.settings.sites_map);

        let dump = self.runner.run(&query).await?;
        let rows = sites::parse_site_rows(&dump, self.settings.separator)?;
        let sites = sites::sites_from_rows(&rows, &self.settings.columns)?;

        tracing::info!(
            "📍 Read {} site(s) from {}",
            sites.len(),
            self.settings.sites_map
        );
        Ok(sites)
    }

    async fn transform(&self, sites: Vec<Site>) -> Result<CommonsResult> {
        let plan = self.plan(&sites)?;

        if let Err(e) = self.execute(&plan).await {
            self.discard_interim_maps(&plan).await;
            return Err(e);
        }

        Ok(CommonsResult {
            sites: plan.sites,
            surfaces: plan.surfaces,
            maps: plan.maps,
            scratch_maps: plan.scratch_maps,
        })
    }

    async fn load(&self, result: CommonsResult) -> Result<RunReport> {
        let mut removed = result.scratch_maps.clone();
        if self.settings.keep_surfaces {
            tracing::info!("Keeping {} cost surface(s)", result.surfaces.len());
        } else {
            removed.extend(result.surfaces.iter().map(|s| s.map.clone()));
        }

        if let Some(cleanup) = plan::cleanup_command(&removed) {
            tracing::debug!("Removing {} interim map(s)", removed.len());
            self.runner.run(&cleanup).await?;
        }

        let report = RunReport {
            finished_at: Utc::now(),
            elevation: self.settings.elevation.clone(),
            sites_map: self.settings.sites_map.clone(),
            cvmax: self.settings.cvmax,
            policy: self.settings.policy,
            surfaces: result.surfaces,
            maps: result.maps,
            kept_surfaces: self.settings.keep_surfaces,
            removed_maps: removed,
        };

        if let Some(path) = &self.settings.report {
            let json = serde_json::to_string_pretty(&report)?;
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(path, json).await?;
            tracing::debug!("Run report written to {}", path);
        }

        Ok(report)
    }
}
