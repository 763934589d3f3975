#[cfg(feature = "cli")]
pub mod cli;
pub mod parser_env;
pub mod toml_config;

use crate::domain::model::MergePolicy;
use crate::utils::error::{CommonsError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use toml_config::RunFile;

pub const DEFAULT_OUTPUT: &str = "commons";
pub const DEFAULT_FRICTION: f64 = 1.0;
pub const DEFAULT_SEPARATOR: char = ',';

/// Attribute columns holding the site fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteColumns {
    pub x: String,
    pub y: String,
    pub importance: String,
    pub name: String,
}

impl SiteColumns {
    /// Column list in the order the site rows are read back.
    pub fn as_query_list(&self) -> String {
        self.labels().join(",")
    }

    pub fn labels(&self) -> [&str; 4] {
        [
            self.x.as_str(),
            self.y.as_str(),
            self.importance.as_str(),
            self.name.as_str(),
        ]
    }
}

/// Tuning passed through to the cost accumulation routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkParams {
    /// Value of the constant friction map built when no friction map is given.
    pub default_friction: f64,
    pub walk_coeff: Option<String>,
    pub lambda: Option<f64>,
    pub slope_factor: Option<f64>,
    pub memory: Option<u32>,
}

impl Default for WalkParams {
    fn default() -> Self {
        Self {
            default_friction: DEFAULT_FRICTION,
            walk_coeff: None,
            lambda: None,
            slope_factor: None,
            memory: None,
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonsSettings {
    pub elevation: String,
    pub sites_map: String,
    pub columns: SiteColumns,
    /// Seconds of walking time bounding the most important site's catchment.
    pub cvmax: f64,
    pub friction: Option<String>,
    pub knight_move: bool,
    pub keep_surfaces: bool,
    pub output: String,
    pub policy: MergePolicy,
    pub jobs: usize,
    pub separator: char,
    pub report: Option<String>,
    pub overwrite: bool,
    pub walk: WalkParams,
}

impl Validate for CommonsSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_map_reference("elev", &self.elevation)?;
        validation::validate_map_reference("vect", &self.sites_map)?;
        if let Some(friction) = &self.friction {
            validation::validate_map_reference("frict", friction)?;
        }
        validation::validate_map_name("output", &self.output)?;

        validation::validate_column_name("x_column", &self.columns.x)?;
        validation::validate_column_name("y_column", &self.columns.y)?;
        validation::validate_column_name("i_column", &self.columns.importance)?;
        validation::validate_column_name("name_column", &self.columns.name)?;
        validation::validate_distinct("columns", &self.columns.labels())?;

        validation::validate_positive_finite("cvmax", self.cvmax)?;
        validation::validate_positive_number("jobs", self.jobs, 1)?;

        if !self.separator.is_ascii() || self.separator.is_ascii_alphanumeric() {
            return Err(CommonsError::InvalidConfigValueError {
                field: "separator".to_string(),
                value: self.separator.to_string(),
                reason: "Separator must be a single ASCII punctuation or whitespace character"
                    .to_string(),
            });
        }

        if let Some(report) = &self.report {
            validation::validate_path("report", report)?;
        }

        if !self.walk.default_friction.is_finite() || self.walk.default_friction < 0.0 {
            return Err(CommonsError::InvalidConfigValueError {
                field: "walk.default_friction".to_string(),
                value: self.walk.default_friction.to_string(),
                reason: "Friction must be zero or positive".to_string(),
            });
        }

        if let Some(coeff) = &self.walk.walk_coeff {
            let parts: Vec<&str> = coeff.split(',').map(str::trim).collect();
            if parts.len() != 4 || parts.iter().any(|p| p.parse::<f64>().is_err()) {
                return Err(CommonsError::InvalidConfigValueError {
                    field: "walk.walk_coeff".to_string(),
                    value: coeff.clone(),
                    reason: "Expected four comma-separated numbers a,b,c,d".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Options as collected from one source, before defaults and the run file are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleOptions {
    pub elev: Option<String>,
    pub vect: Option<String>,
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    pub i_column: Option<String>,
    pub name_column: Option<String>,
    pub cvmax: Option<String>,
    pub frict: Option<String>,
    pub knight_move: bool,
    pub keep_surfaces: bool,
    pub output: Option<String>,
    pub policy: Option<MergePolicy>,
    pub jobs: Option<usize>,
    pub separator: Option<char>,
    pub report: Option<String>,
    pub overwrite: bool,
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    let value = non_blank(value);
    validation::validate_required_field(field, &value).cloned()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_cvmax(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| CommonsError::InvalidConfigValueError {
            field: "cvmax".to_string(),
            value: raw.to_string(),
            reason: format!("Not a number: {}", e),
        })
}

impl ModuleOptions {
    /// Applies the run file and defaults. Explicit options win over the run file.
    pub fn resolve(self, run_file: Option<&RunFile>) -> Result<CommonsSettings> {
        let elevation = required("elev", self.elev)?;
        let sites_map = required("vect", self.vect)?;
        let columns = SiteColumns {
            x: required("x_column", self.x_column)?,
            y: required("y_column", self.y_column)?,
            importance: required("i_column", self.i_column)?,
            name: required("name_column", self.name_column)?,
        };
        let cvmax = parse_cvmax(&required("cvmax", self.cvmax)?)?;

        let output_section = run_file.and_then(|f| f.output.as_ref());
        let run_section = run_file.and_then(|f| f.run.as_ref());

        let output = non_blank(self.output)
            .or_else(|| output_section.and_then(|o| o.name.clone()))
            .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
        let policy = self
            .policy
            .or_else(|| output_section.and_then(|o| o.policy))
            .unwrap_or_default();
        let report = non_blank(self.report).or_else(|| output_section.and_then(|o| o.report.clone()));
        let jobs = self
            .jobs
            .or_else(|| run_section.and_then(|r| r.jobs))
            .unwrap_or(1);
        let separator = self
            .separator
            .or_else(|| run_section.and_then(|r| r.separator))
            .unwrap_or(DEFAULT_SEPARATOR);

        let walk = run_file
            .and_then(|f| f.walk.as_ref())
            .map(|w| w.to_params())
            .unwrap_or_default();

        Ok(CommonsSettings {
            elevation,
            sites_map,
            columns,
            cvmax,
            friction: non_blank(self.frict),
            knight_move: self.knight_move,
            keep_surfaces: self.keep_surfaces,
            output,
            policy,
            jobs,
            separator,
            report,
            overwrite: self.overwrite,
            walk,
        })
    }
}
