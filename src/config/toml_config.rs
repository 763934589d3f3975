use crate::config::{WalkParams, DEFAULT_FRICTION};
use crate::domain::model::MergePolicy;
use crate::utils::error::{CommonsError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional TOML run file. Only tuning lives here; the maps and columns of a
/// run always come from the module options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    pub walk: Option<WalkSection>,
    pub output: Option<OutputSection>,
    pub run: Option<RunSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkSection {
    pub default_friction: Option<f64>,
    pub walk_coeff: Option<String>,
    pub lambda: Option<f64>,
    pub slope_factor: Option<f64>,
    pub memory: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub name: Option<String>,
    pub policy: Option<MergePolicy>,
    pub report: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub jobs: Option<usize>,
    pub separator: Option<char>,
}

impl WalkSection {
    pub fn to_params(&self) -> WalkParams {
        WalkParams {
            default_friction: self.default_friction.unwrap_or(DEFAULT_FRICTION),
            walk_coeff: self.walk_coeff.clone(),
            lambda: self.lambda,
            slope_factor: self.slope_factor,
            memory: self.memory,
        }
    }
}

impl RunFile {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CommonsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads and validates a run file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let run_file = Self::from_file(path)?;
        run_file.validate_config()?;
        Ok(run_file)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| CommonsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CommonsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(output) = &self.output {
            if let Some(name) = &output.name {
                validation::validate_map_name("output.name", name)?;
            }
            if let Some(report) = &output.report {
                validation::validate_path("output.report", report)?;
            }
        }

        if let Some(run) = &self.run {
            if let Some(jobs) = run.jobs {
                validation::validate_positive_number("run.jobs", jobs, 1)?;
            }
        }

        if let Some(walk) = &self.walk {
            if let Some(memory) = walk.memory {
                validation::validate_positive_number("walk.memory", memory as usize, 1)?;
            }
        }

        Ok(())
    }
}

impl Validate for RunFile {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
