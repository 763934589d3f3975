//! Options handed over by the GIS module launcher.
//!
//! The launcher parses the command line itself, exports every option as
//! `GIS_OPT_<KEY>` and every flag as `GIS_FLAG_<K>`, then runs the module
//! again with [`ARGS_PARSED_SENTINEL`] as the first argument.

use crate::config::ModuleOptions;
use crate::domain::model::MergePolicy;
use crate::utils::error::{CommonsError, Result};
use std::collections::HashMap;

pub const ARGS_PARSED_SENTINEL: &str = "@ARGS_PARSED@";

/// True when the process was started by the launcher after it parsed the options.
pub fn launched_by_parser<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .nth(1)
        .map(|arg| arg.as_ref() == ARGS_PARSED_SENTINEL)
        .unwrap_or(false)
}

/// Snapshot of the launcher variables.
#[derive(Debug, Clone, Default)]
pub struct ParserEnv {
    vars: HashMap<String, String>,
}

impl ParserEnv {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Option value; the upper-case variable wins, older launchers used the key as written.
    pub fn option(&self, key: &str) -> Option<String> {
        self.vars
            .get(&format!("GIS_OPT_{}", key.to_ascii_uppercase()))
            .or_else(|| self.vars.get(&format!("GIS_OPT_{}", key)))
            .cloned()
    }

    pub fn flag(&self, flag: char) -> bool {
        self.vars
            .get(&format!("GIS_FLAG_{}", flag.to_ascii_uppercase()))
            .or_else(|| self.vars.get(&format!("GIS_FLAG_{}", flag)))
            .map(|v| v.trim() == "1")
            .unwrap_or(false)
    }

    pub fn overwrite(&self) -> bool {
        self.vars
            .get("GRASS_OVERWRITE")
            .map(|v| v.trim() == "1")
            .unwrap_or(false)
    }

    /// Launcher verbosity 3 and up maps to debug logging.
    pub fn verbose(&self) -> bool {
        self.vars
            .get("GRASS_VERBOSE")
            .and_then(|v| v.trim().parse::<i32>().ok())
            .map(|level| level >= 3)
            .unwrap_or(false)
    }

    pub fn config_path(&self) -> Option<String> {
        self.option("config").filter(|p| !p.trim().is_empty())
    }

    pub fn to_options(&self) -> Result<ModuleOptions> {
        let policy = match self.option("policy").filter(|p| !p.trim().is_empty()) {
            Some(raw) => Some(raw.parse::<MergePolicy>().map_err(|reason| {
                CommonsError::InvalidConfigValueError {
                    field: "policy".to_string(),
                    value: raw.clone(),
                    reason,
                }
            })?),
            None => None,
        };

        let jobs = match self.option("jobs").filter(|j| !j.trim().is_empty()) {
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|e| {
                CommonsError::InvalidConfigValueError {
                    field: "jobs".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        let separator = match self.option("separator").filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_separator(&raw)?),
            None => None,
        };

        Ok(ModuleOptions {
            elev: self.option("elev"),
            vect: self.option("vect"),
            x_column: self.option("x_column"),
            y_column: self.option("y_column"),
            i_column: self.option("i_column"),
            name_column: self.option("name_column"),
            cvmax: self.option("cvmax"),
            frict: self.option("frict"),
            knight_move: self.flag('k'),
            keep_surfaces: self.flag('c'),
            output: self.option("output"),
            policy,
            jobs,
            separator,
            report: self.option("report"),
            overwrite: self.overwrite(),
        })
    }
}

/// Accepts a single character or one of the launcher's separator keywords.
pub fn parse_separator(raw: &str) -> Result<char> {
    match raw {
        "comma" => return Ok(','),
        "pipe" => return Ok('|'),
        "tab" => return Ok('\t'),
        "space" => return Ok(' '),
        "semicolon" => return Ok(';'),
        _ => {}
    }

    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CommonsError::InvalidConfigValueError {
            field: "separator".to_string(),
            value: raw.to_string(),
            reason: "Expected a single character or comma, pipe, tab, space, semicolon"
                .to_string(),
        }),
    }
}
