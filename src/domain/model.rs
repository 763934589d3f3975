use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One attribute row in query column order: x, y, importance, name.
pub type SiteRow = [String; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// 1-based position in the attribute query; also the raster category of the site.
    pub index: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub importance: f64,
}

/// How cells reached by several sites are assigned an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Lowest cost relative to each site's own ceiling.
    #[default]
    Weighted,
    /// Lowest raw accumulated cost.
    Mincost,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::Weighted => write!(f, "weighted"),
            MergePolicy::Mincost => write!(f, "mincost"),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(MergePolicy::Weighted),
            "mincost" => Ok(MergePolicy::Mincost),
            other => Err(format!("unknown merge policy '{}'", other)),
        }
    }
}

/// A per-site accumulated cost raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSurface {
    pub site_index: usize,
    pub site_name: String,
    pub map: String,
    pub max_cost: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonsMaps {
    /// 0 for shared cells, the site category for exclusive cells.
    pub classification: String,
    pub owner: String,
    pub count: String,
}

impl CommonsMaps {
    pub fn for_base(base: &str) -> Self {
        Self {
            classification: base.to_string(),
            owner: format!("{}_owner", base),
            count: format!("{}_count", base),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommonsResult {
    pub sites: Vec<Site>,
    pub surfaces: Vec<CostSurface>,
    pub maps: CommonsMaps,
    /// Helper rasters that are removed after the run whatever the retention flag says.
    pub scratch_maps: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub finished_at: DateTime<Utc>,
    pub elevation: String,
    pub sites_map: String,
    pub cvmax: f64,
    pub policy: MergePolicy,
    pub surfaces: Vec<CostSurface>,
    pub maps: CommonsMaps,
    pub kept_surfaces: bool,
    pub removed_maps: Vec<String>,
}
