use crate::config::parser_env::parse_separator;
use crate::config::ModuleOptions;
use crate::domain::model::MergePolicy;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "r-commons")]
#[command(about = "Define the areas that can be considered \"the commons\" around a set of sites from walking-cost surfaces")]
pub struct CliConfig {
    /// Input elevation map (DEM)
    #[arg(long)]
    pub elev: String,

    /// Vector points map containing the sites
    #[arg(long)]
    pub vect: String,

    /// Column containing x values for site coordinates
    #[arg(long)]
    pub x_column: String,

    /// Column containing y values for site coordinates
    #[arg(long)]
    pub y_column: String,

    /// Column containing the importance index of each site
    #[arg(long)]
    pub i_column: String,

    /// Column with unique identifiers for each site (the cat column can be used)
    #[arg(long)]
    pub name_column: String,

    /// Walking time in seconds bounding the 100% usage zone of the most important site
    #[arg(long)]
    pub cvmax: String,

    /// Map of extra friction costs; without it friction is constant
    #[arg(long)]
    pub frict: Option<String>,

    /// Use knight's move for the cost surfaces (slower but more accurate)
    #[arg(short = 'k')]
    pub knight_move: bool,

    /// Keep the interim cost surfaces
    #[arg(short = 'c')]
    pub keep_surfaces: bool,

    /// Base name of the output maps
    #[arg(long)]
    pub output: Option<String>,

    #[arg(long, value_enum)]
    pub policy: Option<MergePolicy>,

    /// Number of cost surfaces computed at the same time
    #[arg(long)]
    pub jobs: Option<usize>,

    #[arg(long, value_parser = separator_arg)]
    pub separator: Option<char>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<String>,

    /// TOML run file with walk tuning and output defaults
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub overwrite: bool,

    /// Query the sites and print the planned commands without running them
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log phase timings and memory use")]
    pub monitor: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub log_json: bool,
}

fn separator_arg(raw: &str) -> std::result::Result<char, String> {
    parse_separator(raw).map_err(|e| e.to_string())
}

impl CliConfig {
    pub fn to_options(&self) -> ModuleOptions {
        ModuleOptions {
            elev: Some(self.elev.clone()),
            vect: Some(self.vect.clone()),
            x_column: Some(self.x_column.clone()),
            y_column: Some(self.y_column.clone()),
            i_column: Some(self.i_column.clone()),
            name_column: Some(self.name_column.clone()),
            cvmax: Some(self.cvmax.clone()),
            frict: self.frict.clone(),
            knight_move: self.knight_move,
            keep_surfaces: self.keep_surfaces,
            output: self.output.clone(),
            policy: self.policy,
            jobs: self.jobs,
            separator: self.separator,
            report: self.report.clone(),
            overwrite: self.overwrite,
        }
    }
}
