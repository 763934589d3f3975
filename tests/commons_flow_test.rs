use clap::Parser;
use commons_equation::config::parser_env::ParserEnv;
use commons_equation::config::toml_config::RunFile;
use commons_equation::core::Pipeline;
use commons_equation::domain::command::GisCommand;
use commons_equation::domain::ports::GisRunner;
use commons_equation::utils::validation::Validate;
use commons_equation::{
    CliConfig, CommonsEngine, CommonsError, CommonsPipeline, CommonsSettings, MergePolicy, Result,
};
use std::sync::{Arc, Mutex};

/// Answers the attribute query with a fixed table and records everything else.
#[derive(Clone)]
struct RecordingRunner {
    table: String,
    calls: Arc<Mutex<Vec<GisCommand>>>,
}

impl RecordingRunner {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<GisCommand> {
        self.calls.lock().unwrap().clone()
    }
}

impl GisRunner for RecordingRunner {
    async fn run(&self, command: &GisCommand) -> Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        if command.program == "v.db.select" {
            Ok(self.table.clone())
        } else {
            Ok(String::new())
        }
    }
}

const TABLE: &str = "x|y|size|cat\n\
                     10.5|20|5|1\n\
                     30|40.25|0|2\n\
                     50|60|10|3\n";

fn cli_settings(extra: &[&str]) -> CommonsSettings {
    let mut args = vec![
        "r-commons",
        "--elev",
        "elevation@PERMANENT",
        "--vect",
        "villages",
        "--x-column",
        "x",
        "--y-column",
        "y",
        "--i-column",
        "size",
        "--name-column",
        "cat",
        "--cvmax",
        "1800",
        "--separator",
        "|",
    ];
    args.extend_from_slice(extra);
    let cli = CliConfig::try_parse_from(args).unwrap();
    let settings = cli.to_options().resolve(None).unwrap();
    settings.validate().unwrap();
    settings
}

#[test]
fn test_cli_and_launcher_resolve_to_same_settings() {
    let from_cli = cli_settings(&["-k", "--frict", "slope_cost"]);

    let env = ParserEnv::from_vars(vec![
        ("GIS_OPT_ELEV", "elevation@PERMANENT"),
        ("GIS_OPT_VECT", "villages"),
        ("GIS_OPT_X_COLUMN", "x"),
        ("GIS_OPT_Y_COLUMN", "y"),
        ("GIS_OPT_I_COLUMN", "size"),
        ("GIS_OPT_NAME_COLUMN", "cat"),
        ("GIS_OPT_CVMAX", "1800"),
        ("GIS_OPT_FRICT", "slope_cost"),
        ("GIS_OPT_SEPARATOR", "pipe"),
        ("GIS_FLAG_K", "1"),
        ("GIS_FLAG_C", "0"),
    ]);
    let from_env = env.to_options().unwrap().resolve(None).unwrap();

    assert_eq!(from_cli, from_env);
}

#[test]
fn test_dry_run_plan_skips_zero_importance_site() {
    let settings = cli_settings(&[]);
    let runner = RecordingRunner::new(TABLE);
    let pipeline = CommonsPipeline::new(runner.clone(), settings);

    let sites = tokio_test::block_on(pipeline.extract()).unwrap();
    assert_eq!(sites.len(), 3);

    let plan = pipeline.plan(&sites).unwrap();
    let names: Vec<&str> = plan.surfaces.iter().map(|s| s.site_name.as_str()).collect();
    assert_eq!(names, vec!["1", "3"]);
    assert_eq!(plan.surfaces[0].max_cost, 900);
    assert_eq!(plan.surfaces[1].max_cost, 1800);
    assert_eq!(plan.surfaces[1].map, "commons_cost_3");

    // only the query ran
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_full_run_with_run_file_tuning() {
    let run_file = RunFile::from_toml_str(
        r#"
[walk]
default_friction = 0.0
slope_factor = -0.2125

[output]
name = "valley"
policy = "mincost"
"#,
    )
    .unwrap();

    let cli = CliConfig::try_parse_from([
        "r-commons",
        "--elev",
        "dem",
        "--vect",
        "villages",
        "--x-column",
        "x",
        "--y-column",
        "y",
        "--i-column",
        "size",
        "--name-column",
        "cat",
        "--cvmax",
        "600",
        "--separator",
        "pipe",
        "-c",
    ])
    .unwrap();
    let settings = cli.to_options().resolve(Some(&run_file)).unwrap();
    assert_eq!(settings.policy, MergePolicy::Mincost);

    let runner = RecordingRunner::new(TABLE);
    let engine = CommonsEngine::new(CommonsPipeline::new(runner.clone(), settings));
    let report = engine.run().await.unwrap();

    assert!(report.kept_surfaces);
    assert_eq!(report.maps.owner, "valley_owner");

    let calls = runner.calls();
    assert_eq!(
        calls[1].param_value("expression"),
        Some(r#""valley_tmp_friction" = 0.0"#)
    );
    let walk = calls.iter().find(|c| c.program == "r.walk").unwrap();
    assert_eq!(walk.param_value("slope_factor"), Some("-0.2125"));
    assert_eq!(walk.param_value("friction"), Some("valley_tmp_friction"));

    let rank = calls
        .iter()
        .find(|c| {
            c.param_value("expression")
                .map(|e| e.starts_with(r#""valley_tmp_rank""#))
                .unwrap_or(false)
        })
        .unwrap();
    assert_eq!(
        rank.param_value("expression"),
        Some(r#""valley_tmp_rank" = nmin("valley_cost_1", "valley_cost_3")"#)
    );

    let cleanup = calls.last().unwrap();
    assert_eq!(
        cleanup.param_value("name"),
        Some("valley_tmp_friction,valley_tmp_rank")
    );
}

#[tokio::test]
async fn test_all_sites_without_importance_fail_with_no_sites() {
    let settings = cli_settings(&[]);
    let runner = RecordingRunner::new("x|y|size|cat\n0|0|0|1\n");
    let engine = CommonsEngine::new(CommonsPipeline::new(runner, settings));

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, CommonsError::NoSitesError { .. }));
    assert_eq!(err.exit_code(), 1);
}
