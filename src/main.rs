use anyhow::Context;
use clap::Parser;
use commons_equation::config::parser_env::{launched_by_parser, ParserEnv};
use commons_equation::config::toml_config::RunFile;
use commons_equation::core::Pipeline;
use commons_equation::utils::{logger, validation::Validate};
use std::io::Write;
use commons_equation::{
    CliConfig, CommonsEngine, CommonsError, CommonsPipeline, ModuleOptions, ProcessRunner,
};

struct Invocation {
    options: ModuleOptions,
    config_path: Option<String>,
    verbose: bool,
    monitor: bool,
    log_json: bool,
    dry_run: bool,
}

fn invocation() -> Invocation {
    let args: Vec<String> = std::env::args().collect();

    // 由 GIS 啟動器轉交時，選項都在環境變數裡
    if launched_by_parser(&args) {
        let env = ParserEnv::from_env();
        let options = match env.to_options() {
            Ok(options) => options,
            Err(e) => report_failure(&e),
        };
        return Invocation {
            options,
            config_path: env.config_path(),
            verbose: env.verbose(),
            monitor: false,
            log_json: false,
            dry_run: false,
        };
    }

    let cli = CliConfig::parse();
    Invocation {
        options: cli.to_options(),
        config_path: cli.config.clone(),
        verbose: cli.verbose,
        monitor: cli.monitor,
        log_json: cli.log_json,
        dry_run: cli.dry_run,
    }
}

fn report_failure(e: &CommonsError) -> ! {
    tracing::error!(
        "❌ Commons run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let invocation = invocation();

    if invocation.log_json {
        logger::init_json_logger(invocation.verbose);
    } else {
        logger::init_cli_logger(invocation.verbose);
    }

    tracing::info!("Starting r-commons");

    let run_file = match &invocation.config_path {
        Some(path) => match RunFile::load(path) {
            Ok(run_file) => {
                tracing::debug!("Loaded run file {}", path);
                Some(run_file)
            }
            Err(e) => report_failure(&e),
        },
        None => None,
    };

    let settings = match invocation.options.resolve(run_file.as_ref()) {
        Ok(settings) => settings,
        Err(e) => report_failure(&e),
    };

    // 驗證配置
    if let Err(e) = settings.validate() {
        report_failure(&e);
    }
    tracing::debug!("Settings: {:?}", settings);

    let pipeline = CommonsPipeline::new(ProcessRunner::new(), settings);

    if invocation.dry_run {
        tracing::info!("🔍 DRY RUN MODE - only the site query is executed");
        let sites = match pipeline.extract().await {
            Ok(sites) => sites,
            Err(e) => report_failure(&e),
        };
        let plan = match pipeline.plan(&sites) {
            Ok(plan) => plan,
            Err(e) => report_failure(&e),
        };
        let mut out = std::io::stdout().lock();
        for surface in &plan.surfaces {
            writeln!(
                out,
                "# {} -> {} (max cost {})",
                surface.site_name, surface.map, surface.max_cost
            )
            .context("failed to print the planned surfaces")?;
        }
        for command in plan.commands() {
            writeln!(out, "{}", command).context("failed to print the planned commands")?;
        }
        return Ok(());
    }

    if invocation.monitor {
        tracing::info!("🔍 Phase monitoring enabled");
    }

    let engine = CommonsEngine::new_with_monitoring(pipeline, invocation.monitor);

    match engine.run().await {
        Ok(report) => {
            tracing::info!("✅ Commons map written to {}", report.maps.classification);
            println!("✅ Commons map: {}", report.maps.classification);
            println!("   Ownership:  {}", report.maps.owner);
            println!("   Overlap:    {}", report.maps.count);
            if report.kept_surfaces {
                for surface in &report.surfaces {
                    println!("   Cost surface for {}: {}", surface.site_name, surface.map);
                }
            }
        }
        Err(e) => report_failure(&e),
    }

    Ok(())
}
