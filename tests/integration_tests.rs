//! End-to-end run against stand-in host commands: small shell scripts put in
//! front of PATH that log their arguments and print a canned attribute table.

#![cfg(unix)]

use commons_equation::utils::validation::Validate;
use commons_equation::{CommonsEngine, CommonsPipeline, ModuleOptions, ProcessRunner};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

const SITES_TABLE: &str = "east,north,imp,name\n600000,4920000,4,Hill Fort\n603000,4921500,2,River Farm\n598500,4918000,1,Shrine\n";

fn install_fake_command(bin_dir: &Path, name: &str, body: &str) {
    let path = bin_dir.join(name);
    let script = format!(
        "#!/bin/sh\necho \"{} $*\" >> \"$COMMONS_FAKE_LOG\"\n{}\n",
        name, body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn test_end_to_end_with_fake_host_commands() {
    let temp_dir = TempDir::new().unwrap();
    let bin_dir = temp_dir.path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    let log_path = temp_dir.path().join("calls.log");
    let report_path = temp_dir.path().join("report.json");

    install_fake_command(
        &bin_dir,
        "v.db.select",
        &format!("printf '{}'", SITES_TABLE.replace('\n', "\\n")),
    );
    for name in ["r.walk", "r.mapcalc", "g.remove"] {
        install_fake_command(&bin_dir, name, "exit 0");
    }
    install_fake_command(
        &bin_dir,
        "r.category",
        "cat >> \"$COMMONS_FAKE_LOG\"",
    );

    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", bin_dir.display(), path));
    std::env::set_var("COMMONS_FAKE_LOG", &log_path);

    let options = ModuleOptions {
        elev: Some("dem".to_string()),
        vect: Some("sites".to_string()),
        x_column: Some("east".to_string()),
        y_column: Some("north".to_string()),
        i_column: Some("imp".to_string()),
        name_column: Some("name".to_string()),
        cvmax: Some("7200".to_string()),
        knight_move: true,
        report: Some(report_path.to_string_lossy().into_owned()),
        jobs: Some(2),
        ..Default::default()
    };
    let settings = options.resolve(None).unwrap();
    settings.validate().unwrap();

    let pipeline = CommonsPipeline::new(ProcessRunner::new(), settings);
    let engine = CommonsEngine::new(pipeline);
    let report = engine.run().await.unwrap();

    assert_eq!(report.surfaces.len(), 3);
    let ceilings: Vec<u64> = report.surfaces.iter().map(|s| s.max_cost).collect();
    assert_eq!(ceilings, vec![7200, 3600, 1800]);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();

    assert!(lines[0].starts_with("v.db.select map=sites columns=east,north,imp,name"));
    let walks: Vec<&&str> = lines.iter().filter(|l| l.starts_with("r.walk")).collect();
    assert_eq!(walks.len(), 3);
    assert!(walks.iter().all(|w| w.contains(" -k ")));
    assert!(walks
        .iter()
        .any(|w| w.contains("start_coordinates=603000,4921500") && w.contains("max_cost=3600")));

    assert!(log.contains("0:commons\n1:Hill Fort\n2:River Farm\n3:Shrine\n"));
    let cleanup = lines.last().unwrap();
    assert!(cleanup.starts_with("g.remove -f type=raster"));
    assert!(cleanup.contains("commons_cost_1,commons_cost_2,commons_cost_3"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(written["maps"]["classification"], "commons");
    assert_eq!(written["kept_surfaces"], false);
}
