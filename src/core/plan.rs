//! Turns the settings and the site list into the host commands of one run.
//!
//! Outputs for base name `B`:
//! - `B_cost_<i>`: cost surface of site `i`, bounded by its ceiling
//! - `B_count`: number of catchments covering a cell
//! - `B_owner`: site whose (policy-adjusted) cost is lowest at a cell
//! - `B`: 0 where catchments overlap, else the single covering site

use crate::config::CommonsSettings;
use crate::domain::command::GisCommand;
use crate::domain::model::{CommonsMaps, CostSurface, MergePolicy, Site};
use crate::utils::error::{CommonsError, Result};

/// Label of category 0 in the classification map.
pub const SHARED_LABEL: &str = "commons";

#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Sites that get a cost surface, in query order.
    pub sites: Vec<Site>,
    pub surfaces: Vec<CostSurface>,
    pub maps: CommonsMaps,
    pub scratch_maps: Vec<String>,
    pub setup: Vec<GisCommand>,
    pub walks: Vec<GisCommand>,
    pub merge: Vec<GisCommand>,
}

impl RunPlan {
    pub fn commands(&self) -> impl Iterator<Item = &GisCommand> {
        self.setup.iter().chain(&self.walks).chain(&self.merge)
    }
}

pub fn surface_name(output: &str, site_index: usize) -> String {
    format!("{}_cost_{}", output, site_index)
}

pub fn friction_map_name(output: &str) -> String {
    format!("{}_tmp_friction", output)
}

pub fn rank_map_name(output: &str) -> String {
    format!("{}_tmp_rank", output)
}

/// Ceiling of every site with a positive importance, scaled so the most
/// important site gets `cvmax`. Rounded, and never below 1 because the host
/// reads 0 as "no limit".
pub fn cost_ceilings(sites: &[Site], cvmax: f64) -> Result<Vec<(Site, u64)>> {
    let (usable, skipped): (Vec<&Site>, Vec<&Site>) =
        sites.iter().partition(|site| site.importance > 0.0);

    for site in &skipped {
        tracing::warn!(
            site = %site.name,
            "Skipping site with zero importance; it gets no catchment"
        );
    }

    let max_importance = usable
        .iter()
        .map(|site| site.importance)
        .fold(0.0_f64, f64::max);

    if usable.is_empty() || max_importance <= 0.0 {
        return Err(CommonsError::NoSitesError {
            message: format!(
                "{} site(s) read, none with a positive importance index",
                sites.len()
            ),
        });
    }

    Ok(usable
        .into_iter()
        .map(|site| {
            let ceiling = (cvmax * site.importance / max_importance).round().max(1.0) as u64;
            (site.clone(), ceiling)
        })
        .collect())
}

fn separator_keyword(separator: char) -> String {
    match separator {
        ',' => "comma".to_string(),
        '|' => "pipe".to_string(),
        '\t' => "tab".to_string(),
        ' ' => "space".to_string(),
        ';' => "semicolon".to_string(),
        other => other.to_string(),
    }
}

/// Attribute query returning `x, y, i, name` with a header row.
pub fn query_command(settings: &CommonsSettings) -> GisCommand {
    GisCommand::new("v.db.select")
        .param("map", &settings.sites_map)
        .param("columns", settings.columns.as_query_list())
        .param("separator", separator_keyword(settings.separator))
        .quiet()
}

pub fn friction_command(settings: &CommonsSettings) -> GisCommand {
    GisCommand::new("r.mapcalc")
        .param(
            "expression",
            format!(
                "{} = {}",
                quoted(&friction_map_name(&settings.output)),
                float_literal(settings.walk.default_friction)
            ),
        )
        .quiet()
        .overwrite_if(settings.overwrite)
}

pub fn walk_command(
    settings: &CommonsSettings,
    site: &Site,
    max_cost: u64,
    friction_map: &str,
) -> GisCommand {
    let mut cmd = GisCommand::new("r.walk")
        .param("elevation", &settings.elevation)
        .param("friction", friction_map)
        .param("output", surface_name(&settings.output, site.index))
        .param("start_coordinates", format!("{},{}", site.x, site.y))
        .param("max_cost", max_cost.to_string());

    if let Some(coeff) = &settings.walk.walk_coeff {
        cmd = cmd.param("walk_coeff", coeff.replace(' ', ""));
    }
    if let Some(lambda) = settings.walk.lambda {
        cmd = cmd.param("lambda", lambda.to_string());
    }
    if let Some(slope_factor) = settings.walk.slope_factor {
        cmd = cmd.param("slope_factor", slope_factor.to_string());
    }
    if let Some(memory) = settings.walk.memory {
        cmd = cmd.param("memory", memory.to_string());
    }

    cmd.flag_if('k', settings.knight_move)
        .quiet()
        .overwrite_if(settings.overwrite)
}

/// Map name as a map-algebra operand. Names may legally contain `-` or start
/// with a digit, which bare would parse as arithmetic.
fn quoted(map: &str) -> String {
    format!("\"{}\"", map)
}

/// Always has a decimal point so map algebra never falls back to integer division.
fn float_literal(value: f64) -> String {
    format!("{:?}", value)
}

fn comparison_term(surface: &CostSurface, policy: MergePolicy) -> String {
    match policy {
        MergePolicy::Weighted => format!(
            "({} / {})",
            quoted(&surface.map),
            float_literal(surface.max_cost as f64)
        ),
        MergePolicy::Mincost => quoted(&surface.map),
    }
}

pub fn rank_expression(rank_map: &str, surfaces: &[CostSurface], policy: MergePolicy) -> String {
    let terms: Vec<String> = surfaces
        .iter()
        .map(|s| comparison_term(s, policy))
        .collect();

    let rank_map = quoted(rank_map);
    if terms.len() == 1 {
        format!("{} = {}", rank_map, terms[0])
    } else {
        format!("{} = nmin({})", rank_map, terms.join(", "))
    }
}

pub fn owner_expression(
    owner_map: &str,
    rank_map: &str,
    surfaces: &[CostSurface],
    policy: MergePolicy,
) -> String {
    let rank_map = quoted(rank_map);
    let nested = surfaces.iter().rev().fold("null()".to_string(), |inner, s| {
        format!(
            "if(!isnull({}) && {} == {}, {}, {})",
            quoted(&s.map),
            comparison_term(s, policy),
            rank_map,
            s.site_index,
            inner
        )
    });

    format!(
        "{} = if(isnull({}), null(), {})",
        quoted(owner_map),
        rank_map,
        nested
    )
}

pub fn count_expression(count_map: &str, surfaces: &[CostSurface]) -> String {
    let terms: Vec<String> = surfaces
        .iter()
        .map(|s| format!("if(isnull({}), 0, 1)", quoted(&s.map)))
        .collect();
    format!("{} = {}", quoted(count_map), terms.join(" + "))
}

pub fn classification_expression(maps: &CommonsMaps) -> String {
    let count = quoted(&maps.count);
    format!(
        "{} = if({} == 0, null(), if({} > 1, 0, {}))",
        quoted(&maps.classification),
        count,
        count,
        quoted(&maps.owner)
    )
}

fn mapcalc(settings: &CommonsSettings, expression: String) -> GisCommand {
    GisCommand::new("r.mapcalc")
        .param("expression", expression)
        .quiet()
        .overwrite_if(settings.overwrite)
}

pub fn category_rules(sites: &[Site], include_shared: bool) -> String {
    let mut rules = String::new();
    if include_shared {
        rules.push_str(&format!("0:{}\n", SHARED_LABEL));
    }
    for site in sites {
        rules.push_str(&format!("{}:{}\n", site.index, site.name.replace('\n', " ")));
    }
    rules
}

fn category_command(map: &str, rules: String) -> GisCommand {
    GisCommand::new("r.category")
        .param("map", map)
        .param("separator", ":")
        .param("rules", "-")
        .quiet()
        .with_stdin(rules)
}

/// Removes the given rasters; `None` when there is nothing to remove.
pub fn cleanup_command(maps: &[String]) -> Option<GisCommand> {
    if maps.is_empty() {
        return None;
    }
    Some(
        GisCommand::new("g.remove")
            .flag('f')
            .param("type", "raster")
            .param("name", maps.join(","))
            .quiet(),
    )
}

pub fn build_plan(settings: &CommonsSettings, sites: &[Site]) -> Result<RunPlan> {
    let ceilings = cost_ceilings(sites, settings.cvmax)?;
    let maps = CommonsMaps::for_base(&settings.output);
    let rank_map = rank_map_name(&settings.output);

    let mut setup = Vec::new();
    let mut scratch_maps = Vec::new();
    let friction_map = match &settings.friction {
        Some(map) => map.clone(),
        None => {
            let name = friction_map_name(&settings.output);
            setup.push(friction_command(settings));
            scratch_maps.push(name.clone());
            name
        }
    };

    let mut surfaces = Vec::with_capacity(ceilings.len());
    let mut walks = Vec::with_capacity(ceilings.len());
    for (site, max_cost) in &ceilings {
        walks.push(walk_command(settings, site, *max_cost, &friction_map));
        surfaces.push(CostSurface {
            site_index: site.index,
            site_name: site.name.clone(),
            map: surface_name(&settings.output, site.index),
            max_cost: *max_cost,
        });
    }

    let used_sites: Vec<Site> = ceilings.into_iter().map(|(site, _)| site).collect();

    scratch_maps.push(rank_map.clone());
    let merge = vec![
        mapcalc(
            settings,
            rank_expression(&rank_map, &surfaces, settings.policy),
        ),
        mapcalc(
            settings,
            owner_expression(&maps.owner, &rank_map, &surfaces, settings.policy),
        ),
        mapcalc(settings, count_expression(&maps.count, &surfaces)),
        mapcalc(settings, classification_expression(&maps)),
        category_command(&maps.owner, category_rules(&used_sites, false)),
        category_command(&maps.classification, category_rules(&used_sites, true)),
    ];

    Ok(RunPlan {
        sites: used_sites,
        surfaces,
        maps,
        scratch_maps,
        setup,
        walks,
        merge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SiteColumns, WalkParams};
    use crate::utils::validation::Validate;

    fn settings() -> CommonsSettings {
        CommonsSettings {
            elevation: "dem".to_string(),
            sites_map: "sites".to_string(),
            columns: SiteColumns {
                x: "east".to_string(),
                y: "north".to_string(),
                importance: "imp".to_string(),
                name: "name".to_string(),
            },
            cvmax: 3600.0,
            friction: None,
            knight_move: false,
            keep_surfaces: false,
            output: "commons".to_string(),
            policy: MergePolicy::Weighted,
            jobs: 1,
            separator: ',',
            report: None,
            overwrite: false,
            walk: WalkParams::default(),
        }
    }

    fn site(index: usize, name: &str, importance: f64) -> Site {
        Site {
            index,
            name: name.to_string(),
            x: 1000.0 * index as f64,
            y: 500.5,
            importance,
        }
    }

    #[test]
    fn test_ceilings_scale_with_importance() {
        let sites = vec![site(1, "Alpha", 4.0), site(2, "Beta", 1.0), site(3, "Gamma", 2.0)];
        let ceilings = cost_ceilings(&sites, 3600.0).unwrap();

        let values: Vec<u64> = ceilings.iter().map(|(_, c)| *c).collect();
        assert_eq!(values, vec![3600, 900, 1800]);
    }

    #[test]
    fn test_ceiling_never_drops_to_zero() {
        let sites = vec![site(1, "Big", 1000.0), site(2, "Tiny", 0.001)];
        let ceilings = cost_ceilings(&sites, 100.0).unwrap();
        assert_eq!(ceilings[1].1, 1);
    }

    #[test]
    fn test_zero_importance_sites_are_skipped() {
        let sites = vec![site(1, "Alpha", 2.0), site(2, "Ghost", 0.0)];
        let ceilings = cost_ceilings(&sites, 600.0).unwrap();
        assert_eq!(ceilings.len(), 1);
        assert_eq!(ceilings[0].0.name, "Alpha");
    }

    #[test]
    fn test_no_usable_sites() {
        assert!(matches!(
            cost_ceilings(&[], 600.0),
            Err(CommonsError::NoSitesError { .. })
        ));
        assert!(matches!(
            cost_ceilings(&[site(1, "Ghost", 0.0)], 600.0),
            Err(CommonsError::NoSitesError { .. })
        ));
    }

    #[test]
    fn test_query_command() {
        let mut settings = settings();
        settings.separator = '|';
        let cmd = query_command(&settings);
        assert_eq!(cmd.program, "v.db.select");
        assert_eq!(cmd.param_value("map"), Some("sites"));
        assert_eq!(cmd.param_value("columns"), Some("east,north,imp,name"));
        assert_eq!(cmd.param_value("separator"), Some("pipe"));
    }

    #[test]
    fn test_walk_command_arguments() {
        let mut settings = settings();
        settings.knight_move = true;
        settings.walk.lambda = Some(0.5);
        settings.walk.walk_coeff = Some("0.72, 6.0, 1.9998, -1.9998".to_string());

        let cmd = walk_command(&settings, &site(2, "Beta", 1.0), 900, "frict");

        assert_eq!(cmd.program, "r.walk");
        assert_eq!(cmd.param_value("elevation"), Some("dem"));
        assert_eq!(cmd.param_value("friction"), Some("frict"));
        assert_eq!(cmd.param_value("output"), Some("commons_cost_2"));
        assert_eq!(cmd.param_value("start_coordinates"), Some("2000,500.5"));
        assert_eq!(cmd.param_value("max_cost"), Some("900"));
        assert_eq!(cmd.param_value("lambda"), Some("0.5"));
        assert_eq!(cmd.param_value("walk_coeff"), Some("0.72,6.0,1.9998,-1.9998"));
        assert!(cmd.has_flag('k'));
        assert!(!cmd.args.contains(&"--overwrite".to_string()));
    }

    #[test]
    fn test_plan_without_friction_builds_constant_map() {
        let sites = vec![site(1, "Alpha", 2.0), site(2, "Beta", 1.0)];
        let plan = build_plan(&settings(), &sites).unwrap();

        assert_eq!(plan.setup.len(), 1);
        assert_eq!(
            plan.setup[0].param_value("expression"),
            Some("\"commons_tmp_friction\" = 1.0")
        );
        assert!(plan
            .walks
            .iter()
            .all(|w| w.param_value("friction") == Some("commons_tmp_friction")));
        assert_eq!(
            plan.scratch_maps,
            vec!["commons_tmp_friction", "commons_tmp_rank"]
        );
        assert_eq!(plan.surfaces.len(), 2);
        assert_eq!(plan.surfaces[0].max_cost, 3600);
        assert_eq!(plan.surfaces[1].max_cost, 1800);
        assert_eq!(plan.commands().count(), 1 + 2 + 6);
    }

    #[test]
    fn test_plan_with_user_friction() {
        let mut settings = settings();
        settings.friction = Some("landcover@PERMANENT".to_string());
        let plan = build_plan(&settings, &[site(1, "Alpha", 1.0)]).unwrap();

        assert!(plan.setup.is_empty());
        assert_eq!(
            plan.walks[0].param_value("friction"),
            Some("landcover@PERMANENT")
        );
        assert_eq!(plan.scratch_maps, vec!["commons_tmp_rank"]);
    }

    #[test]
    fn test_weighted_expressions() {
        let surfaces = vec![
            CostSurface {
                site_index: 1,
                site_name: "Alpha".to_string(),
                map: "c_1".to_string(),
                max_cost: 3600,
            },
            CostSurface {
                site_index: 3,
                site_name: "Gamma".to_string(),
                map: "c_3".to_string(),
                max_cost: 1800,
            },
        ];

        assert_eq!(
            rank_expression("rank", &surfaces, MergePolicy::Weighted),
            r#""rank" = nmin(("c_1" / 3600.0), ("c_3" / 1800.0))"#
        );
        assert_eq!(
            owner_expression("owner", "rank", &surfaces, MergePolicy::Weighted),
            concat!(
                r#""owner" = if(isnull("rank"), null(), "#,
                r#"if(!isnull("c_1") && ("c_1" / 3600.0) == "rank", 1, "#,
                r#"if(!isnull("c_3") && ("c_3" / 1800.0) == "rank", 3, null())))"#
            )
        );
        assert_eq!(
            count_expression("count", &surfaces),
            r#""count" = if(isnull("c_1"), 0, 1) + if(isnull("c_3"), 0, 1)"#
        );
    }

    #[test]
    fn test_mincost_single_surface_expressions() {
        let surfaces = vec![CostSurface {
            site_index: 1,
            site_name: "Alpha".to_string(),
            map: "c_1".to_string(),
            max_cost: 60,
        }];
        assert_eq!(
            rank_expression("rank", &surfaces, MergePolicy::Mincost),
            r#""rank" = "c_1""#
        );
    }

    #[test]
    fn test_classification_expression() {
        let maps = CommonsMaps::for_base("commons");
        assert_eq!(
            classification_expression(&maps),
            r#""commons" = if("commons_count" == 0, null(), if("commons_count" > 1, 0, "commons_owner"))"#
        );
    }

    #[test]
    fn test_hyphenated_output_names_are_quoted() {
        let mut settings = settings();
        settings.output = "valley-2".to_string();
        settings.validate().unwrap();

        let plan = build_plan(&settings, &[site(1, "Alpha", 2.0), site(2, "Beta", 1.0)]).unwrap();
        let expressions: Vec<&str> = plan
            .commands()
            .filter_map(|c| c.param_value("expression"))
            .collect();

        assert_eq!(expressions[0], r#""valley-2_tmp_friction" = 1.0"#);
        assert_eq!(
            expressions[1],
            r#""valley-2_tmp_rank" = nmin(("valley-2_cost_1" / 3600.0), ("valley-2_cost_2" / 1800.0))"#
        );
        assert!(expressions[4].starts_with(r#""valley-2" = if("valley-2_count" == 0"#));
        // r.walk takes plain names
        assert_eq!(plan.walks[1].param_value("output"), Some("valley-2_cost_2"));
    }

    #[test]
    fn test_category_rules() {
        let sites = vec![site(1, "Alpha", 1.0), site(4, "Delta", 1.0)];
        assert_eq!(category_rules(&sites, false), "1:Alpha\n4:Delta\n");
        assert_eq!(
            category_rules(&sites, true),
            "0:commons\n1:Alpha\n4:Delta\n"
        );
    }

    #[test]
    fn test_cleanup_command() {
        assert!(cleanup_command(&[]).is_none());
        let cmd = cleanup_command(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(cmd.program, "g.remove");
        assert!(cmd.has_flag('f'));
        assert_eq!(cmd.param_value("name"), Some("a,b"));
    }
}
