use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use geo::{LineString, Polygon};
use serde::Deserialize;

use route_emc::config::EngineConfig;
use route_emc::crs::Crs;
use route_emc::geometry::format_distance;
use route_emc::layers::{InMemoryLayer, ReferenceLayers};
use route_emc::route::{RouteGeometry, RouteMetadata};
use route_emc::rules::{OverallStatus, RuleStatus, RULES};
use route_emc::session::Session;

#[derive(Parser)]
#[command(
    name = "route_emc",
    about = "EMC clearance evaluation for HV routes near railway infrastructure"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a scenario file and print the rule-by-rule verdict.
    Evaluate {
        /// JSON file with a route and the reference geometries.
        scenario: PathBuf,
    },
    /// List the rule table with clause citations.
    Rules,
}

/// Plain route-plus-reference-data input; coordinates are `[x, y]` pairs in
/// the CRS given by `epsg` (reference geometries always in EPSG:28992).
#[derive(Deserialize)]
struct Scenario {
    route: ScenarioRoute,
    #[serde(default)]
    tracks: Vec<Vec<[f64; 2]>>,
    #[serde(default)]
    technical_rooms: Vec<Vec<[f64; 2]>>,
}

#[derive(Deserialize)]
struct ScenarioRoute {
    #[serde(default)]
    name: String,
    vertices: Vec<[f64; 2]>,
    #[serde(default = "default_epsg")]
    epsg: u32,
    #[serde(default)]
    metadata: RouteMetadata,
}

fn default_epsg() -> u32 {
    28992
}

fn line_string(vertices: &[[f64; 2]]) -> LineString<f64> {
    LineString::from(
        vertices
            .iter()
            .map(|v| (v[0], v[1]))
            .collect::<Vec<(f64, f64)>>(),
    )
}

fn scenario_layers(scenario: &Scenario) -> ReferenceLayers {
    let mut layers = ReferenceLayers::default();
    if !scenario.tracks.is_empty() {
        layers.tracks = Some(Arc::new(InMemoryLayer::from_lines(
            scenario.tracks.iter().map(|t| line_string(t)).collect(),
        )));
    }
    if !scenario.technical_rooms.is_empty() {
        layers.technical_rooms = Some(Arc::new(InMemoryLayer::from_polygons(
            scenario
                .technical_rooms
                .iter()
                .map(|ring| Polygon::new(line_string(ring), vec![]))
                .collect(),
        )));
    }
    layers
}

fn status_tag(status: RuleStatus) -> &'static str {
    match status {
        RuleStatus::Pass => "PASS",
        RuleStatus::Fail => "FAIL",
        RuleStatus::NotEvaluated => "PENDING",
        RuleStatus::NotApplicable => "N/A",
    }
}

fn summary_label(status: OverallStatus) -> &'static str {
    match status {
        OverallStatus::Pass => "Pass",
        OverallStatus::Fail => "Fail",
        OverallStatus::Incomplete => "Partial",
        OverallStatus::NotEvaluated => "Not evaluated",
    }
}

async fn evaluate(path: &PathBuf) -> io::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let scenario: Scenario =
        serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let geometry = RouteGeometry::new(
        line_string(&scenario.route.vertices),
        Crs::from_epsg(scenario.route.epsg),
    )
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let name = if scenario.route.name.is_empty() {
        "Route".to_string()
    } else {
        scenario.route.name.clone()
    };
    let length = geometry.length_m();

    let layers = scenario_layers(&scenario);
    let mut session = Session::new(EngineConfig::default());
    let id = session.create_route(&name, geometry, scenario.route.metadata.clone());

    let result = session
        .evaluate_route(id, &layers)
        .await
        .map_err(|e| io::Error::other(e.to_string()))?;

    println!("{} ({})", name, format_distance(length));
    println!();
    for rule in &result.rules {
        println!(
            "[{:>7}] {:<26} {:<22} {}",
            status_tag(rule.status),
            rule.id,
            rule.clause,
            rule.message
        );
    }
    println!();
    let summary = &result.summary;
    println!(
        "Summary: {} — {} passed, {} failed, {} pending, {} not applicable",
        summary_label(summary.status),
        summary.pass_count,
        summary.fail_count,
        summary.pending_count,
        summary.not_applicable_count
    );
    Ok(())
}

fn list_rules() {
    for rule in RULES {
        println!("{:<26} {:<22} {}", rule.id, rule.clause, rule.title);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Evaluate { scenario } => evaluate(&scenario).await,
        Command::Rules => {
            list_rules();
            Ok(())
        }
    }
}
