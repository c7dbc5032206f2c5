use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use maze_escape_server::constants::{GHOST_HIT_PENALTY, TICK_MS, TICK_RATE, WIN_BASE_POINTS};
use maze_escape_server::engine::GameEngine;
use maze_escape_server::grid::GridMap;
use maze_escape_server::types::{InputState, RoundEvent, Snapshot};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Run one custom scenario instead of the default pair.
    #[arg(long)]
    single: bool,
    #[arg(long)]
    minutes: Option<i32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    minutes: i32,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    minutes: i32,
    #[serde(rename = "roundsWon")]
    rounds_won: i32,
    #[serde(rename = "totalScore")]
    total_score: i32,
    #[serde(rename = "bestRoundMs")]
    best_round_ms: Option<u64>,
    #[serde(rename = "keysCollected")]
    keys_collected: i32,
    #[serde(rename = "ghostHits")]
    ghost_hits: i32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "roundsWonTotal")]
    rounds_won_total: i32,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    timestamp: String,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let started_at = timestamp();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint));

    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut total_anomalies = 0usize;
    let mut rounds_won_total = 0;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({ "minutes": scenario.minutes }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        rounds_won_total += scenario_run.result.rounds_won;

        emit_log(
            "info",
            "scenario_finished",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.finished_tick),
            json!({
                "roundsWon": scenario_run.result.rounds_won,
                "totalScore": scenario_run.result.total_score,
                "ghostHits": scenario_run.result.ghost_hits,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run.result).expect("scenario result should serialize")
        );
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        run_id.clone(),
        started_at,
        timestamp(),
        scenario_results,
        total_anomalies,
        rounds_won_total,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "roundsWonTotal": summary.rounds_won_total,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let grid = GridMap::default_level();
    let mut engine = GameEngine::new(grid, scenario.seed);

    let mut rounds_won = 0;
    let mut keys_collected = 0;
    let mut ghost_hits = 0;
    let mut best_round_ms: Option<u64> = None;
    let mut total_score = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut last_tick = 0u64;

    let tick_limit = scenario.minutes as u64 * 60 * TICK_RATE as u64;
    for _ in 0..tick_limit {
        let plan = {
            let snapshot = engine.build_snapshot(false);
            decide_input(&snapshot, engine.grid())
        };
        engine.set_input(plan);
        engine.step(TICK_MS);

        let snapshot = engine.build_snapshot(true);
        last_tick = snapshot.tick;
        total_score = snapshot.total_score;

        for message in collect_snapshot_anomalies(&snapshot, engine.grid()) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }

        for event in &snapshot.events {
            match event {
                RoundEvent::RoundWon { elapsed_ms, .. } => {
                    rounds_won += 1;
                    best_round_ms = Some(best_round_ms.map_or(*elapsed_ms, |best| best.min(*elapsed_ms)));
                }
                RoundEvent::KeyCollected => keys_collected += 1,
                RoundEvent::GhostHit { .. } => ghost_hits += 1,
                _ => {}
            }
        }
    }

    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            minutes: scenario.minutes,
            rounds_won,
            total_score,
            best_round_ms,
            keys_collected,
            ghost_hits,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

/// Drives the player: fetch the key first, then walk to the floor cell in
/// front of the door and press into it. Stateless; replans from the snapshot
/// every tick, so round resets need no special handling.
fn decide_input(snapshot: &Snapshot, grid: &GridMap) -> InputState {
    let player = (snapshot.player.x, snapshot.player.z);
    let player_cell = grid.world_to_cell(player.0, player.1);

    if snapshot.key.active {
        let key_cell = grid.world_to_cell(snapshot.key.x, snapshot.key.z);
        return steer_along_path(grid, player, player_cell, key_cell);
    }

    let door_cell = (snapshot.door.row, snapshot.door.col);
    if door_cell.0 < 0 {
        // Degenerate round with no door placed; nothing to chase.
        return InputState::default();
    }
    let Some(access_cell) = door_access_cell(grid, door_cell) else {
        return InputState::default();
    };
    if player_cell == access_cell {
        let center = grid.cell_center(access_cell.0, access_cell.1);
        return push_into_door(door_cell, access_cell, player, center);
    }
    steer_along_path(grid, player, player_cell, access_cell)
}

const DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn door_access_cell(grid: &GridMap, door: (i32, i32)) -> Option<(i32, i32)> {
    DIRECTIONS.iter().find_map(|(d_row, d_col)| {
        let neighbor = (door.0 + d_row, door.1 + d_col);
        grid.is_floor(neighbor.0, neighbor.1).then_some(neighbor)
    })
}

fn steer_along_path(
    grid: &GridMap,
    player: (f32, f32),
    from: (i32, i32),
    to: (i32, i32),
) -> InputState {
    let next = if from == to {
        from
    } else {
        bfs_next_step(grid, from, to).unwrap_or(from)
    };
    let (x, z) = grid.cell_center(next.0, next.1);
    steer_toward(player, (x, z))
}

fn steer_toward(player: (f32, f32), target: (f32, f32)) -> InputState {
    const DEADBAND: f32 = 0.04;
    InputState {
        up: target.1 < player.1 - DEADBAND,
        down: target.1 > player.1 + DEADBAND,
        left: target.0 < player.0 - DEADBAND,
        right: target.0 > player.0 + DEADBAND,
    }
}

/// Presses into the door wall while centering on the access cell, so the
/// leading corners of the collision box land in the door cell, not in the
/// walls beside it.
fn push_into_door(
    door: (i32, i32),
    access: (i32, i32),
    player: (f32, f32),
    access_center: (f32, f32),
) -> InputState {
    let mut input = steer_toward(player, access_center);
    if door.0 < access.0 {
        input.up = true;
        input.down = false;
    } else if door.0 > access.0 {
        input.down = true;
        input.up = false;
    } else if door.1 < access.1 {
        input.left = true;
        input.right = false;
    } else {
        input.right = true;
        input.left = false;
    }
    input
}

/// First step of a shortest path between two floor cells, or None when the
/// target is unreachable.
fn bfs_next_step(grid: &GridMap, from: (i32, i32), to: (i32, i32)) -> Option<(i32, i32)> {
    if from == to {
        return Some(to);
    }
    if !grid.is_floor(from.0, from.1) || !grid.is_floor(to.0, to.1) {
        return None;
    }

    let mut parents: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
    let mut queue = VecDeque::new();
    parents.insert(from, from);
    queue.push_back(from);
    while let Some(cell) = queue.pop_front() {
        if cell == to {
            break;
        }
        for (d_row, d_col) in DIRECTIONS {
            let next = (cell.0 + d_row, cell.1 + d_col);
            if grid.is_floor(next.0, next.1) && !parents.contains_key(&next) {
                parents.insert(next, cell);
                queue.push_back(next);
            }
        }
    }

    if !parents.contains_key(&to) {
        return None;
    }
    let mut cursor = to;
    while parents[&cursor] != from {
        cursor = parents[&cursor];
    }
    Some(cursor)
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, grid: &GridMap) -> Vec<String> {
    let mut anomalies = Vec::new();

    for points in &snapshot.scores {
        if !(0..=WIN_BASE_POINTS).contains(points) {
            anomalies.push(format!("round score out of range: {points}"));
        }
    }
    if !(0..=WIN_BASE_POINTS).contains(&snapshot.potential_points) {
        anomalies.push(format!(
            "potential points out of range: {}",
            snapshot.potential_points
        ));
    }
    if snapshot.score_penalty < 0 || snapshot.score_penalty % GHOST_HIT_PENALTY != 0 {
        anomalies.push(format!("invalid score penalty: {}", snapshot.score_penalty));
    }

    let player_cell = grid.world_to_cell(snapshot.player.x, snapshot.player.z);
    if !grid.is_floor(player_cell.0, player_cell.1) {
        anomalies.push(format!(
            "player inside a wall: ({}, {})",
            snapshot.player.x, snapshot.player.z
        ));
    }

    if snapshot.key.active {
        let key_cell = grid.world_to_cell(snapshot.key.x, snapshot.key.z);
        if !grid.is_floor(key_cell.0, key_cell.1) {
            anomalies.push(format!(
                "active key off the floor: ({}, {})",
                snapshot.key.x, snapshot.key.z
            ));
        }
    }

    for (idx, ghost) in snapshot.ghosts.iter().enumerate() {
        let ghost_cell = grid.world_to_cell(ghost.x, ghost.z);
        if !grid.is_floor(ghost_cell.0, ghost_cell.1) {
            anomalies.push(format!("ghost {idx} inside a wall: ({}, {})", ghost.x, ghost.z));
        }
    }

    if snapshot.door.row >= 0 {
        let interior = snapshot.door.row >= 1
            && snapshot.door.row < grid.size() - 1
            && snapshot.door.col >= 1
            && snapshot.door.col < grid.size() - 1;
        if !interior || grid.is_floor(snapshot.door.row, snapshot.door.col) {
            anomalies.push(format!(
                "door not on an interior wall: ({}, {})",
                snapshot.door.row, snapshot.door.col
            ));
        }
    }

    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }));

    if cli.single || cli.minutes.is_some() {
        let minutes = cli.minutes.unwrap_or(2).clamp(1, 10);
        return vec![Scenario {
            name: format!("custom-{minutes}m"),
            minutes,
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check".to_string(),
            minutes: 2,
            seed,
        },
        Scenario {
            name: "long-run".to_string(),
            minutes: 5,
            seed: normalize_seed(seed as u64 + 1),
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u32) -> String {
    format!("sim-{seed}-{}", Utc::now().timestamp_millis())
}

fn build_run_summary(
    run_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    anomaly_count: usize,
    rounds_won_total: i32,
) -> RunSummary {
    RunSummary {
        run_id,
        started_at,
        finished_at,
        scenario_count: scenarios.len(),
        anomaly_count,
        rounds_won_total,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp: timestamp(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(rounds_won: i32) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            minutes: 2,
            rounds_won,
            total_score: rounds_won * 5,
            best_round_ms: Some(8_000),
            keys_collected: rounds_won,
            ghost_hits: 1,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn build_run_summary_totals_scenarios() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
            "2026-01-01T00:05:00.000Z".to_string(),
            vec![make_result(3), make_result(2)],
            1,
            5,
        );
        assert_eq!(summary.scenario_count, 2);
        assert_eq!(summary.anomaly_count, 1);
        assert_eq!(summary.rounds_won_total, 5);
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn bfs_next_step_finds_the_shortest_corridor() {
        let grid = GridMap::parse_tiles(&["#####", "#...#", "#.#.#", "#...#", "#####"])
            .expect("grid should parse");
        // From (1,1) to (3,1) the only route is straight down the west side.
        assert_eq!(bfs_next_step(&grid, (1, 1), (3, 1)), Some((2, 1)));
        // Already there.
        assert_eq!(bfs_next_step(&grid, (1, 1), (1, 1)), Some((1, 1)));
    }

    #[test]
    fn bfs_next_step_reports_unreachable_targets() {
        let grid = GridMap::parse_tiles(&["#####", "#.#.#", "#####", "#...#", "#####"])
            .expect("grid should parse");
        assert_eq!(bfs_next_step(&grid, (1, 1), (1, 3)), None);
        assert_eq!(bfs_next_step(&grid, (1, 1), (2, 2)), None);
    }

    #[test]
    fn steer_toward_uses_a_deadband() {
        let input = steer_toward((0.0, 0.0), (1.0, -1.0));
        assert!(input.right && input.up);
        assert!(!input.left && !input.down);

        let idle = steer_toward((0.0, 0.0), (0.01, -0.01));
        assert_eq!(idle, InputState::default());
    }

    #[test]
    fn push_into_door_presses_the_door_axis_and_centers_the_other() {
        // Door north of the access cell; player east of the cell center.
        let input = push_into_door((2, 3), (3, 3), (0.2, 0.0), (0.0, 0.0));
        assert!(input.up);
        assert!(!input.down);
        assert!(input.left, "off-center position is pulled back toward the middle");
    }

    #[test]
    fn door_access_cell_prefers_the_scan_order() {
        let grid = GridMap::parse_tiles(&["#####", "#...#", "#.#.#", "#...#", "#####"])
            .expect("grid should parse");
        // Wall (2,2) has floor on all sides; up comes first.
        assert_eq!(door_access_cell(&grid, (2, 2)), Some((1, 2)));
    }

    #[test]
    fn anomaly_scan_accepts_a_fresh_engine() {
        let mut engine = GameEngine::new(GridMap::default_level(), 12_345);
        let snapshot = engine.build_snapshot(false);
        let anomalies = collect_snapshot_anomalies(&snapshot, engine.grid());
        assert_eq!(anomalies, Vec::<String>::new());
    }

    #[test]
    fn anomaly_scan_flags_corrupted_state() {
        let mut engine = GameEngine::new(GridMap::default_level(), 6);
        let mut snapshot = engine.build_snapshot(false);
        snapshot.scores = vec![11];
        snapshot.score_penalty = 3;
        snapshot.player.x = -100.0;
        let anomalies = collect_snapshot_anomalies(&snapshot, engine.grid());
        assert!(anomalies.iter().any(|a| a.contains("round score")));
        assert!(anomalies.iter().any(|a| a.contains("score penalty")));
        assert!(anomalies.iter().any(|a| a.contains("player inside a wall")));
    }

    #[test]
    fn write_summary_fails_when_parent_is_missing() {
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            "2026-01-01T00:00:00.000Z".to_string(),
            "2026-01-01T00:05:00.000Z".to_string(),
            vec![make_result(1)],
            0,
            1,
        );
        let target = std::env::temp_dir()
            .join("maze-escape-missing-dir")
            .join("nested")
            .join("summary.json");
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn short_simulation_stays_anomaly_free() {
        let scenario = Scenario {
            name: "smoke".to_string(),
            minutes: 1,
            seed: 99,
        };
        let run = run_scenario(&scenario);
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
        assert_eq!(run.finished_tick, 60 * TICK_RATE as u64);
    }
}
