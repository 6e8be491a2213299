//! Loader for match record JSON documents
//!
//! Accepts the flat record, records nested under `game`, and the match
//! store's `{demo_id, metadata, data}` envelope.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde_json::{Map, Value};

use super::types::MatchRecord;
use crate::error::{HeatmapError, Result};

/// Load and validate a match record from a JSON file
pub fn load_match<P: AsRef<Path>>(path: P) -> Result<MatchRecord> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| HeatmapError::io(path, e))?;
    let record = parse_match(&content)?;

    info!(
        "Loaded match from {}: {} players, {} rounds, {} ticks",
        path.display(),
        record.players.len(),
        record.rounds.len(),
        record.ticks.len()
    );

    Ok(record)
}

/// Parse and validate a match record from JSON text
pub fn parse_match(content: &str) -> Result<MatchRecord> {
    let value: Value = serde_json::from_str(content)?;
    match_from_value(value)
}

/// Build a validated match record from an already parsed JSON value
pub fn match_from_value(value: Value) -> Result<MatchRecord> {
    let Value::Object(root) = value else {
        return Err(HeatmapError::MalformedMatch(
            "top-level document is not an object".to_string(),
        ));
    };

    let flattened = flatten_envelopes(root);
    let mut record: MatchRecord = serde_json::from_value(Value::Object(flattened))
        .map_err(|e| HeatmapError::MalformedMatch(e.to_string()))?;

    validate_rounds(&mut record)?;
    ensure_tick_order(&mut record);

    Ok(record)
}

/// Strip the store envelope, then hoist fields out of a nested `game` object.
fn flatten_envelopes(mut root: Map<String, Value>) -> Map<String, Value> {
    let is_store_envelope = root.contains_key("demo_id") || root.contains_key("metadata");
    if is_store_envelope {
        if let Some(Value::Object(data)) = root.remove("data") {
            root = data;
        }
    }

    if let Some(Value::Object(game)) = root.remove("game") {
        // Rounds and ticks come from the game block when it has them
        for key in ["rounds", "ticks"] {
            if let Some(v) = game.get(key) {
                root.insert(key.to_string(), v.clone());
            }
        }
        for key in ["header", "players"] {
            if !root.contains_key(key) {
                if let Some(v) = game.get(key) {
                    root.insert(key.to_string(), v.clone());
                }
            }
        }
    }

    root
}

/// Duplicate round numbers and inverted rounds are fatal. A freeze-time end
/// before the round start means the event was never recorded, so the round
/// falls back to its start tick.
fn validate_rounds(record: &mut MatchRecord) -> Result<()> {
    let mut seen = HashSet::new();

    for round in &mut record.rounds {
        if !seen.insert(round.round_num) {
            return Err(HeatmapError::MalformedMatch(format!(
                "duplicate roundNum {}",
                round.round_num
            )));
        }

        if round.end_tick <= round.start_tick {
            return Err(HeatmapError::MalformedMatch(format!(
                "round {}: endTick {} is not after startTick {}",
                round.round_num, round.end_tick, round.start_tick
            )));
        }

        if let Some(freeze_end) = round.freeze_time_end_tick
            && freeze_end < round.start_tick
        {
            warn!(
                "Round {}: freezeTimeEndTick {} precedes startTick {}; using startTick",
                round.round_num, freeze_end, round.start_tick
            );
            round.freeze_time_end_tick = None;
        }
    }

    Ok(())
}

/// Windowed scans need ticks in non-decreasing order. Out-of-order input is
/// stably re-sorted so samples sharing a tick keep their recorded order.
fn ensure_tick_order(record: &mut MatchRecord) {
    let sorted = record.ticks.windows(2).all(|w| w[0].tick <= w[1].tick);
    if !sorted {
        warn!(
            "Tick samples are not in tick order; sorting {} samples",
            record.ticks.len()
        );
        record.ticks.sort_by_key(|t| t.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::Side;

    const SAMPLE_MATCH: &str = r#"{
        "header": {"mapName": "de_mirage", "tickRate": 128},
        "players": [
            {"steamId": "1", "name": "alpha", "team": "Blue"},
            {"name": "bravo", "team": "Red"}
        ],
        "rounds": [
            {"roundNum": 1, "startTick": 0, "freezeTimeEndTick": 64, "endTick": 1000}
        ],
        "ticks": [
            {"tick": 64, "steamId": "1", "team": "Blue", "side": "CT", "x": 10.0, "y": 20.0, "isAlive": true},
            {"tick": 65, "name": "bravo", "team": "Red", "side": "T", "x": -5.0, "y": 3.5}
        ]
    }"#;

    #[test]
    fn test_parse_flat_match() {
        let record = parse_match(SAMPLE_MATCH).unwrap();

        assert_eq!(record.map_name(), Some("de_mirage"));
        assert_eq!(record.tick_rate(), 128.0);
        assert_eq!(record.players.len(), 2);
        assert_eq!(record.rounds[0].active_start(), 64);
        assert_eq!(record.ticks[1].side, Some(Side::T));
        assert!(record.ticks[1].is_alive);
    }

    #[test]
    fn test_parse_game_and_store_envelopes() {
        let nested = r#"{
            "demo_id": "abc",
            "metadata": {"map_name": "de_ancient"},
            "data": {
                "header": {"mapName": "de_ancient"},
                "game": {
                    "rounds": [{"roundNum": 3, "startTick": 10, "endTick": 20}],
                    "ticks": [{"tick": 12, "name": "x", "side": "T", "x": 0, "y": 0}]
                }
            }
        }"#;
        let record = parse_match(nested).unwrap();

        assert_eq!(record.map_name(), Some("de_ancient"));
        assert_eq!(record.round_numbers(), vec![3]);
        assert_eq!(record.ticks.len(), 1);
    }

    #[test]
    fn test_missing_round_boundary_is_fatal() {
        let bad = r#"{"rounds": [{"roundNum": 1, "startTick": 0}]}"#;
        let err = parse_match(bad).unwrap_err();
        assert!(matches!(err, HeatmapError::MalformedMatch(_)));
    }

    #[test]
    fn test_inverted_round_is_fatal() {
        let bad = r#"{"rounds": [{"roundNum": 1, "startTick": 500, "endTick": 100}]}"#;
        assert!(matches!(
            parse_match(bad),
            Err(HeatmapError::MalformedMatch(_))
        ));
    }

    #[test]
    fn test_duplicate_round_is_fatal() {
        let bad = r#"{"rounds": [
            {"roundNum": 1, "startTick": 0, "endTick": 100},
            {"roundNum": 1, "startTick": 200, "endTick": 300}
        ]}"#;
        assert!(matches!(
            parse_match(bad),
            Err(HeatmapError::MalformedMatch(_))
        ));
    }

    #[test]
    fn test_unrecorded_freeze_end_falls_back_to_start() {
        let json = r#"{"rounds": [
            {"roundNum": 1, "startTick": 0, "freezeTimeEndTick": 640, "endTick": 5000},
            {"roundNum": 2, "startTick": 5100, "freezeTimeEndTick": 0, "endTick": 9000}
        ]}"#;
        let record = parse_match(json).unwrap();

        assert_eq!(record.rounds.len(), 2);
        assert_eq!(record.rounds[0].active_start(), 640);
        assert_eq!(record.rounds[1].freeze_time_end_tick, None);
        assert_eq!(record.rounds[1].active_start(), record.rounds[1].start_tick);
    }

    #[test]
    fn test_unparsable_document() {
        assert!(matches!(parse_match("{not json"), Err(HeatmapError::Json(_))));
        assert!(matches!(
            parse_match("[1, 2]"),
            Err(HeatmapError::MalformedMatch(_))
        ));
    }

    #[test]
    fn test_unsorted_ticks_are_stably_sorted() {
        let json = r#"{"ticks": [
            {"tick": 9, "name": "a"},
            {"tick": 3, "name": "b"},
            {"tick": 9, "name": "c"},
            {"tick": 3, "name": "d"}
        ]}"#;
        let record = parse_match(json).unwrap();
        let order: Vec<_> = record.ticks.iter().filter_map(|t| t.identity()).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }
}
