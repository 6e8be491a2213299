//! Round side resolution
//!
//! Per-tick side tags are authoritative, but aggregation buckets on team
//! names. For each round the resolver scans a short window right after
//! active play starts and records which side each team's players carry.
//!
//! Contract:
//! - The window is `[active_start, active_start + window_ticks]` in raw ticks,
//!   independent of the match tick rate.
//! - Ticks are visited in order; a later tick of the same team overwrites the
//!   side recorded for it.
//! - The scan of a round stops as soon as two distinct teams have a side.
//! - Rounds with fewer than two teams in the window are unresolved.
//!
//! The scan binary-searches into the tick list, so ticks must be in
//! non-decreasing tick order (the match loader guarantees this).

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::constants::{RESOLUTION_WINDOW_TICKS, TEAMS_PER_ROUND};
use crate::match_data::{MatchRecord, PlayerInfo, Side, TickRange, TickSample};

/// Player identity -> team name
pub type TeamLookup = HashMap<String, String>;

/// Build the identity -> team lookup from the roster.
/// Entries without an identity or a team are skipped; later entries win.
pub fn team_lookup(players: &[PlayerInfo]) -> TeamLookup {
    players
        .iter()
        .filter_map(|p| {
            let id = p.identity()?;
            let team = p.team.as_deref().filter(|t| !t.is_empty())?;
            Some((id.to_string(), team.to_string()))
        })
        .collect()
}

/// Sides resolved for one round: team name -> side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSides {
    sides: BTreeMap<String, Side>,
}

impl RoundSides {
    pub fn side_of(&self, team: &str) -> Option<Side> {
        self.sides.get(team).copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.sides.len() >= TEAMS_PER_ROUND
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Side)> {
        self.sides.iter().map(|(team, side)| (team.as_str(), *side))
    }
}

impl<const N: usize> From<[(&str, Side); N]> for RoundSides {
    fn from(entries: [(&str, Side); N]) -> Self {
        Self {
            sides: entries
                .into_iter()
                .map(|(team, side)| (team.to_string(), side))
                .collect(),
        }
    }
}

/// Round number -> resolved sides. Unresolved rounds keep their partial mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSideAssignment {
    rounds: BTreeMap<u32, RoundSides>,
}

impl RoundSideAssignment {
    pub fn insert(&mut self, round_num: u32, sides: RoundSides) {
        self.rounds.insert(round_num, sides);
    }

    pub fn get(&self, round_num: u32) -> Option<&RoundSides> {
        self.rounds.get(&round_num)
    }

    pub fn side_of(&self, round_num: u32, team: &str) -> Option<Side> {
        self.get(round_num).and_then(|s| s.side_of(team))
    }

    pub fn unresolved_rounds(&self) -> Vec<u32> {
        self.rounds
            .iter()
            .filter(|(_, s)| !s.is_resolved())
            .map(|(r, _)| *r)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &RoundSides)> {
        self.rounds.iter().map(|(r, s)| (*r, s))
    }
}

/// Windowed side resolver over an externally supplied identity -> team lookup
pub struct SideResolver<'a> {
    lookup: &'a TeamLookup,
    window_ticks: i64,
}

impl<'a> SideResolver<'a> {
    pub fn new(lookup: &'a TeamLookup) -> Self {
        Self {
            lookup,
            window_ticks: RESOLUTION_WINDOW_TICKS,
        }
    }

    pub fn with_window(mut self, window_ticks: i64) -> Self {
        self.window_ticks = window_ticks.max(0);
        self
    }

    pub fn window(&self, active_start: i64) -> TickRange {
        TickRange::new(active_start, active_start.saturating_add(self.window_ticks))
    }

    /// Scan one round's window. `ticks` must be sorted by tick.
    pub fn resolve_round(&self, ticks: &[TickSample], active_start: i64) -> RoundSides {
        let window = self.window(active_start);
        let first = ticks.partition_point(|t| t.tick < window.start);

        let mut sides = RoundSides::default();
        for sample in ticks[first..].iter().take_while(|t| t.tick <= window.end) {
            let Some(side) = sample.side else {
                continue;
            };
            let Some(team) = sample.identity().and_then(|id| self.lookup.get(id)) else {
                continue;
            };

            sides.sides.insert(team.clone(), side);
            if sides.is_resolved() {
                break;
            }
        }

        sides
    }

    /// Resolve every round of the record
    pub fn resolve(&self, record: &MatchRecord) -> RoundSideAssignment {
        let mut assignment = RoundSideAssignment::default();

        for round in &record.rounds {
            let sides = self.resolve_round(&record.ticks, round.active_start());
            debug!(
                "Round {}: {}",
                round.round_num,
                sides
                    .iter()
                    .map(|(team, side)| format!("{}={}", team, side))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            assignment.insert(round.round_num, sides);
        }

        assignment
    }
}

/// Resolve sides for every round using the match roster and the default window
pub fn resolve(record: &MatchRecord) -> RoundSideAssignment {
    resolve_with_window(record, RESOLUTION_WINDOW_TICKS)
}

/// Resolve sides with an explicit window width in raw ticks
pub fn resolve_with_window(record: &MatchRecord, window_ticks: i64) -> RoundSideAssignment {
    let lookup = team_lookup(&record.players);
    SideResolver::new(&lookup)
        .with_window(window_ticks)
        .resolve(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::RoundInfo;

    fn player(id: &str, team: &str) -> PlayerInfo {
        PlayerInfo {
            steam_id: Some(id.to_string()),
            name: None,
            team: Some(team.to_string()),
        }
    }

    fn tick(tick: i64, id: &str, side: Side) -> TickSample {
        TickSample {
            tick,
            steam_id: Some(id.to_string()),
            name: None,
            team: None,
            side: Some(side),
            x: Some(0.0),
            y: Some(0.0),
            is_alive: true,
        }
    }

    fn round(num: u32, start: i64, freeze: i64, end: i64) -> RoundInfo {
        RoundInfo {
            round_num: num,
            start_tick: start,
            freeze_time_end_tick: Some(freeze),
            end_tick: end,
        }
    }

    fn roster() -> Vec<PlayerInfo> {
        vec![player("a1", "A"), player("a2", "A"), player("b1", "B")]
    }

    #[test]
    fn test_resolves_two_teams_near_start() {
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 1000, 5000)],
            ticks: vec![tick(1001, "a1", Side::T), tick(1003, "b1", Side::Ct)],
            ..Default::default()
        };

        let assignment = resolve(&record);
        let sides = assignment.get(1).unwrap();
        assert!(sides.is_resolved());
        assert_eq!(sides, &RoundSides::from([("A", Side::T), ("B", Side::Ct)]));
    }

    #[test]
    fn test_single_team_is_unresolved() {
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 1000, 5000)],
            ticks: vec![tick(1001, "a1", Side::T), tick(1050, "a2", Side::T)],
            ..Default::default()
        };

        let assignment = resolve(&record);
        assert!(!assignment.get(1).unwrap().is_resolved());
        assert_eq!(assignment.get(1).unwrap().side_of("A"), Some(Side::T));
        assert_eq!(assignment.unresolved_rounds(), vec![1]);
    }

    #[test]
    fn test_ticks_outside_window_ignored() {
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 1000, 5000)],
            ticks: vec![
                tick(999, "b1", Side::Ct),
                tick(1000, "a1", Side::T),
                tick(1101, "b1", Side::Ct),
            ],
            ..Default::default()
        };

        let sides = resolve(&record).get(1).cloned().unwrap();
        assert_eq!(sides.len(), 1);
        assert_eq!(sides.side_of("B"), None);
    }

    #[test]
    fn test_window_end_is_inclusive() {
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 1000, 5000)],
            ticks: vec![tick(1000, "a1", Side::T), tick(1100, "b1", Side::Ct)],
            ..Default::default()
        };
        assert!(resolve(&record).get(1).unwrap().is_resolved());
    }

    #[test]
    fn test_huge_window_saturates() {
        let lookup = team_lookup(&roster());
        let resolver = SideResolver::new(&lookup).with_window(i64::MAX);
        assert_eq!(resolver.window(1000), TickRange::new(1000, i64::MAX));

        let ticks = vec![tick(1001, "a1", Side::T), tick(4000, "b1", Side::Ct)];
        let sides = resolver.resolve_round(&ticks, 1000);
        assert!(sides.is_resolved());
    }

    #[test]
    fn test_scan_stops_at_second_team() {
        // A conflicting tag after both teams are known must not be read
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 0, 5000)],
            ticks: vec![
                tick(1, "a1", Side::T),
                tick(2, "b1", Side::Ct),
                tick(3, "a2", Side::Ct),
            ],
            ..Default::default()
        };
        assert_eq!(resolve(&record).side_of(1, "A"), Some(Side::T));
    }

    #[test]
    fn test_same_team_overwrites_until_resolved() {
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 0, 5000)],
            ticks: vec![
                tick(1, "a1", Side::Ct),
                tick(2, "a2", Side::T),
                tick(3, "b1", Side::Ct),
            ],
            ..Default::default()
        };
        assert_eq!(resolve(&record).side_of(1, "A"), Some(Side::T));
    }

    #[test]
    fn test_unknown_players_and_missing_sides_skipped() {
        let mut untagged = tick(2, "a1", Side::T);
        untagged.side = None;
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 0, 5000)],
            ticks: vec![tick(1, "ghost", Side::T), untagged, tick(3, "b1", Side::Ct)],
            ..Default::default()
        };
        let sides = resolve(&record).get(1).cloned().unwrap();
        assert_eq!(sides.len(), 1);
        assert_eq!(sides.side_of("B"), Some(Side::Ct));
    }

    #[test]
    fn test_window_does_not_scale_with_tick_rate() {
        // At 128 tick the fixed 100-tick window covers under a second of play;
        // a team first seen 0.9s in at 128 tick is missed, at 64 tick it is not.
        let ticks = vec![tick(0, "a1", Side::T), tick(116, "b1", Side::Ct)];
        let record = MatchRecord {
            players: roster(),
            rounds: vec![round(1, 0, 0, 5000)],
            ticks,
            ..Default::default()
        };
        assert!(!resolve(&record).get(1).unwrap().is_resolved());
        assert!(resolve_with_window(&record, 116).get(1).unwrap().is_resolved());
    }

    #[test]
    fn test_team_lookup_uses_identity_fallback() {
        let players = vec![
            PlayerInfo {
                steam_id: None,
                name: Some("named".to_string()),
                team: Some("A".to_string()),
            },
            PlayerInfo {
                steam_id: Some("x".to_string()),
                name: None,
                team: None,
            },
        ];
        let lookup = team_lookup(&players);
        assert_eq!(lookup.get("named").map(String::as_str), Some("A"));
        assert!(!lookup.contains_key("x"));
    }
}
