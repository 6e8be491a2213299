//! Position extraction: match record + selector -> filtered (x, y, side) samples

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HeatmapError, Result};
use crate::match_data::{MatchRecord, RoundInfo, Side, TickRange, TickSample};

/// Which rounds contribute samples
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoundSelection {
    #[default]
    All,
    Only(BTreeSet<u32>),
}

impl RoundSelection {
    pub fn only<I: IntoIterator<Item = u32>>(rounds: I) -> Self {
        RoundSelection::Only(rounds.into_iter().collect())
    }

    pub fn includes(&self, round_num: u32) -> bool {
        match self {
            RoundSelection::All => true,
            RoundSelection::Only(set) => set.contains(&round_num),
        }
    }

    /// Parse "all" or a comma-separated list like "1,2,3"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(RoundSelection::All);
        }

        let mut rounds = BTreeSet::new();
        for part in s.split(',') {
            let part = part.trim();
            let round = part.parse::<u32>().map_err(|_| {
                HeatmapError::InvalidParameter(format!("invalid round number '{}'", part))
            })?;
            rounds.insert(round);
        }
        Ok(RoundSelection::Only(rounds))
    }
}

impl Serialize for RoundSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RoundSelection::All => serializer.serialize_str("all"),
            RoundSelection::Only(set) => set.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RoundSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(BTreeSet<u32>),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::List(set) => Ok(RoundSelection::Only(set)),
            Raw::Text(s) => RoundSelection::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Which side's samples contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideFilter {
    #[default]
    Both,
    Only(Side),
}

impl SideFilter {
    pub fn matches(&self, side: Option<Side>) -> bool {
        match self {
            SideFilter::Both => true,
            SideFilter::Only(wanted) => side == Some(*wanted),
        }
    }

    /// Sides to build grids for
    pub fn sides(&self) -> Vec<Side> {
        match self {
            SideFilter::Both => Side::BOTH.to_vec(),
            SideFilter::Only(side) => vec![*side],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SideFilter::Both => "both",
            SideFilter::Only(side) => side.label(),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("both") {
            return Ok(SideFilter::Both);
        }
        Side::parse(s)
            .map(SideFilter::Only)
            .ok_or_else(|| HeatmapError::InvalidParameter(format!("invalid side '{}'", s)))
    }
}

impl Serialize for SideFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for SideFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SideFilter::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Seconds relative to a round's active-play start. Serialized as `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct TimeWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl From<[f64; 2]> for TimeWindow {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            start_secs: pair[0],
            end_secs: pair[1],
        }
    }
}

impl From<TimeWindow> for [f64; 2] {
    fn from(window: TimeWindow) -> Self {
        [window.start_secs, window.end_secs]
    }
}

impl TimeWindow {
    pub fn new(start_secs: f64, end_secs: f64) -> Result<Self> {
        if !start_secs.is_finite() || !end_secs.is_finite() || start_secs < 0.0 {
            return Err(HeatmapError::InvalidParameter(format!(
                "invalid time window {},{}",
                start_secs, end_secs
            )));
        }
        if end_secs < start_secs {
            return Err(HeatmapError::InvalidParameter(format!(
                "time window ends ({}) before it starts ({})",
                end_secs, start_secs
            )));
        }
        Ok(Self {
            start_secs,
            end_secs,
        })
    }

    /// Parse "start,end" in seconds, e.g. "0,30"
    pub fn parse(s: &str) -> Result<Self> {
        let (start, end) = s.split_once(',').ok_or_else(|| {
            HeatmapError::InvalidParameter(format!("time window '{}' is not 'start,end'", s))
        })?;
        let parse = |v: &str| {
            v.trim().parse::<f64>().map_err(|_| {
                HeatmapError::InvalidParameter(format!("invalid time window value '{}'", v))
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Tick offsets from active start, truncated toward zero
    pub fn tick_offsets(&self, tick_rate: f64) -> (i64, i64) {
        (
            (self.start_secs * tick_rate) as i64,
            (self.end_secs * tick_rate) as i64,
        )
    }
}

/// Filter applied when pulling positions out of a match
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSelector {
    pub rounds: RoundSelection,
    pub side: SideFilter,
    pub alive_only: bool,
    pub time_window: Option<TimeWindow>,
}

impl Default for PositionSelector {
    fn default() -> Self {
        Self {
            rounds: RoundSelection::All,
            side: SideFilter::Both,
            alive_only: true,
            time_window: None,
        }
    }
}

impl PositionSelector {
    pub fn with_rounds(mut self, rounds: RoundSelection) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_side(mut self, side: SideFilter) -> Self {
        self.side = side;
        self
    }

    pub fn with_time_window(mut self, window: Option<TimeWindow>) -> Self {
        self.time_window = window;
        self
    }

    pub fn with_alive_only(mut self, alive_only: bool) -> Self {
        self.alive_only = alive_only;
        self
    }

    fn accepts(&self, sample: &TickSample) -> bool {
        (!self.alive_only || sample.is_alive) && self.side.matches(sample.side)
    }
}

/// One extracted position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub side: Option<Side>,
}

/// Tick range of a round after applying an optional time window.
///
/// The window starts `start_secs` into active play and spans
/// `end_secs - start_secs`, never running past the round's `endTick`.
pub fn round_window(round: &RoundInfo, tick_rate: f64, window: Option<&TimeWindow>) -> TickRange {
    let active = round.active_range();
    let Some(window) = window else {
        return active;
    };

    let (start_offset, end_offset) = window.tick_offsets(tick_rate);
    let start = active.start.saturating_add(start_offset);
    let span = end_offset.saturating_sub(start_offset);
    let end = start.saturating_add(span).min(active.end);
    TickRange::new(start, end)
}

/// Tick ranges of every selected round present in the record
pub fn selected_ranges(record: &MatchRecord, selector: &PositionSelector) -> Vec<TickRange> {
    let tick_rate = record.tick_rate();
    record
        .rounds
        .iter()
        .filter(|r| selector.rounds.includes(r.round_num))
        .map(|r| round_window(r, tick_rate, selector.time_window.as_ref()))
        .collect()
}

/// Pull filtered positions out of a match.
///
/// A sample is kept when its tick lies in any selected round's range, it
/// passes the alive and side filters, and it carries both coordinates.
/// Output follows input tick order. Never fails; no match yields no samples.
pub fn extract(record: &MatchRecord, selector: &PositionSelector) -> Vec<PositionSample> {
    let ranges = selected_ranges(record, selector);
    if ranges.is_empty() {
        return Vec::new();
    }

    record
        .ticks
        .iter()
        .filter(|t| ranges.iter().any(|r| r.contains(t.tick)))
        .filter(|t| selector.accepts(t))
        .filter_map(|t| {
            t.position().map(|(x, y)| PositionSample {
                x,
                y,
                side: t.side,
            })
        })
        .collect()
}
