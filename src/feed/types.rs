//! Normalized input types handed over by the ETL collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::odds::parse_american_odds;
use crate::error::{EngineError, EngineResult};

/// Box-score stat a prop can be written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatKind {
    #[serde(rename = "PTS")]
    Points,
    #[serde(rename = "REB")]
    Rebounds,
    #[serde(rename = "AST")]
    Assists,
    #[serde(rename = "PA")]
    PointsAssists,
    #[serde(rename = "RA")]
    ReboundsAssists,
    #[serde(rename = "PRA")]
    PointsReboundsAssists,
}

impl StatKind {
    pub const BASE: [StatKind; 3] = [StatKind::Points, StatKind::Rebounds, StatKind::Assists];

    pub fn code(&self) -> &'static str {
        match self {
            StatKind::Points => "PTS",
            StatKind::Rebounds => "REB",
            StatKind::Assists => "AST",
            StatKind::PointsAssists => "PA",
            StatKind::ReboundsAssists => "RA",
            StatKind::PointsReboundsAssists => "PRA",
        }
    }

    /// Base stats summed to form this market. A base stat is its own component.
    pub fn components(&self) -> &'static [StatKind] {
        match self {
            StatKind::Points => &[StatKind::Points],
            StatKind::Rebounds => &[StatKind::Rebounds],
            StatKind::Assists => &[StatKind::Assists],
            StatKind::PointsAssists => &[StatKind::Points, StatKind::Assists],
            StatKind::ReboundsAssists => &[StatKind::Rebounds, StatKind::Assists],
            StatKind::PointsReboundsAssists => {
                &[StatKind::Points, StatKind::Rebounds, StatKind::Assists]
            }
        }
    }

    pub fn is_composite(&self) -> bool {
        self.components().len() > 1
    }

    /// Scoring stats get the wider matchup spread in the factor table.
    pub fn is_scoring(&self) -> bool {
        matches!(self, StatKind::Points)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StatKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PTS" | "POINTS" => Ok(StatKind::Points),
            "REB" | "REBOUNDS" => Ok(StatKind::Rebounds),
            "AST" | "ASSISTS" => Ok(StatKind::Assists),
            "PA" => Ok(StatKind::PointsAssists),
            "RA" => Ok(StatKind::ReboundsAssists),
            "PRA" => Ok(StatKind::PointsReboundsAssists),
            other => Err(EngineError::InvalidParameter(format!(
                "unknown stat code: {other}"
            ))),
        }
    }
}

/// Named history window feeding the blended prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum WindowName {
    Recent,
    Season,
    PreviousSeason,
    Career,
}

impl fmt::Display for WindowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WindowName::Recent => "recent",
            WindowName::Season => "season",
            WindowName::PreviousSeason => "previous_season",
            WindowName::Career => "career",
        };
        f.write_str(s)
    }
}

impl TryFrom<String> for WindowName {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(WindowName::Recent),
            "season" => Ok(WindowName::Season),
            "previous_season" => Ok(WindowName::PreviousSeason),
            "career" => Ok(WindowName::Career),
            other => Err(EngineError::InvalidParameter(format!(
                "unknown window name: {other}"
            ))),
        }
    }
}

/// Rotation role used to scale minutes and per-minute production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Starter,
    Sixth,
    #[default]
    Bench,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Starter => "starter",
            Role::Sixth => "sixth",
            Role::Bench => "bench",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Role::Starter),
            "sixth" => Ok(Role::Sixth),
            "bench" => Ok(Role::Bench),
            other => Err(EngineError::InvalidParameter(format!("unknown role: {other}"))),
        }
    }
}

/// One player-game row of the columnar box-score table.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxScoreRow {
    pub player_id: String,
    pub game_time: DateTime<Utc>,
    pub minutes: f64,
    #[serde(rename = "PTS")]
    pub points: u32,
    #[serde(rename = "REB")]
    pub rebounds: u32,
    #[serde(rename = "AST")]
    pub assists: u32,
    #[serde(default)]
    pub role: Option<Role>,
}

impl BoxScoreRow {
    /// Count for a base stat; composites sum their components.
    pub fn count(&self, stat: StatKind) -> u32 {
        stat.components()
            .iter()
            .map(|c| match c {
                StatKind::Points => self.points,
                StatKind::Rebounds => self.rebounds,
                _ => self.assists,
            })
            .sum()
    }
}

/// A single game observation for one player/stat pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub stat_count: u32,
    pub minutes_played: f64,
    pub game_time: DateTime<Utc>,
}

impl Observation {
    /// Negative or non-finite minutes are coerced to zero, as the tabular
    /// loader does with unparseable cells.
    pub fn new(stat_count: u32, minutes_played: f64, game_time: DateTime<Utc>) -> Self {
        let minutes_played = if minutes_played.is_finite() {
            minutes_played.max(0.0)
        } else {
            0.0
        };
        Self {
            stat_count,
            minutes_played,
            game_time,
        }
    }
}

/// Time-ordered observations for one player/stat pair within a named window.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationWindow {
    name: WindowName,
    observations: Vec<Observation>,
}

impl ObservationWindow {
    pub fn new(name: WindowName, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.game_time);
        Self { name, observations }
    }

    pub fn empty(name: WindowName) -> Self {
        Self {
            name,
            observations: Vec::new(),
        }
    }

    /// Build a window for `stat` from box-score rows of a single player.
    pub fn from_box_scores(name: WindowName, rows: &[BoxScoreRow], stat: StatKind) -> Self {
        let observations = rows
            .iter()
            .map(|r| Observation::new(r.count(stat), r.minutes, r.game_time))
            .collect();
        Self::new(name, observations)
    }

    pub fn name(&self) -> WindowName {
        self.name
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn total_count(&self) -> f64 {
        self.observations.iter().map(|o| o.stat_count as f64).sum()
    }

    pub fn total_minutes(&self) -> f64 {
        self.observations.iter().map(|o| o.minutes_played).sum()
    }

    pub fn minutes(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.minutes_played)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Over => f.write_str("over"),
            Side::Under => f.write_str("under"),
        }
    }
}

/// One side of a player prop as quoted by a book.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropQuote {
    pub player_id: String,
    pub stat: StatKind,
    pub line: f64,
    pub side: Side,
    pub american_odds: i32,
    pub book: String,
    /// Odds of the opposite side when the book quoted both.
    pub opposite_odds: Option<i32>,
}

/// Row of the tabular odds file: `player_id, player_name, stat, line, over_odds, under_odds, book`.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsRow {
    pub player_id: String,
    #[serde(default)]
    pub player_name: String,
    pub stat: String,
    pub line: f64,
    #[serde(default)]
    pub over_odds: String,
    #[serde(default)]
    pub under_odds: String,
    #[serde(default)]
    pub book: String,
}

impl OddsRow {
    /// Expand into one quote per quoted side. Blank odds cells are skipped;
    /// anything else that fails to parse is an `InvalidOdds` for the row.
    pub fn into_quotes(self) -> EngineResult<Vec<PropQuote>> {
        let stat: StatKind = self.stat.parse()?;
        if !self.line.is_finite() {
            return Err(EngineError::InvalidOdds(format!(
                "non-numeric line for {} {}",
                self.player_id, stat
            )));
        }
        let over = parse_cell(&self.over_odds)?;
        let under = parse_cell(&self.under_odds)?;

        let mut quotes = Vec::with_capacity(2);
        for (side, odds, opposite) in [(Side::Over, over, under), (Side::Under, under, over)] {
            if let Some(american_odds) = odds {
                quotes.push(PropQuote {
                    player_id: self.player_id.clone(),
                    stat,
                    line: self.line,
                    side,
                    american_odds,
                    book: self.book.clone(),
                    opposite_odds: opposite,
                });
            }
        }
        Ok(quotes)
    }
}

fn parse_cell(cell: &str) -> EngineResult<Option<i32>> {
    if cell.trim().is_empty() {
        Ok(None)
    } else {
        parse_american_odds(cell).map(Some)
    }
}
