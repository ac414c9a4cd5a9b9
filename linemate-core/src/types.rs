//! Core type definitions for linemate.
//!
//! All fundamental types used across the engine are defined here.

use compact_str::{format_compact, CompactString};
use serde::{Deserialize, Serialize};

use crate::error::{LinemateError, LinemateResult};

// ─── Identifiers ───────────────────────────────────────────────────────────

/// NHL player identifier as assigned by the upstream stats API.
pub type PlayerId = u64;

/// NHL game identifier. The decimal form encodes the season start year, the
/// game category, and a sequence number: `YYYYCCNNNN`.
pub type GameId = u64;

/// Season code in `YYYYYYYY` form, e.g. `20232024`.
pub type SeasonCode = u32;

/// Milliseconds since Unix epoch.
pub type Timestamp = u64;

// ─── Seasons ───────────────────────────────────────────────────────────────

/// Build a season code from its starting calendar year: `2023 → 20232024`.
pub fn season_for_start_year(year: u32) -> SeasonCode {
    year * 10_000 + (year + 1)
}

/// The starting calendar year of a season code: `20232024 → 2023`.
pub fn season_start_year(season: SeasonCode) -> u32 {
    season / 10_000
}

/// The season a game belongs to, derived from the year digits of its
/// identifier. Games played after New Year still carry the season's
/// starting year.
pub fn season_of_game(game_id: GameId) -> SeasonCode {
    season_for_start_year((game_id / 1_000_000) as u32)
}

// ─── Game Category ─────────────────────────────────────────────────────────

/// The category of play a game belongs to, encoded in digits five and six of
/// the game identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameCategory {
    PreSeason,
    RegularSeason,
    Playoffs,
    AllStar,
    Exhibition,
    Olympics,
    WorldCupGroup,
    WorldCupKnockout,
    Other,
}

impl GameCategory {
    /// Decode the category digits of a game identifier.
    ///
    /// Returns `None` for cancelled games (code 5), which never enter the
    /// graph. Codes outside the known range map to [`GameCategory::Other`].
    pub fn from_game_id(game_id: GameId) -> Option<GameCategory> {
        match (game_id / 10_000) % 100 {
            1 => Some(GameCategory::PreSeason),
            2 => Some(GameCategory::RegularSeason),
            3 => Some(GameCategory::Playoffs),
            4 => Some(GameCategory::AllStar),
            5 => None,
            6 => Some(GameCategory::Exhibition),
            7 => Some(GameCategory::Olympics),
            8 => Some(GameCategory::WorldCupGroup),
            9 => Some(GameCategory::WorldCupKnockout),
            _ => Some(GameCategory::Other),
        }
    }

    /// Stable lowercase name used in API payloads and filter tokens.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameCategory::PreSeason => "preseason",
            GameCategory::RegularSeason => "regular",
            GameCategory::Playoffs => "playoffs",
            GameCategory::AllStar => "allstar",
            GameCategory::Exhibition => "exhibition",
            GameCategory::Olympics => "olympics",
            GameCategory::WorldCupGroup => "worldcup_group",
            GameCategory::WorldCupKnockout => "worldcup_knockout",
            GameCategory::Other => "other",
        }
    }

    /// Parse a filter token. Matching is case-insensitive and accepts a few
    /// common spellings for each category.
    pub fn parse_token(token: &str) -> LinemateResult<GameCategory> {
        match token.to_ascii_lowercase().as_str() {
            "preseason" | "pre_season" => Ok(GameCategory::PreSeason),
            "regular" | "regular_season" => Ok(GameCategory::RegularSeason),
            "playoffs" | "playoff" | "postseason" => Ok(GameCategory::Playoffs),
            "allstar" | "all_star" => Ok(GameCategory::AllStar),
            "exhibition" => Ok(GameCategory::Exhibition),
            "olympics" | "olympic" => Ok(GameCategory::Olympics),
            "worldcup_group" => Ok(GameCategory::WorldCupGroup),
            "worldcup_knockout" => Ok(GameCategory::WorldCupKnockout),
            "other" => Ok(GameCategory::Other),
            other => Err(LinemateError::InvalidFilter(format!(
                "unknown game category '{other}'"
            ))),
        }
    }
}

// ─── Teams ─────────────────────────────────────────────────────────────────

/// A team identity scoped to one season, e.g. `EDM20232024`.
///
/// Franchises keep their tricode across seasons, so the season suffix is what
/// distinguishes the 2023-24 Oilers from the 2024-25 Oilers. Session usage
/// counters and common-team listings key on this token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamToken(CompactString);

impl TeamToken {
    /// Canonical token from a franchise tricode and a season code. The
    /// tricode is uppercased.
    pub fn new(tricode: &str, season: SeasonCode) -> Self {
        TeamToken(format_compact!(
            "{}{}",
            tricode.trim().to_ascii_uppercase(),
            season
        ))
    }

    /// Wrap an already-combined token, e.g. one received in a filter.
    pub fn from_raw(raw: impl Into<CompactString>) -> Self {
        TeamToken(raw.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The franchise tricode portion.
    pub fn tricode(&self) -> &str {
        let s = self.0.as_str();
        if s.len() > 8 {
            &s[..s.len() - 8]
        } else {
            s
        }
    }

    /// The season portion, if the token carries one.
    pub fn season(&self) -> Option<SeasonCode> {
        let s = self.0.as_str();
        if s.len() > 8 {
            s[s.len() - 8..].parse().ok()
        } else {
            None
        }
    }
}

impl std::fmt::Display for TeamToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

// ─── Players ───────────────────────────────────────────────────────────────

/// A player's resolved display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerName {
    pub first: CompactString,
    pub last: CompactString,
}

impl PlayerName {
    pub fn new(first: impl Into<CompactString>, last: impl Into<CompactString>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// Full display name, `"Connor McDavid"` style.
    pub fn full(&self) -> String {
        format!("{} {}", self.first, self.last)
    }
}

// ─── Game Facts ────────────────────────────────────────────────────────────

/// One team's dressed players for a single game, goalies included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub team: TeamToken,
    pub players: Vec<PlayerId>,
}

/// The complete set of facts extracted from one game: both rosters plus the
/// identifiers needed to categorize the edges it produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub season: SeasonCode,
    pub category: GameCategory,
    pub home: Roster,
    pub away: Roster,
}

impl GameRecord {
    /// The roster dressed for the given team in this game, if either side
    /// matches.
    pub fn roster_of(&self, team: &TeamToken) -> Option<&Roster> {
        if &self.home.team == team {
            Some(&self.home)
        } else if &self.away.team == team {
            Some(&self.away)
        } else {
            None
        }
    }

    /// All distinct player ids across both rosters, ascending. Writers
    /// acquire per-player locks in exactly this order.
    pub fn player_ids_sorted(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self
            .home
            .players
            .iter()
            .chain(self.away.players.iter())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
