//! Filter criteria shared by every read query.

use std::collections::HashSet;

use linemate_core::types::{GameCategory, GameRecord, SeasonCode, TeamToken};

/// Filter criteria applied to teammate edges during a query.
///
/// Each field is independently optional; an unset field passes everything.
/// Season bounds are inclusive and expressed as season codes, so callers
/// working in calendar years convert with
/// [`season_for_start_year`](linemate_core::types::season_for_start_year)
/// first.
pub struct EdgeFilter {
    pub season_start: Option<SeasonCode>,
    pub season_end: Option<SeasonCode>,
    pub categories: Option<HashSet<GameCategory>>,
    pub teams: Option<HashSet<TeamToken>>,
}

impl EdgeFilter {
    pub fn none() -> Self {
        Self {
            season_start: None,
            season_end: None,
            categories: None,
            teams: None,
        }
    }

    /// True when no criterion is set and the shared unfiltered index can
    /// serve the query directly.
    pub fn is_unfiltered(&self) -> bool {
        self.season_start.is_none()
            && self.season_end.is_none()
            && self.categories.is_none()
            && self.teams.is_none()
    }

    /// Whether an edge produced by this game and team passes the filter.
    pub fn matches(&self, game: &GameRecord, team: &TeamToken) -> bool {
        if let Some(start) = self.season_start {
            if game.season < start {
                return false;
            }
        }

        if let Some(end) = self.season_end {
            if game.season > end {
                return false;
            }
        }

        if let Some(ref categories) = self.categories {
            if !categories.contains(&game.category) {
                return false;
            }
        }

        if let Some(ref teams) = self.teams {
            if !teams.contains(team) {
                return false;
            }
        }

        true
    }
}

impl Default for EdgeFilter {
    fn default() -> Self {
        Self::none()
    }
}
