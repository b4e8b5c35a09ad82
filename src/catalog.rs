//! Content catalog types
//!
//! Static definitions for the 24-day calendar: missions, story arcs and
//! badge specifications. The catalog is read-only at runtime; see
//! `catalog_loader` for how it is constructed and exposed process-wide.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{KalenderError, KalenderResult};

/// Content revealed by completing a mission's day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevealSet {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default, rename = "symbols")]
    pub decryption_symbols: Vec<String>,
}

/// Prerequisites a session must already hold before the mission may be
/// attempted, independent of date gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementSet {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, rename = "days")]
    pub completed_days: Vec<u32>,
}

/// Optional side-quest attached to a mission. Validated either by a
/// secondary code or by guardian confirmation; both paths resolve the
/// named crisis flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusQuest {
    pub crisis_key: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub guardian_confirm: bool,
}

/// A puzzle requiring a correct ordering of previously collected symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptionChallenge {
    pub id: String,
    #[serde(rename = "sequence")]
    pub correct_sequence: Vec<String>,
}

/// Membership of a mission in a multi-phase story arc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcMembership {
    #[serde(rename = "id")]
    pub arc_id: String,
    pub phase: u32,
}

/// One calendar day's puzzle unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub day: u32,
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub reveals: RevealSet,
    #[serde(default)]
    pub requires: RequirementSet,
    #[serde(default)]
    pub bonus: Option<BonusQuest>,
    #[serde(default)]
    pub decryption: Option<DecryptionChallenge>,
    #[serde(default)]
    pub arc: Option<ArcMembership>,
}

impl Mission {
    pub fn is_valid(&self) -> bool {
        (1..=24).contains(&self.day) && !self.code.trim().is_empty() && !self.title.is_empty()
    }
}

/// A multi-phase narrative spanning several missions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryArc {
    pub id: String,
    pub title: String,
}

/// Unlock condition for a badge, evaluated by the unlock resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeCondition {
    /// The named day's bonus/crisis flag is resolved.
    Bonusoppdrag { day: u32 },
    /// Every phase of the story arc's member missions is completed.
    Eventyr { arc_id: String },
    /// All listed decryption challenges are solved.
    AllDecryptionsSolved { ids: Vec<String> },
    /// At least `count` symbols collected.
    AllSymbolsCollected { count: u32 },
    /// At least `count` daily missions completed.
    AllQuestsCompleted { count: u32 },
}

/// An achievement definition, granted once its condition becomes true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub condition: BadgeCondition,
}

/// Lowercased, trimmed form used for all code matching.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Immutable registry of missions, story arcs and badges.
///
/// Built once (see `catalog_loader`), then only queried. The indexes are
/// keyed by day, normalized code and id respectively.
pub struct ContentCatalog {
    missions: Vec<Mission>,
    by_day: HashMap<u32, usize>,
    by_code: HashMap<String, usize>,
    arcs: HashMap<String, StoryArc>,
    badges: Vec<BadgeSpec>,
    badge_ids: HashMap<String, usize>,
}

impl ContentCatalog {
    pub fn new(
        mut missions: Vec<Mission>,
        arcs: Vec<StoryArc>,
        badges: Vec<BadgeSpec>,
    ) -> KalenderResult<Self> {
        missions.sort_by_key(|m| m.day);

        let mut by_day = HashMap::new();
        let mut by_code = HashMap::new();
        for (idx, mission) in missions.iter().enumerate() {
            if !mission.is_valid() {
                return Err(KalenderError::catalog(format!(
                    "invalid mission definition for day {}",
                    mission.day
                )));
            }
            if by_day.insert(mission.day, idx).is_some() {
                return Err(KalenderError::catalog(format!(
                    "duplicate mission for day {}",
                    mission.day
                )));
            }
            if by_code.insert(normalize_code(&mission.code), idx).is_some() {
                return Err(KalenderError::catalog(format!(
                    "duplicate mission code '{}'",
                    mission.code
                )));
            }
        }

        let arcs = arcs.into_iter().map(|a| (a.id.clone(), a)).collect();

        let mut badge_ids = HashMap::new();
        for (idx, badge) in badges.iter().enumerate() {
            if badge_ids.insert(badge.id.clone(), idx).is_some() {
                return Err(KalenderError::catalog(format!(
                    "duplicate badge id '{}'",
                    badge.id
                )));
            }
        }

        Ok(ContentCatalog {
            missions,
            by_day,
            by_code,
            arcs,
            badges,
            badge_ids,
        })
    }

    pub fn mission_for_day(&self, day: u32) -> Option<&Mission> {
        self.by_day.get(&day).map(|idx| &self.missions[*idx])
    }

    /// Case-normalized code lookup. Unknown codes simply return None.
    pub fn mission_for_code(&self, code: &str) -> Option<&Mission> {
        self.by_code
            .get(&normalize_code(code))
            .map(|idx| &self.missions[*idx])
    }

    /// All missions in day order.
    pub fn all_missions(&self) -> &[Mission] {
        &self.missions
    }

    pub fn badge_by_id(&self, id: &str) -> Option<&BadgeSpec> {
        self.badge_ids.get(id).map(|idx| &self.badges[*idx])
    }

    pub fn all_badges(&self) -> &[BadgeSpec] {
        &self.badges
    }

    pub fn story_arc_by_id(&self, id: &str) -> Option<&StoryArc> {
        self.arcs.get(id)
    }

    /// Days of the missions belonging to a story arc, phase order.
    pub fn arc_member_days(&self, arc_id: &str) -> Vec<u32> {
        let mut members: Vec<(u32, u32)> = self
            .missions
            .iter()
            .filter_map(|m| {
                m.arc
                    .as_ref()
                    .filter(|a| a.arc_id == arc_id)
                    .map(|a| (a.phase, m.day))
            })
            .collect();
        members.sort();
        members.into_iter().map(|(_, day)| day).collect()
    }

    /// Locate a decryption challenge across all missions.
    pub fn decryption_by_id(&self, challenge_id: &str) -> Option<&DecryptionChallenge> {
        self.missions
            .iter()
            .filter_map(|m| m.decryption.as_ref())
            .find(|d| d.id == challenge_id)
    }
}
