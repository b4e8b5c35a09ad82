//! Session record
//!
//! The full progression record for one player/family, keyed by a stable
//! session id. Serialized camelCase to match the document shape shared
//! with the remote store. All unlock collections are monotonic; nothing
//! here ever removes an entry.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{normalize_code, BadgeCondition, BadgeSpec};

/// One accepted mission code, append-only. Duplicates are tolerated here
/// and ignored downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedCode {
    pub code: String,
    pub submitted_at: DateTime<Utc>,
}

/// A badge award. Permanent; never revoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadge {
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}

/// Deserialize a map field that historical records sometimes stored as a
/// stringified JSON blob. Both shapes normalize to the structured map;
/// the write path always emits the structured shape.
fn map_or_legacy_string<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Ord + DeserializeOwned,
    V: DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let object = match raw {
        serde_json::Value::Null => return Ok(BTreeMap::new()),
        serde_json::Value::String(text) => {
            if text.trim().is_empty() {
                return Ok(BTreeMap::new());
            }
            serde_json::from_str(&text).map_err(serde::de::Error::custom)?
        }
        other => other,
    };
    serde_json::from_value(object).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRecord {
    pub session_id: String,
    /// Append-only log of accepted mission codes.
    pub submitted_codes: Vec<SubmittedCode>,
    /// Derived from `submitted_codes` by the unlock resolver.
    pub completed_days: BTreeSet<u32>,
    pub viewed_emails: BTreeSet<u32>,
    pub viewed_bonus_emails: BTreeSet<u32>,
    /// Topic keyword -> day it was first unlocked.
    #[serde(deserialize_with = "map_or_legacy_string")]
    pub topic_unlocks: BTreeMap<String, u32>,
    pub unlocked_files: BTreeSet<String>,
    pub unlocked_modules: BTreeSet<String>,
    pub collected_symbols: BTreeSet<String>,
    pub solved_decryptions: BTreeSet<String>,
    /// Attempt counts are frozen once the challenge is solved.
    #[serde(deserialize_with = "map_or_legacy_string")]
    pub decryption_attempts: BTreeMap<String, u32>,
    /// Day -> failed-submission count, for progressive hinting.
    #[serde(deserialize_with = "map_or_legacy_string")]
    pub failed_attempts: BTreeMap<u32, u32>,
    #[serde(deserialize_with = "map_or_legacy_string")]
    pub crisis_status: BTreeMap<String, bool>,
    pub earned_badges: Vec<EarnedBadge>,
    /// Display grouping, kept in sync with `earned_badges`.
    pub bonus_oppdrag_badges: Vec<String>,
    pub eventyr_badges: Vec<String>,
    pub player_names: Vec<String>,
    pub friend_names: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        SessionRecord {
            session_id: String::new(),
            submitted_codes: Vec::new(),
            completed_days: BTreeSet::new(),
            viewed_emails: BTreeSet::new(),
            viewed_bonus_emails: BTreeSet::new(),
            topic_unlocks: BTreeMap::new(),
            unlocked_files: BTreeSet::new(),
            unlocked_modules: BTreeSet::new(),
            collected_symbols: BTreeSet::new(),
            solved_decryptions: BTreeSet::new(),
            decryption_attempts: BTreeMap::new(),
            failed_attempts: BTreeMap::new(),
            crisis_status: BTreeMap::new(),
            earned_badges: Vec::new(),
            bonus_oppdrag_badges: Vec::new(),
            eventyr_badges: Vec::new(),
            player_names: Vec::new(),
            friend_names: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

impl SessionRecord {
    /// A fresh record with all collections empty, as created at
    /// registration.
    pub fn new(session_id: impl Into<String>) -> Self {
        SessionRecord {
            session_id: session_id.into(),
            ..SessionRecord::default()
        }
    }

    /// Whether an accepted submission for this code already exists,
    /// case-normalized.
    pub fn has_submitted_code(&self, code: &str) -> bool {
        let wanted = normalize_code(code);
        self.submitted_codes
            .iter()
            .any(|s| normalize_code(&s.code) == wanted)
    }

    pub fn append_code(&mut self, code: &str, at: DateTime<Utc>) {
        self.submitted_codes.push(SubmittedCode {
            code: code.to_string(),
            submitted_at: at,
        });
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.earned_badges.iter().any(|b| b.badge_id == badge_id)
    }

    /// Award a badge. A duplicate award is a no-op, not an error; returns
    /// whether the badge was newly added. Display sub-lists are kept in
    /// sync by condition kind.
    pub fn award_badge(&mut self, spec: &BadgeSpec, at: DateTime<Utc>) -> bool {
        if self.has_badge(&spec.id) {
            return false;
        }
        self.earned_badges.push(EarnedBadge {
            badge_id: spec.id.clone(),
            earned_at: at,
        });
        match spec.condition {
            BadgeCondition::Bonusoppdrag { .. } => {
                self.bonus_oppdrag_badges.push(spec.id.clone());
            }
            BadgeCondition::Eventyr { .. } => {
                self.eventyr_badges.push(spec.id.clone());
            }
            _ => {}
        }
        true
    }

    /// Increment the attempt counter for an unsolved challenge and return
    /// the new count. Callers must not invoke this once the challenge is
    /// solved; the counter is frozen from that point.
    pub fn record_decryption_attempt(&mut self, challenge_id: &str) -> u32 {
        let count = self
            .decryption_attempts
            .entry(challenge_id.to_string())
            .or_insert(0);
        *count += 1;
        *count
    }

    pub fn record_failed_attempt(&mut self, day: u32) -> u32 {
        let count = self.failed_attempts.entry(day).or_insert(0);
        *count += 1;
        *count
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}
