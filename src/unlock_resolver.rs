//! Unlock resolver
//!
//! Pure derivation of a session's unlocked content and newly earned
//! badges. The resolver only classifies state; it never authorizes
//! actions (the progression engine rejects submissions) and never reads
//! the wall clock - the calendar day gates which missions are reachable,
//! not what a completed day unlocks.

use chrono::{DateTime, Utc};

use crate::catalog::{BadgeCondition, ContentCatalog, Mission};
use crate::session_record::{EarnedBadge, SessionRecord};

/// Re-derive everything that follows from the append-only inputs and
/// award any badge whose condition has become true. Total over any
/// well-formed session, including an empty one. Running it twice with no
/// new input yields zero newly earned badges.
pub fn resolve_session(
    session: &mut SessionRecord,
    catalog: &ContentCatalog,
    now: DateTime<Utc>,
) -> Vec<EarnedBadge> {
    recompute_completed_days(session, catalog);
    apply_reveals(session, catalog);
    award_new_badges(session, catalog, now)
}

/// A mission may be attempted only when the calendar has reached its day
/// AND every prerequisite is already satisfied.
pub fn mission_accessible(mission: &Mission, session: &SessionRecord, today: u32) -> bool {
    if today < mission.day {
        return false;
    }
    let topics_ok = mission
        .requires
        .topics
        .iter()
        .all(|t| session.topic_unlocks.contains_key(t));
    let days_ok = mission
        .requires
        .completed_days
        .iter()
        .all(|d| session.completed_days.contains(d));
    topics_ok && days_ok
}

/// Map each accepted code to its owning mission. Unmatched codes are
/// inert, not errors.
fn recompute_completed_days(session: &mut SessionRecord, catalog: &ContentCatalog) {
    session.completed_days = session
        .submitted_codes
        .iter()
        .filter_map(|s| catalog.mission_for_code(&s.code))
        .map(|m| m.day)
        .collect();
}

/// Union every completed day's reveals into the unlocked sets. Idempotent;
/// `topic_unlocks` records the unlocking day only on first insertion.
fn apply_reveals(session: &mut SessionRecord, catalog: &ContentCatalog) {
    let days: Vec<u32> = session.completed_days.iter().copied().collect();
    for day in days {
        let Some(mission) = catalog.mission_for_day(day) else {
            continue;
        };
        for topic in &mission.reveals.topics {
            session
                .topic_unlocks
                .entry(topic.clone())
                .or_insert(mission.day);
        }
        session
            .unlocked_files
            .extend(mission.reveals.files.iter().cloned());
        session
            .unlocked_modules
            .extend(mission.reveals.modules.iter().cloned());
        // Revealed symbols are granted alongside the out-of-band scan path.
        session
            .collected_symbols
            .extend(mission.reveals.decryption_symbols.iter().cloned());
    }
}

fn award_new_badges(
    session: &mut SessionRecord,
    catalog: &ContentCatalog,
    now: DateTime<Utc>,
) -> Vec<EarnedBadge> {
    let mut newly_earned = Vec::new();
    for spec in catalog.all_badges() {
        if session.has_badge(&spec.id) {
            continue;
        }
        if badge_condition_met(&spec.condition, session, catalog) && session.award_badge(spec, now)
        {
            newly_earned.push(EarnedBadge {
                badge_id: spec.id.clone(),
                earned_at: now,
            });
        }
    }
    newly_earned
}

/// Evaluate one badge condition. A condition referencing an unknown or
/// removed catalog id is permanently unsatisfiable - it never errors and
/// never awards.
fn badge_condition_met(
    condition: &BadgeCondition,
    session: &SessionRecord,
    catalog: &ContentCatalog,
) -> bool {
    match condition {
        BadgeCondition::Bonusoppdrag { day } => catalog
            .mission_for_day(*day)
            .and_then(|m| m.bonus.as_ref())
            .map(|b| {
                session
                    .crisis_status
                    .get(&b.crisis_key)
                    .copied()
                    .unwrap_or(false)
            })
            .unwrap_or(false),
        BadgeCondition::Eventyr { arc_id } => {
            let member_days = catalog.arc_member_days(arc_id);
            !member_days.is_empty()
                && member_days
                    .iter()
                    .all(|d| session.completed_days.contains(d))
        }
        BadgeCondition::AllDecryptionsSolved { ids } => {
            !ids.is_empty() && ids.iter().all(|id| session.solved_decryptions.contains(id))
        }
        BadgeCondition::AllSymbolsCollected { count } => {
            session.collected_symbols.len() as u32 >= *count
        }
        BadgeCondition::AllQuestsCompleted { count } => {
            session.completed_days.len() as u32 >= *count
        }
    }
}
