//! progression_engine.rs
//! Single entry point for all reads and writes of a session's progression
//! state. Wraps the persistence port, applies the unlock resolver after
//! every mutation and announces newly earned badges. Credential and UI
//! code never touch the session store directly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::badge_notifier::BadgeNotifier;
use crate::catalog::{normalize_code, ContentCatalog, Mission};
use crate::catalog_loader::builtin_catalog_shared;
use crate::errors::{KalenderError, KalenderResult, SafeLock};
use crate::game_clock::GameClock;
use crate::input_validator::InputValidator;
use crate::runtime_config::KalenderConfig;
use crate::session_record::{EarnedBadge, SessionRecord};
use crate::session_store::{SessionPatch, SessionStore, StoreError};
use crate::session_store_remote::RemoteSessionStore;
use crate::session_store_sled::SledSessionStore;
use crate::unlock_resolver::{mission_accessible, resolve_session};

/// Outcome of a mission-code submission. Rejections are results, not
/// errors; duplicates of an already-accepted code succeed as a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSubmission {
    pub accepted: bool,
    pub day: Option<u32>,
    pub already_submitted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecryptionOutcome {
    Solved { newly_earned: Vec<EarnedBadge> },
    Incorrect { attempts: u32 },
}

/// Read-only projection of what a session can currently see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleContent {
    pub topics: BTreeMap<String, u32>,
    pub files: BTreeSet<String>,
    pub modules: BTreeSet<String>,
}

/// Compact projection for guardian dashboards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverview {
    pub completed_days: u32,
    pub earned_badges: u32,
    pub collected_symbols: u32,
    pub solved_decryptions: u32,
}

pub struct ProgressionEngine {
    store: Arc<Mutex<dyn SessionStore>>,
    catalog: Arc<ContentCatalog>,
    clock: GameClock,
    notifier: BadgeNotifier,
}

impl ProgressionEngine {
    pub fn new(
        store: Arc<Mutex<dyn SessionStore>>,
        catalog: Arc<ContentCatalog>,
        clock: GameClock,
    ) -> Self {
        ProgressionEngine {
            store,
            catalog,
            clock,
            notifier: BadgeNotifier::new(),
        }
    }

    /// Build an engine from resolved configuration: backend selector,
    /// built-in calendar, configured clock. The backend choice happens
    /// here and nowhere else.
    pub fn from_config(config: &KalenderConfig) -> KalenderResult<Self> {
        let store: Arc<Mutex<dyn SessionStore>> = match config.storage.backend.as_str() {
            "sled" => {
                let path = config.storage.sled_path_or_default();
                Arc::new(Mutex::new(SledSessionStore::open(&path)?))
            }
            "remote" => {
                let remote = config.storage.remote.as_ref().ok_or_else(|| {
                    KalenderError::config("storage.remote must be set for the remote backend")
                })?;
                Arc::new(Mutex::new(RemoteSessionStore::new(remote)?))
            }
            other => {
                return Err(KalenderError::config(format!(
                    "unknown storage backend '{other}'"
                )))
            }
        };

        info!(
            "progression engine initialized with backend '{}'",
            config.storage.backend
        );
        Ok(ProgressionEngine::new(
            store,
            builtin_catalog_shared(),
            config.clock.to_clock(),
        ))
    }

    /// Observer channel for newly earned badges.
    pub fn notifier(&self) -> &BadgeNotifier {
        &self.notifier
    }

    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    // ---- session lifecycle -------------------------------------------------

    /// Create a fresh session record. Fails with a conflict if the id is
    /// already taken; pass None to mint a new id.
    pub fn create_session(&self, session_id: Option<String>) -> KalenderResult<SessionRecord> {
        let session_id = match session_id {
            Some(id) => {
                InputValidator::validate_session_id(&id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let store = self.store.safe_lock()?;
        if store.read_session(&session_id)?.is_some() {
            return Err(KalenderError::store(
                "create_session",
                StoreError::conflict(&session_id, "session already exists"),
            ));
        }
        let record = SessionRecord::new(&session_id);
        store.write_session(&session_id, &record)?;
        info!("created session {session_id}");
        Ok(record)
    }

    // ---- mutations ---------------------------------------------------------

    /// Append a mission code if it maps to an accessible mission.
    ///
    /// An unknown code or an inaccessible mission is a rejection, not an
    /// error. Re-submitting an already-accepted code is an idempotent
    /// no-op success so double-clicks and retries stay harmless.
    pub fn submit_code(&self, session_id: &str, code: &str) -> KalenderResult<CodeSubmission> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_code(code)?;

        let store = self.store.safe_lock()?;
        let mut session = Self::required(store.read_session(session_id)?, session_id)?;

        let Some(mission_day) = self.catalog.mission_for_code(code).map(|m| m.day) else {
            debug!("session {session_id} submitted unknown code");
            return Ok(CodeSubmission {
                accepted: false,
                day: None,
                already_submitted: false,
            });
        };

        if session.has_submitted_code(code) {
            return Ok(CodeSubmission {
                accepted: true,
                day: Some(mission_day),
                already_submitted: true,
            });
        }

        // Bring derived state current before the accessibility check.
        let now = Utc::now();
        let mut newly_earned = resolve_session(&mut session, &self.catalog, now);
        let mission = self
            .catalog
            .mission_for_day(mission_day)
            .ok_or_else(|| KalenderError::catalog("mission index out of sync"))?;
        if !mission_accessible(mission, &session, self.clock.current_day()) {
            debug!(
                "session {session_id} submitted code for inaccessible day {}",
                mission.day
            );
            return Ok(CodeSubmission {
                accepted: false,
                day: Some(mission.day),
                already_submitted: false,
            });
        }

        session.append_code(code, now);
        newly_earned.extend(resolve_session(&mut session, &self.catalog, now));
        session.touch(now);
        store.write_session(session_id, &session)?;
        drop(store);

        info!(
            "session {session_id} completed day {} ({} new badges)",
            mission_day,
            newly_earned.len()
        );
        self.announce(&newly_earned);
        Ok(CodeSubmission {
            accepted: true,
            day: Some(mission_day),
            already_submitted: false,
        })
    }

    /// Count a failed submission against a day, for progressive hinting.
    pub fn record_failed_attempt(&self, session_id: &str, day: u32) -> KalenderResult<u32> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_day(day)?;

        let store = self.store.safe_lock()?;
        let mut session = Self::required(store.read_session(session_id)?, session_id)?;
        let count = session.record_failed_attempt(day);
        session.touch(Utc::now());
        store.write_session(session_id, &session)?;
        Ok(count)
    }

    /// Idempotent union of an out-of-band scanned symbol. Icon and
    /// description are scanner payload for display layers; only the id
    /// participates in gating.
    pub fn record_symbol_collected(
        &self,
        session_id: &str,
        symbol_id: &str,
        icon: Option<&str>,
        description: Option<&str>,
    ) -> KalenderResult<Vec<EarnedBadge>> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_content_id("symbol_id", symbol_id)?;
        debug!(
            "symbol {symbol_id} scanned (icon: {:?}, description: {:?})",
            icon, description
        );

        let store = self.store.safe_lock()?;
        let mut session = Self::required(store.read_session(session_id)?, session_id)?;
        if !session.collected_symbols.insert(symbol_id.to_string()) {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let newly_earned = resolve_session(&mut session, &self.catalog, now);
        session.touch(now);
        store.write_session(session_id, &session)?;
        drop(store);

        self.announce(&newly_earned);
        Ok(newly_earned)
    }

    /// Compare a proposed symbol ordering against the catalog's correct
    /// sequence. Unlimited retries; the counter freezes once solved.
    pub fn attempt_decryption(
        &self,
        session_id: &str,
        challenge_id: &str,
        proposed_sequence: &[String],
    ) -> KalenderResult<DecryptionOutcome> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_content_id("challenge_id", challenge_id)?;
        InputValidator::validate_sequence(proposed_sequence)?;

        let challenge = self
            .catalog
            .decryption_by_id(challenge_id)
            .ok_or_else(|| KalenderError::not_found("decryption_challenge", challenge_id))?;

        let store = self.store.safe_lock()?;
        let mut session = Self::required(store.read_session(session_id)?, session_id)?;

        // Re-solving an already-solved challenge succeeds silently.
        if session.solved_decryptions.contains(challenge_id) {
            return Ok(DecryptionOutcome::Solved {
                newly_earned: Vec::new(),
            });
        }

        let now = Utc::now();
        if proposed_sequence != challenge.correct_sequence.as_slice() {
            let attempts = session.record_decryption_attempt(challenge_id);
            session.touch(now);
            store.write_session(session_id, &session)?;
            debug!("session {session_id} failed {challenge_id} (attempt {attempts})");
            return Ok(DecryptionOutcome::Incorrect { attempts });
        }

        session.solved_decryptions.insert(challenge_id.to_string());
        let newly_earned = resolve_session(&mut session, &self.catalog, now);
        session.touch(now);
        store.write_session(session_id, &session)?;
        drop(store);

        info!("session {session_id} solved {challenge_id}");
        self.announce(&newly_earned);
        Ok(DecryptionOutcome::Solved { newly_earned })
    }

    /// Set a named crisis flag to resolved. Idempotent; may cascade into
    /// a bonus badge.
    pub fn resolve_crisis(
        &self,
        session_id: &str,
        crisis_key: &str,
    ) -> KalenderResult<Vec<EarnedBadge>> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_content_id("crisis_key", crisis_key)?;

        let store = self.store.safe_lock()?;
        let mut session = Self::required(store.read_session(session_id)?, session_id)?;
        if session.crisis_status.get(crisis_key) == Some(&true) {
            return Ok(Vec::new());
        }
        session.crisis_status.insert(crisis_key.to_string(), true);
        let now = Utc::now();
        let newly_earned = resolve_session(&mut session, &self.catalog, now);
        session.touch(now);
        store.write_session(session_id, &session)?;
        drop(store);

        info!("session {session_id} resolved crisis '{crisis_key}'");
        self.announce(&newly_earned);
        Ok(newly_earned)
    }

    /// Validate a bonus quest by its secondary code. Returns whether the
    /// code matched; a match resolves the day's crisis flag.
    pub fn submit_bonus_code(
        &self,
        session_id: &str,
        day: u32,
        code: &str,
    ) -> KalenderResult<bool> {
        InputValidator::validate_day(day)?;
        InputValidator::validate_code(code)?;

        let bonus = self
            .catalog
            .mission_for_day(day)
            .and_then(|m| m.bonus.clone())
            .ok_or_else(|| KalenderError::not_found("bonus_quest", day.to_string()))?;
        let Some(expected) = bonus.code else {
            return Err(KalenderError::validation(
                "day",
                format!("bonus quest for day {day} is confirmed by a guardian, not a code"),
            ));
        };

        if normalize_code(code) != normalize_code(&expected) {
            debug!("session {session_id} failed bonus code for day {day}");
            return Ok(false);
        }
        self.resolve_crisis(session_id, &bonus.crisis_key)?;
        Ok(true)
    }

    /// Guardian confirmation path for bonus quests that carry no code.
    pub fn confirm_bonus(&self, session_id: &str, day: u32) -> KalenderResult<Vec<EarnedBadge>> {
        InputValidator::validate_day(day)?;

        let bonus = self
            .catalog
            .mission_for_day(day)
            .and_then(|m| m.bonus.clone())
            .ok_or_else(|| KalenderError::not_found("bonus_quest", day.to_string()))?;
        if !bonus.guardian_confirm {
            return Err(KalenderError::validation(
                "day",
                format!("bonus quest for day {day} is not guardian-confirmed"),
            ));
        }
        self.resolve_crisis(session_id, &bonus.crisis_key)
    }

    /// Mark narrative content opened. UI tracking only, never gating, so
    /// it goes through the narrow patch path.
    pub fn mark_email_viewed(
        &self,
        session_id: &str,
        day: u32,
        bonus: bool,
    ) -> KalenderResult<()> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_day(day)?;

        let mut days = BTreeSet::new();
        days.insert(day);
        let patch = if bonus {
            SessionPatch {
                viewed_bonus_emails: Some(days),
                last_updated: Some(Utc::now()),
                ..SessionPatch::default()
            }
        } else {
            SessionPatch {
                viewed_emails: Some(days),
                last_updated: Some(Utc::now()),
                ..SessionPatch::default()
            }
        };
        let store = self.store.safe_lock()?;
        store.patch_session_fields(session_id, &patch)?;
        Ok(())
    }

    /// Personalization set at registration; full read-modify-write so the
    /// resolver keeps running after every full mutation.
    pub fn set_player_names(&self, session_id: &str, names: Vec<String>) -> KalenderResult<()> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_name_list("playerNames", &names)?;

        let store = self.store.safe_lock()?;
        let mut session = Self::required(store.read_session(session_id)?, session_id)?;
        session.player_names = names;
        let now = Utc::now();
        let newly_earned = resolve_session(&mut session, &self.catalog, now);
        session.touch(now);
        store.write_session(session_id, &session)?;
        drop(store);
        self.announce(&newly_earned);
        Ok(())
    }

    /// High-frequency guardian-owned field: only ever a narrow patch, so
    /// concurrent child-device mutations are never clobbered.
    pub fn set_friend_names(&self, session_id: &str, names: Vec<String>) -> KalenderResult<()> {
        InputValidator::validate_session_id(session_id)?;
        InputValidator::validate_name_list("friendNames", &names)?;

        let store = self.store.safe_lock()?;
        store.patch_session_fields(session_id, &SessionPatch::with_friend_names(names))?;
        Ok(())
    }

    // ---- read-only projections --------------------------------------------

    /// Unknown sessions project as empty rather than failing; rendering
    /// layers treat that as "nothing unlocked yet".
    pub fn get_visible_content(&self, session_id: &str) -> KalenderResult<VisibleContent> {
        let store = self.store.safe_lock()?;
        let Some(session) = store.read_session(session_id)? else {
            return Ok(VisibleContent::default());
        };
        Ok(VisibleContent {
            topics: session.topic_unlocks.clone(),
            files: session.unlocked_files.clone(),
            modules: session.unlocked_modules.clone(),
        })
    }

    pub fn get_completed_days(&self, session_id: &str) -> KalenderResult<BTreeSet<u32>> {
        let store = self.store.safe_lock()?;
        Ok(store
            .read_session(session_id)?
            .map(|s| s.completed_days)
            .unwrap_or_default())
    }

    pub fn get_failed_attempts(&self, session_id: &str, day: u32) -> KalenderResult<u32> {
        let store = self.store.safe_lock()?;
        Ok(store
            .read_session(session_id)?
            .and_then(|s| s.failed_attempts.get(&day).copied())
            .unwrap_or(0))
    }

    pub fn get_session(&self, session_id: &str) -> KalenderResult<Option<SessionRecord>> {
        let store = self.store.safe_lock()?;
        Ok(store.read_session(session_id)?)
    }

    pub fn session_overview(&self, session_id: &str) -> KalenderResult<SessionOverview> {
        let store = self.store.safe_lock()?;
        let Some(session) = store.read_session(session_id)? else {
            return Ok(SessionOverview::default());
        };
        Ok(SessionOverview {
            completed_days: session.completed_days.len() as u32,
            earned_badges: session.earned_badges.len() as u32,
            collected_symbols: session.collected_symbols.len() as u32,
            solved_decryptions: session.solved_decryptions.len() as u32,
        })
    }

    /// Mission whose day is tomorrow, for the external delivery
    /// component. Only meaningful inside the December calendar window.
    pub fn mission_for_tomorrow(&self) -> Option<&Mission> {
        if self.clock.current_month() != 12 {
            return None;
        }
        let tomorrow = self.clock.current_day() + 1;
        if tomorrow > 24 {
            return None;
        }
        self.catalog.mission_for_day(tomorrow)
    }

    // ---- helpers -----------------------------------------------------------

    fn required(
        session: Option<SessionRecord>,
        session_id: &str,
    ) -> KalenderResult<SessionRecord> {
        session.ok_or_else(|| KalenderError::not_found("session", session_id))
    }

    fn announce(&self, newly_earned: &[EarnedBadge]) {
        for badge in newly_earned {
            if self.catalog.badge_by_id(&badge.badge_id).is_none() {
                warn!("earned badge '{}' missing from catalog", badge.badge_id);
            }
            self.notifier.publish(badge);
        }
    }
}
