use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::catalog_loader::builtin_catalog_shared;
use crate::errors::KalenderError;
use crate::game_clock::GameClock;
use crate::progression_engine::{CodeSubmission, DecryptionOutcome, ProgressionEngine};
use crate::session_record::EarnedBadge;
use crate::session_store::{SessionStore, StoreError};
use crate::tests::memory_store::MemorySessionStore;

// Delegate so the test keeps a handle to the same store the engine sees.
struct Shared(Arc<MemorySessionStore>);

impl SessionStore for Shared {
    fn read_session(
        &self,
        session_id: &str,
    ) -> Result<Option<crate::session_record::SessionRecord>, StoreError> {
        self.0.read_session(session_id)
    }

    fn write_session(
        &self,
        session_id: &str,
        record: &crate::session_record::SessionRecord,
    ) -> Result<(), StoreError> {
        self.0.write_session(session_id, record)
    }

    fn patch_session_fields(
        &self,
        session_id: &str,
        patch: &crate::session_store::SessionPatch,
    ) -> Result<(), StoreError> {
        self.0.patch_session_fields(session_id, patch)
    }
}

fn engine_at_day(day: u32) -> (Arc<MemorySessionStore>, ProgressionEngine) {
    let store = Arc::new(MemorySessionStore::new());
    let engine = ProgressionEngine::new(
        Arc::new(Mutex::new(Shared(Arc::clone(&store)))),
        builtin_catalog_shared(),
        GameClock::fixed(day, 12),
    );
    (store, engine)
}

#[test]
fn day_one_code_accepts_then_no_ops_on_duplicate() {
    let (_store, engine) = engine_at_day(5);
    engine.create_session(Some("fam-1".into())).expect("create");

    let first = engine.submit_code("fam-1", "NORDLYS").expect("submit");
    assert_eq!(
        first,
        CodeSubmission {
            accepted: true,
            day: Some(1),
            already_submitted: false
        }
    );
    assert_eq!(
        engine.get_completed_days("fam-1").expect("days"),
        [1].into_iter().collect()
    );

    let again = engine.submit_code("fam-1", "nordlys").expect("resubmit");
    assert_eq!(
        again,
        CodeSubmission {
            accepted: true,
            day: Some(1),
            already_submitted: true
        }
    );
    assert_eq!(
        engine.get_completed_days("fam-1").expect("days"),
        [1].into_iter().collect()
    );
    let session = engine.get_session("fam-1").expect("read").expect("present");
    assert_eq!(session.submitted_codes.len(), 1);
}

#[test]
fn unknown_code_is_rejected_not_an_error() {
    let (_store, engine) = engine_at_day(5);
    engine.create_session(Some("fam-2".into())).expect("create");

    let result = engine.submit_code("fam-2", "FEILKODE").expect("submit");
    assert!(!result.accepted);
    assert_eq!(result.day, None);
}

#[test]
fn future_day_is_rejected_by_date_gate() {
    let (_store, engine) = engine_at_day(3);
    engine.create_session(Some("fam-3".into())).expect("create");

    let result = engine.submit_code("fam-3", "SNOESTORM").expect("submit");
    assert!(!result.accepted);
    assert_eq!(result.day, Some(4));
}

#[test]
fn requirement_gate_rejects_until_prerequisite_completes() {
    let (_store, engine) = engine_at_day(24);
    engine.create_session(Some("fam-4".into())).expect("create");

    // Day 5 requires the morse topic, revealed by day 3.
    let early = engine.submit_code("fam-4", "RAKETT").expect("submit");
    assert!(!early.accepted);
    assert_eq!(early.day, Some(5));

    assert!(engine.submit_code("fam-4", "MORSE").expect("d3").accepted);
    let now = engine.submit_code("fam-4", "RAKETT").expect("retry");
    assert!(now.accepted);
}

#[test]
fn failed_attempts_accumulate_per_day() {
    let (_store, engine) = engine_at_day(5);
    engine.create_session(Some("fam-5".into())).expect("create");

    assert_eq!(engine.record_failed_attempt("fam-5", 2).expect("one"), 1);
    assert_eq!(engine.record_failed_attempt("fam-5", 2).expect("two"), 2);
    assert_eq!(engine.get_failed_attempts("fam-5", 2).expect("read"), 2);
    assert_eq!(engine.get_failed_attempts("fam-5", 3).expect("other"), 0);
}

#[test]
fn decryption_attempts_count_then_freeze_on_solve() {
    let (_store, engine) = engine_at_day(10);
    engine.create_session(Some("fam-6".into())).expect("create");

    let wrong: Vec<String> = vec!["sigma-maane".into(), "sigma-sol".into()];
    for expected in 1..=3u32 {
        let outcome = engine
            .attempt_decryption("fam-6", "dekrypt-nord", &wrong)
            .expect("attempt");
        assert_eq!(outcome, DecryptionOutcome::Incorrect { attempts: expected });
    }

    let correct: Vec<String> = vec![
        "sigma-sol".into(),
        "sigma-maane".into(),
        "sigma-stjerne".into(),
    ];
    let solved = engine
        .attempt_decryption("fam-6", "dekrypt-nord", &correct)
        .expect("solve");
    assert!(matches!(solved, DecryptionOutcome::Solved { .. }));

    let session = engine.get_session("fam-6").expect("read").expect("present");
    assert!(session.solved_decryptions.contains("dekrypt-nord"));
    assert_eq!(session.decryption_attempts.get("dekrypt-nord"), Some(&3));

    // Re-solving is a silent success and freezes the counter.
    let again = engine
        .attempt_decryption("fam-6", "dekrypt-nord", &wrong)
        .expect("noop");
    assert_eq!(
        again,
        DecryptionOutcome::Solved {
            newly_earned: vec![]
        }
    );
    let session = engine.get_session("fam-6").expect("read").expect("present");
    assert_eq!(session.decryption_attempts.get("dekrypt-nord"), Some(&3));
}

#[test]
fn unknown_challenge_is_a_typed_not_found() {
    let (_store, engine) = engine_at_day(10);
    engine.create_session(Some("fam-7".into())).expect("create");

    let err = engine
        .attempt_decryption("fam-7", "dekrypt-finnes-ikke", &["sigma-sol".into()])
        .unwrap_err();
    assert!(matches!(err, KalenderError::NotFound { .. }));
}

#[test]
fn ninth_symbol_triggers_exactly_one_badge_event() {
    let (_store, engine) = engine_at_day(12);
    engine.create_session(Some("fam-8".into())).expect("create");

    let (tx, rx) = mpsc::channel();
    engine.notifier().subscribe(Arc::new(move |b: &EarnedBadge| {
        tx.send(b.badge_id.clone()).ok();
    }));

    for i in 0..8 {
        engine
            .record_symbol_collected("fam-8", &format!("sigma-{i}"), None, None)
            .expect("collect");
    }
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    let newly = engine
        .record_symbol_collected("fam-8", "sigma-niende", Some("⭐"), Some("Den niende"))
        .expect("ninth");
    assert_eq!(newly.len(), 1);
    assert_eq!(newly[0].badge_id, "symboljeger");

    let event = rx.recv_timeout(Duration::from_secs(2)).expect("event");
    assert_eq!(event, "symboljeger");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    // Collecting the same symbol again is a no-op union.
    let repeat = engine
        .record_symbol_collected("fam-8", "sigma-niende", None, None)
        .expect("repeat");
    assert!(repeat.is_empty());
}

#[test]
fn bonus_paths_resolve_the_crisis_flag() {
    let (_store, engine) = engine_at_day(20);
    engine.create_session(Some("fam-9".into())).expect("create");

    // Day 10 validates by secondary code.
    assert!(!engine
        .submit_bonus_code("fam-9", 10, "FEIL")
        .expect("wrong code"));
    assert!(engine
        .submit_bonus_code("fam-9", 10, "ekko")
        .expect("right code"));
    let session = engine.get_session("fam-9").expect("read").expect("present");
    assert_eq!(session.crisis_status.get("antenna"), Some(&true));
    assert!(session.has_badge("bonus-antenne"));

    // Day 17 is guardian-confirmed; the code path is a validation error.
    let err = engine.submit_bonus_code("fam-9", 17, "NOE").unwrap_err();
    assert!(matches!(err, KalenderError::Validation { .. }));
    engine.confirm_bonus("fam-9", 17).expect("guardian confirm");
    let session = engine.get_session("fam-9").expect("read").expect("present");
    assert!(session.has_badge("bonus-generator"));

    // And the inverse: day 10 is not guardian-confirmed.
    let err = engine.confirm_bonus("fam-9", 10).unwrap_err();
    assert!(matches!(err, KalenderError::Validation { .. }));

    // Re-resolving an already-resolved crisis is a silent no-op.
    let newly = engine.resolve_crisis("fam-9", "antenna").expect("noop");
    assert!(newly.is_empty());
}

#[test]
fn persistence_failure_discards_the_mutation() {
    let (store, engine) = engine_at_day(5);
    engine.create_session(Some("fam-10".into())).expect("create");

    store.fail_next_write();
    let err = engine.submit_code("fam-10", "NORDLYS").unwrap_err();
    assert!(err.is_retryable());

    // No partial state was surfaced.
    let session = engine
        .get_session("fam-10")
        .expect("read")
        .expect("present");
    assert!(session.submitted_codes.is_empty());
    assert!(session.completed_days.is_empty());

    // The next attempt succeeds cleanly.
    assert!(engine.submit_code("fam-10", "NORDLYS").expect("retry").accepted);
}

#[test]
fn duplicate_submission_does_not_touch_the_store() {
    let (store, engine) = engine_at_day(5);
    engine.create_session(Some("fam-11".into())).expect("create");

    engine.submit_code("fam-11", "NORDLYS").expect("submit");
    let writes = store.write_count();
    engine.submit_code("fam-11", "NORDLYS").expect("duplicate");
    assert_eq!(store.write_count(), writes);
}

#[test]
fn disjoint_field_updates_both_survive() {
    let (_store, engine) = engine_at_day(12);
    engine.create_session(Some("fam-12".into())).expect("create");

    engine
        .set_friend_names("fam-12", vec!["Iver".into(), "Selma".into()])
        .expect("guardian patch");
    engine
        .resolve_crisis("fam-12", "antenna")
        .expect("child mutation");
    engine
        .set_friend_names("fam-12", vec!["Iver".into()])
        .expect("guardian patch again");

    let session = engine
        .get_session("fam-12")
        .expect("read")
        .expect("present");
    assert_eq!(session.friend_names, vec!["Iver"]);
    assert_eq!(session.crisis_status.get("antenna"), Some(&true));
}

#[test]
fn viewed_emails_are_tracked_without_gating() {
    let (_store, engine) = engine_at_day(6);
    engine.create_session(Some("fam-13".into())).expect("create");

    engine.mark_email_viewed("fam-13", 2, false).expect("plain");
    engine.mark_email_viewed("fam-13", 2, true).expect("bonus");
    engine.mark_email_viewed("fam-13", 4, false).expect("plain");

    let session = engine
        .get_session("fam-13")
        .expect("read")
        .expect("present");
    assert_eq!(
        session.viewed_emails.iter().copied().collect::<Vec<_>>(),
        vec![2, 4]
    );
    assert_eq!(
        session
            .viewed_bonus_emails
            .iter()
            .copied()
            .collect::<Vec<_>>(),
        vec![2]
    );
}

#[test]
fn projections_of_unknown_sessions_are_empty() {
    let (_store, engine) = engine_at_day(6);
    assert!(engine
        .get_visible_content("ingen")
        .expect("projection")
        .topics
        .is_empty());
    assert!(engine.get_completed_days("ingen").expect("days").is_empty());
    assert_eq!(engine.get_failed_attempts("ingen", 3).expect("count"), 0);
    assert_eq!(
        engine.session_overview("ingen").expect("overview"),
        Default::default()
    );
}

#[test]
fn create_session_conflicts_on_existing_id() {
    let (_store, engine) = engine_at_day(6);
    engine.create_session(Some("fam-14".into())).expect("create");
    let err = engine.create_session(Some("fam-14".into())).unwrap_err();
    assert!(matches!(
        err,
        KalenderError::Store {
            source: StoreError::Conflict { .. },
            ..
        }
    ));

    // Minted ids are fresh UUIDs.
    let record = engine.create_session(None).expect("minted");
    assert!(!record.session_id.is_empty());
}

#[test]
fn mission_for_tomorrow_respects_the_calendar_window() {
    let (_store, engine) = engine_at_day(4);
    let mission = engine.mission_for_tomorrow().expect("day 5 exists");
    assert_eq!(mission.day, 5);

    let (_store, engine) = engine_at_day(24);
    assert!(engine.mission_for_tomorrow().is_none());

    let store: Arc<Mutex<dyn SessionStore>> = Arc::new(Mutex::new(MemorySessionStore::new()));
    let outside_december = ProgressionEngine::new(
        store,
        builtin_catalog_shared(),
        GameClock::fixed(4, 7),
    );
    assert!(outside_december.mission_for_tomorrow().is_none());
}
