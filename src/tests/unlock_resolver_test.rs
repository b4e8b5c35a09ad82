use chrono::Utc;

use crate::catalog_loader::{builtin_catalog, from_toml_str};
use crate::session_record::SessionRecord;
use crate::unlock_resolver::{mission_accessible, resolve_session};

fn complete_days(session: &mut SessionRecord, days: &[u32]) {
    let catalog = builtin_catalog();
    for day in days {
        let mission = catalog.mission_for_day(*day).expect("mission exists");
        session.append_code(&mission.code, Utc::now());
    }
}

#[test]
fn completed_days_derive_from_codes() {
    let mut session = SessionRecord::new("fam-1");
    complete_days(&mut session, &[1, 3]);
    session.append_code("tull-og-toys", Utc::now());

    resolve_session(&mut session, builtin_catalog(), Utc::now());

    assert_eq!(
        session.completed_days.iter().copied().collect::<Vec<_>>(),
        vec![1, 3]
    );
    // Day 1 reveals the nordlys topic and a file; day 3 reveals morse.
    assert_eq!(session.topic_unlocks.get("nordlys"), Some(&1));
    assert_eq!(session.topic_unlocks.get("morse"), Some(&3));
    assert!(session.unlocked_files.contains("morsetabell"));
}

#[test]
fn resolution_is_idempotent() {
    let mut session = SessionRecord::new("fam-2");
    complete_days(&mut session, &[1, 2, 3, 4]);

    let first = resolve_session(&mut session, builtin_catalog(), Utc::now());
    let snapshot = session.clone();
    let second = resolve_session(&mut session, builtin_catalog(), Utc::now());

    assert!(second.is_empty(), "re-resolving must award nothing new");
    assert_eq!(session, snapshot);
    // First pass may or may not have awarded, but never twice.
    for badge in &first {
        assert_eq!(
            session
                .earned_badges
                .iter()
                .filter(|b| b.badge_id == badge.badge_id)
                .count(),
            1
        );
    }
}

#[test]
fn topic_unlock_day_is_frozen_at_first_insertion() {
    let mut session = SessionRecord::new("fam-3");
    complete_days(&mut session, &[1]);
    resolve_session(&mut session, builtin_catalog(), Utc::now());
    assert_eq!(session.topic_unlocks.get("nordlys"), Some(&1));

    complete_days(&mut session, &[2, 3]);
    resolve_session(&mut session, builtin_catalog(), Utc::now());
    assert_eq!(session.topic_unlocks.get("nordlys"), Some(&1));
}

#[test]
fn story_arc_badge_needs_every_phase() {
    let catalog = builtin_catalog();
    let mut session = SessionRecord::new("fam-4");
    // Romjakten spans days 2, 5, 9 and 13.
    complete_days(&mut session, &[2, 5, 9]);
    resolve_session(&mut session, catalog, Utc::now());
    assert!(!session.has_badge("eventyr-romjakten"));

    complete_days(&mut session, &[13]);
    let newly = resolve_session(&mut session, catalog, Utc::now());
    assert!(session.has_badge("eventyr-romjakten"));
    assert_eq!(
        newly
            .iter()
            .filter(|b| b.badge_id == "eventyr-romjakten")
            .count(),
        1
    );
    assert_eq!(session.eventyr_badges, vec!["eventyr-romjakten"]);
}

#[test]
fn symbol_badge_fires_exactly_once_at_threshold() {
    let catalog = builtin_catalog();
    let mut session = SessionRecord::new("fam-5");
    for i in 0..8 {
        session.collected_symbols.insert(format!("sigma-{i}"));
    }
    let newly = resolve_session(&mut session, catalog, Utc::now());
    assert!(newly.iter().all(|b| b.badge_id != "symboljeger"));

    session.collected_symbols.insert("sigma-niende".to_string());
    let newly = resolve_session(&mut session, catalog, Utc::now());
    assert_eq!(
        newly.iter().filter(|b| b.badge_id == "symboljeger").count(),
        1
    );

    // A further symbol never re-awards.
    session.collected_symbols.insert("sigma-tiende".to_string());
    let newly = resolve_session(&mut session, catalog, Utc::now());
    assert!(newly.is_empty());
}

#[test]
fn quest_count_badges_fire_at_their_thresholds() {
    let catalog = builtin_catalog();
    let mut session = SessionRecord::new("fam-6");
    complete_days(&mut session, &(1..=11).collect::<Vec<_>>());
    resolve_session(&mut session, catalog, Utc::now());
    assert!(!session.has_badge("halvveis"));

    complete_days(&mut session, &[12]);
    resolve_session(&mut session, catalog, Utc::now());
    assert!(session.has_badge("halvveis"));
    assert!(!session.has_badge("kalendermester"));

    complete_days(&mut session, &(13..=24).collect::<Vec<_>>());
    resolve_session(&mut session, catalog, Utc::now());
    assert!(session.has_badge("kalendermester"));
}

#[test]
fn bonus_badge_reads_only_the_crisis_flag() {
    let catalog = builtin_catalog();
    let mut session = SessionRecord::new("fam-7");
    resolve_session(&mut session, catalog, Utc::now());
    assert!(!session.has_badge("bonus-antenne"));

    session.crisis_status.insert("antenna".to_string(), true);
    let newly = resolve_session(&mut session, catalog, Utc::now());
    assert!(session.has_badge("bonus-antenne"));
    assert_eq!(newly.len(), 1);
    assert_eq!(session.bonus_oppdrag_badges, vec!["bonus-antenne"]);
}

#[test]
fn requirement_gating_is_independent_of_calendar_day() {
    let catalog = builtin_catalog();
    let mut session = SessionRecord::new("fam-8");
    // Day 13 requires day 9 to be completed first.
    let mission = catalog.mission_for_day(13).expect("day 13");
    assert!(!mission_accessible(mission, &session, 24));

    complete_days(&mut session, &[3, 5, 9]);
    resolve_session(&mut session, catalog, Utc::now());
    assert!(mission_accessible(mission, &session, 24));
    assert!(!mission_accessible(mission, &session, 12));
}

#[test]
fn unknown_catalog_ids_never_award() {
    let calendar = r#"
        [[mission]]
        day = 1
        code = "EN"
        title = "Dag en"

        [[badge]]
        id = "spokelse-arc"
        title = "Spøkelse"
        [badge.condition]
        kind = "eventyr"
        arc_id = "finnes-ikke"

        [[badge]]
        id = "spokelse-dekrypt"
        title = "Spøkelse to"
        [badge.condition]
        kind = "all_decryptions_solved"
        ids = ["finnes-ikke"]

        [[badge]]
        id = "spokelse-bonus"
        title = "Spøkelse tre"
        [badge.condition]
        kind = "bonusoppdrag"
        day = 19
    "#;
    let catalog = from_toml_str(calendar).expect("catalog");
    let mut session = SessionRecord::new("fam-9");
    session.append_code("EN", Utc::now());
    session.crisis_status.insert("antenna".to_string(), true);

    let newly = resolve_session(&mut session, &catalog, Utc::now());
    assert!(newly.is_empty());
    assert!(session.earned_badges.is_empty());
}

#[test]
fn unlock_collections_never_shrink() {
    let catalog = builtin_catalog();
    let mut session = SessionRecord::new("fam-10");

    let mut topic_count = 0;
    let mut file_count = 0;
    let mut badge_count = 0;
    for day in 1..=24 {
        complete_days(&mut session, &[day]);
        resolve_session(&mut session, catalog, Utc::now());
        assert!(session.topic_unlocks.len() >= topic_count);
        assert!(session.unlocked_files.len() >= file_count);
        assert!(session.earned_badges.len() >= badge_count);
        topic_count = session.topic_unlocks.len();
        file_count = session.unlocked_files.len();
        badge_count = session.earned_badges.len();
    }
    assert_eq!(session.completed_days.len(), 24);
}
