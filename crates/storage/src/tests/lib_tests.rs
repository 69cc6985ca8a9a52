use super::*;
use shared::domain::{Speaker, Tag};

fn event(id: &str) -> EventId {
    EventId::new(id)
}

async fn memory_store() -> ScheduleStore {
    ScheduleStore::connect("sqlite::memory:").await.expect("db")
}

#[tokio::test]
async fn init_runs_setup_once_across_clones() {
    let store = ScheduleStore::new("sqlite::memory:");
    let clone = store.clone();

    let (first, second, third) = tokio::join!(store.init(), clone.init(), store.init());
    first.expect("first init");
    second.expect("second init");
    third.expect("third init");
    clone.init().await.expect("late init");

    assert_eq!(store.setup_runs.load(Ordering::SeqCst), 1);
    assert!(clone.is_initialized());
}

#[tokio::test]
async fn operations_before_init_report_unavailable() {
    let store = ScheduleStore::new("sqlite::memory:");
    let err = store
        .add_section(&event("E"), &Section::new("E", "s1", "Day 1", 0))
        .await
        .expect_err("store is not initialized");
    assert!(err.is_unavailable(), "unexpected error: {err}");
}

#[tokio::test]
async fn operations_after_close_report_unavailable() {
    let store = memory_store().await;
    store.close().await;
    assert!(!store.is_initialized());

    let err = store
        .get_all_sections(&event("E"))
        .await
        .expect_err("store is closed");
    assert!(err.is_unavailable(), "unexpected error: {err}");
}

#[tokio::test]
async fn init_after_close_stays_unavailable() {
    let store = memory_store().await;
    store.close().await;

    let err = store.init().await.expect_err("closed store cannot be reopened");
    assert!(err.is_unavailable(), "unexpected error: {err}");
    assert!(!store.is_initialized());
    assert_eq!(store.setup_runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let store = memory_store().await;
    store.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("schedule.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let store = ScheduleStore::connect(database_url).await.expect("db");
    store.close().await;

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn section_round_trip_and_delete() {
    let store = memory_store().await;
    let mut section = Section::new("E", "s1", "Monday", 4);
    section.date = Some("2024-06-03".to_string());

    store.add_section(&event("E"), &section).await.expect("add");
    let loaded = store
        .get_section(&event("E"), &section.id)
        .await
        .expect("get")
        .expect("section exists");
    assert_eq!(loaded, section);

    store
        .delete_section(&event("E"), &section.id)
        .await
        .expect("delete");
    assert!(store
        .get_section(&event("E"), &section.id)
        .await
        .expect("get after delete")
        .is_none());

    store
        .delete_section(&event("E"), &section.id)
        .await
        .expect("second delete is a no-op");
}

#[tokio::test]
async fn add_section_rejects_duplicate_key() {
    let store = memory_store().await;
    let section = Section::new("E", "s1", "Monday", 0);
    store.add_section(&event("E"), &section).await.expect("add");

    let err = store
        .add_section(&event("E"), &Section::new("E", "s1", "Renamed", 9))
        .await
        .expect_err("duplicate");
    assert!(matches!(
        err,
        StoreError::DuplicateKey {
            collection: Collection::Sections,
            ..
        }
    ));

    let kept = store
        .get_section(&event("E"), &section.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(kept.name, "Monday");
}

#[tokio::test]
async fn put_section_overwrites_in_place() {
    let store = memory_store().await;
    store
        .put_section(&event("E"), &Section::new("E", "s1", "Monday", 0))
        .await
        .expect("put");
    store
        .put_section(&event("E"), &Section::new("E", "s1", "Tuesday", 7))
        .await
        .expect("put again");

    let all = store.get_all_sections(&event("E")).await.expect("list");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Tuesday");
    assert_eq!(all[0].order, 7);
}

#[tokio::test]
async fn sections_are_isolated_per_event() {
    let store = memory_store().await;
    store
        .add_section(&event("e1"), &Section::new("e1", "s1", "Monday", 0))
        .await
        .expect("add e1");
    store
        .add_section(&event("e2"), &Section::new("e2", "s1", "Other Monday", 0))
        .await
        .expect("same id under another event");

    let e1 = store.get_all_sections(&event("e1")).await.expect("e1");
    let e2 = store.get_all_sections(&event("e2")).await.expect("e2");
    assert_eq!(e1.len(), 1);
    assert_eq!(e2.len(), 1);
    assert_eq!(e2[0].name, "Other Monday");
    assert!(store
        .get_all_sections(&event("e3"))
        .await
        .expect("e3")
        .is_empty());
}

#[tokio::test]
async fn sections_sort_by_order_then_id() {
    let store = memory_store().await;
    for (id, order) in [("s3", 1), ("s1", 5), ("s2", 1)] {
        store
            .add_section(&event("E"), &Section::new("E", id, id, order))
            .await
            .expect("add");
    }

    let ids: Vec<_> = store
        .get_all_sections(&event("E"))
        .await
        .expect("list")
        .into_iter()
        .map(|s| s.id.0)
        .collect();
    assert_eq!(ids, ["s2", "s3", "s1"]);
}

#[tokio::test]
async fn reorder_sections_assigns_dense_positions() {
    let store = memory_store().await;
    let sections: Vec<_> = [("a", 40), ("b", -3), ("c", 17), ("d", 2)]
        .into_iter()
        .map(|(id, order)| Section::new("E", id, id, order))
        .collect();
    for section in &sections {
        store.add_section(&event("E"), section).await.expect("add");
    }

    let shuffled = vec![
        sections[2].clone(),
        sections[0].clone(),
        sections[3].clone(),
        sections[1].clone(),
    ];
    let written = store
        .reorder_sections(&event("E"), &shuffled)
        .await
        .expect("reorder");
    assert_eq!(written.len(), 4);

    let all = store.get_all_sections(&event("E")).await.expect("list");
    let observed: Vec<_> = all.iter().map(|s| (s.id.0.as_str(), s.order)).collect();
    assert_eq!(observed, [("c", 0), ("a", 1), ("d", 2), ("b", 3)]);
}

#[tokio::test]
async fn partial_reorder_leaves_other_sections_untouched() {
    let store = memory_store().await;
    for (id, order) in [("a", 0), ("b", 1), ("c", 10)] {
        store
            .add_section(&event("E"), &Section::new("E", id, id, order))
            .await
            .expect("add");
    }

    store
        .reorder_sections(
            &event("E"),
            &[Section::new("E", "b", "b", 1), Section::new("E", "a", "a", 0)],
        )
        .await
        .expect("reorder");

    let c = store
        .get_section(&event("E"), &SectionId::new("c"))
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(c.order, 10);
}

#[tokio::test]
async fn session_payload_survives_storage() {
    let store = memory_store().await;
    let mut session = Session::new("E", "s1", "talk-1", "Opening", 0);
    session.description = "Welcome".to_string();
    session.tags = vec![Tag {
        name: "keynote".to_string(),
        kind: "format".to_string(),
    }];
    session.speakers = vec![Speaker {
        name: "Grace Hopper".to_string(),
        initials: "GH".to_string(),
    }];

    store.add_session(&event("E"), &session).await.expect("add");
    let loaded = store
        .get_session(&event("E"), &session.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded, session);

    let err = store
        .add_session(&event("E"), &session)
        .await
        .expect_err("duplicate session");
    assert!(matches!(
        err,
        StoreError::DuplicateKey {
            collection: Collection::Sessions,
            ..
        }
    ));
}

#[tokio::test]
async fn sessions_for_unknown_section_is_empty() {
    let store = memory_store().await;
    let sessions = store
        .get_all_sessions_for_section(&event("E"), &SectionId::new("missing-section"))
        .await
        .expect("query");
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn sessions_are_scoped_by_section_and_ordered() {
    let store = memory_store().await;
    for (section, id, order) in [
        ("s1", "t3", 2),
        ("s1", "t1", 0),
        ("s2", "t2", 0),
        ("s1", "t4", 2),
    ] {
        store
            .add_session(&event("E"), &Session::new("E", section, id, id, order))
            .await
            .expect("add");
    }

    let s1: Vec<_> = store
        .get_all_sessions_for_section(&event("E"), &SectionId::new("s1"))
        .await
        .expect("s1")
        .into_iter()
        .map(|s| s.id.0)
        .collect();
    assert_eq!(s1, ["t1", "t3", "t4"]);

    let all = store
        .get_all_sessions_for_event(&event("E"))
        .await
        .expect("event");
    assert_eq!(all.len(), 4);
    assert_eq!(all[3].section_id, SectionId::new("s2"));
}

#[tokio::test]
async fn delete_session_resolves_owning_section() {
    let store = memory_store().await;
    store
        .add_session(&event("E"), &Session::new("E", "s2", "t1", "Talk", 0))
        .await
        .expect("add");

    let owner = store
        .delete_session(&event("E"), &SessionId::new("t1"))
        .await
        .expect("delete");
    assert_eq!(owner, SectionId::new("s2"));

    let err = store
        .delete_session(&event("E"), &SessionId::new("t1"))
        .await
        .expect_err("already gone");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn reorder_sessions_moves_cards_into_target_section() {
    let store = memory_store().await;
    let moved = Session::new("E", "s1", "t1", "Moved", 0);
    let stays = Session::new("E", "s2", "t2", "Stays", 0);
    store.add_session(&event("E"), &moved).await.expect("add");
    store.add_session(&event("E"), &stays).await.expect("add");

    store
        .reorder_sessions(&event("E"), &SectionId::new("s2"), &[stays, moved])
        .await
        .expect("reorder");

    let s1 = store
        .get_all_sessions_for_section(&event("E"), &SectionId::new("s1"))
        .await
        .expect("s1");
    assert!(s1.is_empty());

    let s2: Vec<_> = store
        .get_all_sessions_for_section(&event("E"), &SectionId::new("s2"))
        .await
        .expect("s2")
        .into_iter()
        .map(|s| (s.id.0, s.order))
        .collect();
    assert_eq!(s2, [("t2".to_string(), 0), ("t1".to_string(), 1)]);
}

#[tokio::test]
async fn clear_event_removes_only_that_event() {
    let store = memory_store().await;
    store
        .add_section(&event("E"), &Section::new("E", "s1", "Monday", 0))
        .await
        .expect("add");
    store
        .add_session(&event("E"), &Session::new("E", "s1", "t1", "Talk", 0))
        .await
        .expect("add");
    store
        .add_section(&event("F"), &Section::new("F", "s1", "Monday", 0))
        .await
        .expect("add");

    let removed = store.clear_event(&event("E")).await.expect("clear");
    assert_eq!(removed, (1, 1));
    assert!(store
        .get_all_sections(&event("E"))
        .await
        .expect("E")
        .is_empty());
    assert_eq!(store.get_all_sections(&event("F")).await.expect("F").len(), 1);
}

#[tokio::test]
async fn reorder_with_repeated_ids_stays_dense() {
    let store = memory_store().await;
    for (id, order) in [("a", 5), ("b", 9)] {
        store
            .add_section(&event("E"), &Section::new("E", id, id, order))
            .await
            .expect("add");
    }
    let a = Section::new("E", "a", "a", 5);
    let b = Section::new("E", "b", "b", 9);

    let written = store
        .reorder_sections(&event("E"), &[a.clone(), b.clone(), a])
        .await
        .expect("reorder");
    assert_eq!(written.len(), 2);

    let all = store.get_all_sections(&event("E")).await.expect("list");
    let observed: Vec<_> = all.iter().map(|s| (s.id.0.as_str(), s.order)).collect();
    assert_eq!(observed, [("a", 0), ("b", 1)]);

    let t1 = Session::new("E", "s1", "t1", "One", 3);
    let t2 = Session::new("E", "s1", "t2", "Two", 4);
    let written = store
        .reorder_sessions(&event("E"), &SectionId::new("s1"), &[t2.clone(), t1, t2])
        .await
        .expect("reorder sessions");
    let orders: Vec<_> = written.iter().map(|s| (s.id.0.as_str(), s.order)).collect();
    assert_eq!(orders, [("t2", 0), ("t1", 1)]);
}

async fn block_writes_to(store: &ScheduleStore, table: &str, id: &str) {
    for timing in ["INSERT", "UPDATE"] {
        let ddl = format!(
            "CREATE TRIGGER block_{table}_{timing} BEFORE {timing} ON {table}
             WHEN NEW.id = '{id}'
             BEGIN SELECT RAISE(ABORT, 'write blocked'); END"
        );
        sqlx::query(&ddl)
            .execute(store.pool().expect("pool"))
            .await
            .expect("create trigger");
    }
}

#[tokio::test]
async fn failed_section_reorder_rolls_back_every_write() {
    let store = memory_store().await;
    for (id, order) in [("a", 0), ("b", 1), ("c", 2)] {
        store
            .add_section(&event("E"), &Section::new("E", id, id, order))
            .await
            .expect("add");
    }
    block_writes_to(&store, "sections", "b").await;

    let err = store
        .reorder_sections(
            &event("E"),
            &[
                Section::new("E", "c", "c", 2),
                Section::new("E", "a", "a", 0),
                Section::new("E", "b", "b", 1),
            ],
        )
        .await
        .expect_err("write to b is blocked");
    assert!(matches!(err, StoreError::Database(_)), "unexpected error: {err}");

    let all = store.get_all_sections(&event("E")).await.expect("list");
    let observed: Vec<_> = all.iter().map(|s| (s.id.0.as_str(), s.order)).collect();
    assert_eq!(observed, [("a", 0), ("b", 1), ("c", 2)]);
}

#[tokio::test]
async fn failed_session_reorder_rolls_back_every_write() {
    let store = memory_store().await;
    let t1 = Session::new("E", "s1", "t1", "One", 0);
    let t2 = Session::new("E", "s2", "t2", "Two", 0);
    store.add_session(&event("E"), &t1).await.expect("add");
    store.add_session(&event("E"), &t2).await.expect("add");
    block_writes_to(&store, "sessions", "t2").await;

    store
        .reorder_sessions(&event("E"), &SectionId::new("s2"), &[t1, t2])
        .await
        .expect_err("write to t2 is blocked");

    let moved = store
        .get_session(&event("E"), &SessionId::new("t1"))
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(moved.section_id, SectionId::new("s1"));
    assert_eq!(moved.order, 0);
}
