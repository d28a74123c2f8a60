use chrono::{Duration as ChronoDuration, Utc};
use notesync_lib::{
    decrypt, encrypt, is_encrypted, ChangeEvent, ChangeOutcome, EngineError, EngineEvent, EngineSettings,
    MemoryGateway, NewNote, Note, NoteBody, NoteChanges, NoteEngine, NoteKey, NoteKind, NoteRecord, Vault,
};
use notesync_lib::gateway::memory::GatewayCall;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn settings() -> EngineSettings {
    EngineSettings {
        sweep_interval_secs: 0,
        ..EngineSettings::default()
    }
}

fn record(id: &str, title: &str, body: &str) -> NoteRecord {
    let now = Utc::now();
    NoteRecord {
        id: id.to_string(),
        owner: "alice".to_string(),
        title: title.to_string(),
        body: body.to_string(),
        kind: NoteKind::Text,
        color: "default".to_string(),
        folder_id: None,
        pinned: false,
        position: 0,
        archived: false,
        deleted_at: None,
        expires_at: None,
        updated_at: now,
        created_at: now,
    }
}

async fn start(gateway: &Arc<MemoryGateway>, vault: &Vault) -> NoteEngine {
    let engine = NoteEngine::new("alice", gateway.clone(), Arc::new(vault.clone()), settings()).expect("engine");
    engine.start().await.expect("start");
    engine
}

/// Lets the feed pump and detached tasks run.
async fn pump() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn title(engine: &NoteEngine, id: &str) -> String {
    engine.get(id).expect("get").expect("note").title
}

fn drain(events: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn sorted_ids(notes: &[Note]) -> Vec<String> {
    let mut ids: Vec<String> = notes.iter().map(|note| note.id.clone()).collect();
    ids.sort();
    ids
}

fn count_calls(gateway: &MemoryGateway, call: &GatewayCall) -> usize {
    gateway.calls().iter().filter(|seen| *seen == call).count()
}

fn new_note(title: &str, body: &str) -> NewNote {
    NewNote {
        title: title.to_string(),
        body: body.to_string(),
        ..NewNote::default()
    }
}

#[tokio::test(start_paused = true)]
async fn stale_echo_inside_the_window_does_not_revert_a_local_edit() {
    let gateway = Arc::new(MemoryGateway::new());
    let stale = record("n1", "before", "body");
    gateway.seed(stale.clone());
    let engine = start(&gateway, &Vault::locked()).await;

    engine
        .update(
            "n1",
            NoteChanges {
                title: Some("after".to_string()),
                ..NoteChanges::default()
            },
        )
        .expect("update");
    assert_eq!(title(&engine, "n1"), "after");
    engine.settled().await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    gateway.push("alice", ChangeEvent::update(stale.clone()));
    pump().await;
    assert_eq!(title(&engine, "n1"), "after");
    assert!(engine.stats().echoes_suppressed >= 1);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert!(!engine.is_pending("n1"));
    let mut newer = stale;
    newer.title = "from elsewhere".to_string();
    gateway.push("alice", ChangeEvent::update(newer));
    pump().await;
    assert_eq!(title(&engine, "n1"), "from elsewhere");
}

#[tokio::test(start_paused = true)]
async fn remote_delete_wins_over_a_pending_edit() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("n1", "title", "body"));
    let engine = start(&gateway, &Vault::locked()).await;
    gateway.set_latency(Duration::from_millis(500));

    engine.pin("n1").expect("pin");
    assert!(engine.is_pending("n1"));
    assert_eq!(engine.apply_change(ChangeEvent::delete("n1")), ChangeOutcome::Removed);
    assert!(engine.get("n1").expect("get").is_none());
    assert!(!engine.is_pending("n1"));

    engine.settled().await;
    pump().await;
    assert!(engine.get("n1").expect("get").is_none());
}

#[tokio::test(start_paused = true)]
async fn own_insert_echo_does_not_duplicate_the_note() {
    let gateway = Arc::new(MemoryGateway::new());
    let engine = start(&gateway, &Vault::locked()).await;

    let note = engine.create(new_note("groceries", "milk")).expect("create");
    engine.settled().await;
    pump().await;

    let remote = gateway.record(&note.id).expect("remote copy");
    gateway.push("alice", ChangeEvent::insert(remote));
    pump().await;
    assert_eq!(engine.notes().expect("notes").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_notes_are_swept_exactly_once() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut expiring = record("gone", "temp", "body");
    expiring.expires_at = Some(Utc::now() - ChronoDuration::minutes(1));
    gateway.seed(expiring);
    gateway.seed(record("kept", "keep", "body"));
    let engine = NoteEngine::new("alice", gateway.clone(), Arc::new(Vault::locked()), settings()).expect("engine");
    let mut events = engine.subscribe_events();
    engine.start().await.expect("start");

    let first = engine.evaluate().expect("evaluate");
    assert_eq!(first.expired.len(), 1);
    assert_eq!(first.expired[0].id, "gone");
    assert_eq!(first.active.len(), 1);
    engine.settled().await;
    assert!(gateway.record("gone").is_none());

    let second = engine.evaluate().expect("evaluate again");
    assert!(second.expired.is_empty());
    let swept: Vec<EngineEvent> = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, EngineEvent::Swept { .. }))
        .collect();
    assert_eq!(
        swept,
        vec![EngineEvent::Swept {
            ids: vec!["gone".to_string()]
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_write_reloads_and_reports() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("n1", "server", "body"));
    let engine = start(&gateway, &Vault::locked()).await;
    let mut events = engine.subscribe_events();
    gateway.set_fail_writes(true);

    engine
        .update(
            "n1",
            NoteChanges {
                title: Some("local".to_string()),
                ..NoteChanges::default()
            },
        )
        .expect("optimistic update");
    assert_eq!(title(&engine, "n1"), "local");

    engine.settled().await;
    assert_eq!(title(&engine, "n1"), "server");
    assert!(!engine.is_pending("n1"));
    assert_eq!(engine.stats().writes_failed, 1);

    let seen = drain(&mut events);
    assert!(seen.iter().any(|event| matches!(
        event,
        EngineEvent::WriteFailed { ids, operation, .. } if ids == &vec!["n1".to_string()] && operation == "update"
    )));
    assert!(seen.contains(&EngineEvent::Reloaded { count: 1 }));
}

#[tokio::test(start_paused = true)]
async fn locked_vault_keeps_ciphertext_opaque_until_unlock() {
    let key = NoteKey::generate();
    let sealed = encrypt("secret plans", &key).expect("encrypt");
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("n1", "visible", &sealed));
    let vault = Vault::locked();
    let engine = start(&gateway, &vault).await;

    let note = engine.get("n1").expect("get").expect("note");
    assert_eq!(note.body, NoteBody::Sealed(sealed.clone()));
    assert!(note.encrypted);

    let blocked = engine.update(
        "n1",
        NoteChanges {
            body: Some("overwrite".to_string()),
            ..NoteChanges::default()
        },
    );
    assert!(matches!(blocked, Err(EngineError::VaultLocked(_))));

    engine
        .update(
            "n1",
            NoteChanges {
                title: Some("renamed".to_string()),
                ..NoteChanges::default()
            },
        )
        .expect("title edit");
    engine.settled().await;
    assert_eq!(gateway.record("n1").expect("remote").body, sealed);

    tokio::time::sleep(Duration::from_secs(2)).await;
    vault.unlock(key);
    engine.on_vault_unlocked().await.expect("resync");
    let note = engine.get("n1").expect("get").expect("note");
    assert_eq!(note.body, NoteBody::Plain("secret plans".to_string()));
    assert_eq!(note.title, "renamed");
}

#[tokio::test(start_paused = true)]
async fn locking_the_vault_purges_resident_plaintext() {
    let key = NoteKey::generate();
    let gateway = Arc::new(MemoryGateway::new());
    let vault = Vault::unlocked(key.clone());
    let engine = start(&gateway, &vault).await;

    let note = engine.create(new_note("diary", "dear diary")).expect("create");
    assert!(note.encrypted);
    engine.settled().await;
    let remote = gateway.record(&note.id).expect("remote");
    assert!(is_encrypted(&remote.body));
    assert_eq!(decrypt(&remote.body, &key).expect("decrypt"), "dear diary");

    tokio::time::sleep(Duration::from_secs(2)).await;
    vault.lock();
    assert_eq!(engine.on_vault_locked().expect("lock"), 1);
    assert_eq!(
        engine.get(&note.id).expect("get").expect("note").body,
        NoteBody::Withheld
    );

    engine.settled().await;
    assert_eq!(
        engine.get(&note.id).expect("get").expect("note").body,
        NoteBody::Sealed(remote.body)
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_never_leaves_duplicate_subscriptions() {
    let gateway = Arc::new(MemoryGateway::new());
    let engine = start(&gateway, &Vault::locked()).await;
    let mut events = engine.subscribe_events();
    assert_eq!(gateway.subscriber_count("alice"), 1);

    gateway.disconnect();
    pump().await;
    assert!(drain(&mut events).contains(&EngineEvent::FeedClosed));
    assert!(!engine.is_subscribed());

    gateway.seed(record("missed", "written while offline", "body"));
    assert_eq!(engine.reconnect().await.expect("reconnect"), 1);
    engine.reconnect().await.expect("reconnect twice");
    assert_eq!(gateway.subscriber_count("alice"), 1);
    assert!(engine.is_subscribed());

    gateway.push("alice", ChangeEvent::insert(record("live", "pushed", "body")));
    pump().await;
    assert_eq!(engine.notes().expect("notes").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn operations_after_sign_out_require_authentication() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("n1", "title", "body"));
    let engine = start(&gateway, &Vault::locked()).await;

    engine.shutdown().await;
    assert_eq!(gateway.subscriber_count("alice"), 0);
    assert!(matches!(engine.notes(), Err(EngineError::AuthenticationRequired)));
    assert!(matches!(
        engine.create(new_note("late", "write")),
        Err(EngineError::AuthenticationRequired)
    ));
    assert!(matches!(engine.load().await, Err(EngineError::AuthenticationRequired)));

    let anonymous = NoteEngine::new(" ", gateway.clone(), Arc::new(Vault::locked()), settings());
    assert!(matches!(anonymous, Err(EngineError::AuthenticationRequired)));
}

#[tokio::test(start_paused = true)]
async fn deleting_a_folder_unfiles_its_notes() {
    let gateway = Arc::new(MemoryGateway::new());
    let engine = start(&gateway, &Vault::locked()).await;

    let folder = engine.create_folder("Work", "blue").expect("folder");
    let note = engine
        .create(NewNote {
            folder_id: Some(folder.id.clone()),
            ..new_note("standup", "notes")
        })
        .expect("create");
    let views = engine.views().expect("views");
    assert_eq!(views.by_folder[&folder.id].len(), 1);
    assert!(views.by_kind.get(&NoteKind::Text).is_none());

    assert!(matches!(
        engine.move_to_folder(&note.id, Some("missing".to_string())),
        Err(EngineError::NotFound(_))
    ));

    assert_eq!(engine.delete_folder(&folder.id).expect("delete folder"), 1);
    engine.settled().await;
    assert_eq!(engine.get(&note.id).expect("get").expect("note").folder_id, None);
    assert!(engine.folders().expect("folders").is_empty());
    assert!(gateway.folders().is_empty());
    assert_eq!(gateway.record(&note.id).expect("remote").folder_id, None);
    assert_eq!(engine.views().expect("views").by_kind[&NoteKind::Text].len(), 1);
}

#[tokio::test(start_paused = true)]
async fn legacy_plaintext_is_migrated_once() {
    let key = NoteKey::generate();
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("old", "legacy", "written before encryption"));
    let engine = start(&gateway, &Vault::unlocked(key.clone())).await;

    assert!(!engine.get("old").expect("get").expect("note").encrypted);
    assert_eq!(engine.migrate_plaintext().expect("migrate"), 1);
    engine.settled().await;

    let remote = gateway.record("old").expect("remote");
    assert_eq!(decrypt(&remote.body, &key).expect("decrypt"), "written before encryption");
    let local = engine.get("old").expect("get").expect("note");
    assert!(local.encrypted);
    assert_eq!(local.body, NoteBody::Plain("written before encryption".to_string()));
    assert_eq!(engine.migrate_plaintext().expect("migrate again"), 0);
}

#[tokio::test(start_paused = true)]
async fn board_orders_pinned_then_positioned_notes() {
    let gateway = Arc::new(MemoryGateway::new());
    let engine = start(&gateway, &Vault::locked()).await;

    let a = engine.create(new_note("a", "")).expect("a");
    let b = engine.create(new_note("b", "")).expect("b");
    let c = engine.create(new_note("c", "")).expect("c");
    engine.pin(&c.id).expect("pin");
    assert_eq!(
        engine
            .set_positions(vec![(a.id.clone(), 1), (b.id.clone(), 2), ("ghost".to_string(), 3)])
            .expect("positions"),
        2
    );

    let board: Vec<String> = engine
        .views()
        .expect("views")
        .board
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(board, vec![c.id, a.id, b.id]);
}

#[tokio::test(start_paused = true)]
async fn trash_lapses_after_retention_and_can_be_emptied() {
    let gateway = Arc::new(MemoryGateway::new());
    let engine = start(&gateway, &Vault::locked()).await;

    let note = engine.create(new_note("old draft", "")).expect("create");
    engine.soft_delete(&note.id).expect("soft delete");
    let now = Utc::now();
    assert_eq!(engine.evaluate_at(now).expect("evaluate").deleted.len(), 1);

    let later = engine
        .evaluate_at(now + ChronoDuration::days(31))
        .expect("evaluate later");
    assert!(later.deleted.is_empty());
    assert!(later.active.is_empty());
    assert!(engine.get(&note.id).expect("get").is_some());

    engine.restore(&note.id).expect("restore");
    assert_eq!(engine.evaluate().expect("evaluate").active.len(), 1);

    engine.soft_delete(&note.id).expect("soft delete again");
    assert_eq!(engine.permanent_delete_all().expect("empty trash"), 1);
    engine.settled().await;
    assert!(engine.notes().expect("notes").is_empty());
    assert!(gateway.record(&note.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn delete_during_a_resync_is_not_undone_by_the_snapshot() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("n1", "doomed", "body"));
    gateway.seed(record("n2", "kept", "body"));
    let engine = start(&gateway, &Vault::locked()).await;
    gateway.set_latency(Duration::from_millis(500));

    let resync = tokio::spawn({
        let engine = engine.clone();
        async move { engine.on_foreground().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.permanent_delete("n1").expect("delete");

    assert_eq!(resync.await.expect("join").expect("resync"), 1);
    assert!(engine.get("n1").expect("get").is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    engine.settled().await;
    assert!(engine.get("n1").expect("get").is_none());
    assert!(gateway.record("n1").is_none());
    assert_eq!(title(&engine, "n2"), "kept");
}

#[tokio::test(start_paused = true)]
async fn note_swept_during_a_resync_is_swept_once() {
    let gateway = Arc::new(MemoryGateway::new());
    let mut expiring = record("gone", "temp", "body");
    expiring.expires_at = Some(Utc::now() - ChronoDuration::minutes(1));
    gateway.seed(expiring);
    gateway.seed(record("kept", "keep", "body"));
    let engine = start(&gateway, &Vault::locked()).await;
    gateway.set_latency(Duration::from_millis(500));

    let resync = tokio::spawn({
        let engine = engine.clone();
        async move { engine.resync().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.evaluate().expect("evaluate").expired.len(), 1);
    resync.await.expect("join").expect("resync");

    assert!(engine.get("gone").expect("get").is_none());
    assert!(engine.evaluate().expect("evaluate again").expired.is_empty());
    engine.settled().await;
    assert_eq!(count_calls(&gateway, &GatewayCall::Delete("gone".to_string())), 1);
    assert_eq!(engine.stats().sweeps_issued, 1);
}

#[tokio::test(start_paused = true)]
async fn remote_update_merged_during_a_resync_survives_it() {
    let gateway = Arc::new(MemoryGateway::new());
    let original = record("n1", "before", "body");
    gateway.seed(original.clone());
    let engine = start(&gateway, &Vault::locked()).await;
    gateway.set_latency(Duration::from_millis(500));

    let resync = tokio::spawn({
        let engine = engine.clone();
        async move { engine.resync().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut newer = original;
    newer.title = "after".to_string();
    assert_eq!(engine.apply_change(ChangeEvent::update(newer)), ChangeOutcome::Merged);

    resync.await.expect("join").expect("resync");
    assert_eq!(title(&engine, "n1"), "after");
}

#[tokio::test(start_paused = true)]
async fn bulk_archive_skips_unknown_ids() {
    let gateway = Arc::new(MemoryGateway::new());
    for id in ["a", "b", "c"] {
        gateway.seed(record(id, id, ""));
    }
    let engine = start(&gateway, &Vault::locked()).await;

    assert_eq!(engine.archive_many(&ids(&["a", "b", "ghost"])).expect("archive"), 2);
    assert!(engine.is_pending("a"));
    assert!(engine.is_pending("b"));
    assert!(!engine.is_pending("c"));
    assert!(!engine.is_pending("ghost"));

    let partitions = engine.evaluate().expect("evaluate");
    assert_eq!(sorted_ids(&partitions.archived), ids(&["a", "b"]));
    assert_eq!(sorted_ids(&partitions.active), ids(&["c"]));
    assert!(engine.views().expect("views").board.iter().all(|note| note.id == "c"));

    engine.settled().await;
    assert_eq!(count_calls(&gateway, &GatewayCall::Update("a".to_string())), 1);
    assert_eq!(count_calls(&gateway, &GatewayCall::Update("b".to_string())), 1);
    assert_eq!(count_calls(&gateway, &GatewayCall::Update("ghost".to_string())), 0);
    assert!(gateway.record("a").expect("remote").archived);

    let restored = engine.unarchive("a").expect("unarchive");
    assert!(!restored.archived);
    let partitions = engine.evaluate().expect("evaluate");
    assert_eq!(sorted_ids(&partitions.archived), ids(&["b"]));
    assert_eq!(sorted_ids(&partitions.active), ids(&["a", "c"]));
    engine.settled().await;
    assert!(!gateway.record("a").expect("remote").archived);

    let error = engine.archive_many(&ids(&["ghost"])).expect_err("nothing resident");
    assert_eq!(error.code(), "NOT_FOUND");
    assert!(matches!(engine.unarchive("ghost"), Err(EngineError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn bulk_move_trash_and_purge_touch_only_resident_notes() {
    let gateway = Arc::new(MemoryGateway::new());
    for id in ["a", "b", "c"] {
        gateway.seed(record(id, id, ""));
    }
    let engine = start(&gateway, &Vault::locked()).await;
    let folder = engine.create_folder("Work", "blue").expect("folder");

    assert_eq!(
        engine
            .move_many(&ids(&["a", "b", "ghost"]), Some(folder.id.clone()))
            .expect("move"),
        2
    );
    assert_eq!(sorted_ids(&engine.views().expect("views").by_folder[&folder.id]), ids(&["a", "b"]));
    assert!(matches!(
        engine.move_many(&ids(&["c"]), Some("missing".to_string())),
        Err(EngineError::NotFound(_))
    ));
    engine.settled().await;
    assert_eq!(gateway.record("b").expect("remote").folder_id, Some(folder.id.clone()));
    assert_eq!(gateway.record("c").expect("remote").folder_id, None);

    assert_eq!(engine.move_many(&ids(&["b"]), None).expect("unfile"), 1);
    assert_eq!(engine.get("b").expect("get").expect("note").folder_id, None);

    assert_eq!(engine.soft_delete_many(&ids(&["a", "c", "ghost"])).expect("trash"), 2);
    let partitions = engine.evaluate().expect("evaluate");
    assert_eq!(sorted_ids(&partitions.deleted), ids(&["a", "c"]));
    assert_eq!(sorted_ids(&partitions.active), ids(&["b"]));
    engine.settled().await;
    assert!(gateway.record("c").expect("remote").deleted_at.is_some());

    assert_eq!(engine.permanent_delete_many(&ids(&["a", "ghost"])).expect("purge"), 1);
    assert!(engine.get("a").expect("get").is_none());
    assert!(engine.is_pending("a"));
    engine.settled().await;
    assert_eq!(count_calls(&gateway, &GatewayCall::DeleteMany(ids(&["a"]))), 1);
    assert!(gateway.record("a").is_none());
    assert!(gateway.record("c").is_some());

    assert_eq!(engine.permanent_delete_many(&ids(&["ghost"])).expect("nothing to purge"), 0);
    assert!(matches!(
        engine.soft_delete_many(&ids(&["ghost"])),
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn colour_and_pin_changes_reach_the_gateway() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("n1", "title", "body"));
    let engine = start(&gateway, &Vault::locked()).await;

    assert_eq!(engine.set_color("n1", "red").expect("colour").color, "red");
    assert!(engine.pin("n1").expect("pin").pinned);
    assert!(engine.is_pending("n1"));
    engine.settled().await;
    let remote = gateway.record("n1").expect("remote");
    assert_eq!(remote.color, "red");
    assert!(remote.pinned);

    assert!(!engine.unpin("n1").expect("unpin").pinned);
    engine.settled().await;
    assert!(!gateway.record("n1").expect("remote").pinned);
    assert_eq!(count_calls(&gateway, &GatewayCall::Update("n1".to_string())), 3);

    assert!(matches!(engine.set_color("ghost", "red"), Err(EngineError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn migration_flags_exactly_the_notes_it_writes() {
    let key = NoteKey::generate();
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed(record("old1", "first", "plain one"));
    gateway.seed(record("old2", "second", "plain two"));
    gateway.seed(record("sealed", "third", &encrypt("already secret", &key).expect("encrypt")));

    let locked = start(&gateway, &Vault::locked()).await;
    assert!(matches!(locked.migrate_plaintext(), Err(EngineError::VaultLocked(_))));
    assert!(!locked.get("old1").expect("get").expect("note").encrypted);
    locked.shutdown().await;

    let engine = start(&gateway, &Vault::unlocked(key.clone())).await;
    assert_eq!(engine.migrate_plaintext().expect("migrate"), 2);
    for id in ["old1", "old2", "sealed"] {
        assert!(engine.get(id).expect("get").expect("note").encrypted);
    }
    engine.settled().await;

    assert_eq!(count_calls(&gateway, &GatewayCall::Update("old1".to_string())), 1);
    assert_eq!(count_calls(&gateway, &GatewayCall::Update("old2".to_string())), 1);
    assert_eq!(count_calls(&gateway, &GatewayCall::Update("sealed".to_string())), 0);
    assert!(is_encrypted(&gateway.record("old2").expect("remote").body));
}
