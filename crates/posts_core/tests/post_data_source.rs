use futures::StreamExt;
use posts_core::db::migrations::latest_version;
use posts_core::db::{open_db, open_db_in_memory};
use posts_core::{
    LiveQuery, PostDataSource, PostRecord, SourceError, SqlitePostDataSource, TableChange,
};
use rusqlite::Connection;
use std::time::Duration;
use tokio::time::timeout;

const QUIET_PERIOD: Duration = Duration::from_millis(150);

fn memory_source() -> SqlitePostDataSource {
    SqlitePostDataSource::try_new(open_db_in_memory().unwrap()).unwrap()
}

fn draft(name: &str, title: &str, body: &str) -> PostRecord {
    PostRecord {
        id: 0,
        name: name.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        created_at: 0,
        modified_at: 0,
        view_count: 0,
    }
}

async fn next<T>(stream: &mut LiveQuery<T>) -> Result<T, SourceError> {
    timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream should emit within timeout")
        .expect("stream ended unexpectedly")
}

#[tokio::test]
async fn put_assigns_id_and_timestamps() {
    let source = memory_source();

    let created = next(&mut source.put(draft("a", "t1", "b1"))).await.unwrap();

    assert!(created.id >= 1);
    assert_eq!(created.name, "a");
    assert_eq!(created.title, "t1");
    assert_eq!(created.body, "b1");
    assert_eq!(created.view_count, 0);
    assert!(created.created_at > 0);
    assert_eq!(created.created_at, created.modified_at);
}

#[tokio::test]
async fn put_emits_once_then_completes() {
    let source = memory_source();
    let mut put = source.put(draft("a", "t", "b"));

    next(&mut put).await.unwrap();
    assert!(put.next().await.is_none());
}

#[tokio::test]
async fn streams_are_cold_until_polled() {
    let source = memory_source();
    let mut changes = source.subscribe_changes();

    let mut pending = source.put(draft("a", "t", "b"));
    tokio::task::yield_now().await;
    assert!(changes.try_recv().is_err());

    let created = next(&mut pending).await.unwrap();
    assert_eq!(changes.recv().await.unwrap(), TableChange::Inserted(created.id));
}

#[tokio::test]
async fn dropped_write_still_notifies_live_queries() {
    let source = memory_source();
    let mut all = source.get_all();
    assert!(next(&mut all).await.unwrap().is_empty());

    let mut pending = source.put(draft("a", "t", "x".repeat(1 << 20).as_str()));
    let _ = futures::poll!(pending.next());
    drop(pending);

    let snapshot = next(&mut all).await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].title, "t");
}

#[tokio::test]
async fn get_all_reemits_after_each_write() {
    let source = memory_source();
    let mut all = source.get_all();
    assert!(next(&mut all).await.unwrap().is_empty());

    let created = next(&mut source.put(draft("a", "t1", "b1"))).await.unwrap();
    let snapshot = next(&mut all).await.unwrap();
    assert_eq!(snapshot, vec![created.clone()]);

    next(&mut source.delete(created)).await.unwrap();
    assert!(next(&mut all).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_all_orders_by_id() {
    let source = memory_source();
    let first = next(&mut source.put(draft("a", "first", "b"))).await.unwrap();
    let second = next(&mut source.put(draft("a", "second", "b"))).await.unwrap();

    let snapshot = next(&mut source.get_all()).await.unwrap();
    let ids: Vec<_> = snapshot.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_get_all_subscriptions_both_observe_insert() {
    let source = memory_source();
    let mut first = source.get_all();
    let mut second = source.get_all();
    assert!(next(&mut first).await.unwrap().is_empty());
    assert!(next(&mut second).await.unwrap().is_empty());

    next(&mut source.put(draft("a", "t", "b"))).await.unwrap();

    let (first_snapshot, second_snapshot) = tokio::join!(next(&mut first), next(&mut second));
    assert_eq!(first_snapshot.unwrap().len(), 1);
    assert_eq!(second_snapshot.unwrap().len(), 1);
}

#[tokio::test]
async fn get_by_id_ignores_changes_to_other_rows() {
    let source = memory_source();
    let watched = next(&mut source.put(draft("a", "watched", "b"))).await.unwrap();
    let mut live = source.get_by_id(watched.id);
    assert_eq!(next(&mut live).await.unwrap(), watched);

    next(&mut source.put(draft("a", "other", "b"))).await.unwrap();
    assert!(timeout(QUIET_PERIOD, live.next()).await.is_err());

    let mut edited = watched.clone();
    edited.title = "edited".to_string();
    next(&mut source.update(edited)).await.unwrap();
    assert_eq!(next(&mut live).await.unwrap().title, "edited");
}

#[tokio::test]
async fn get_by_id_missing_row_emits_not_found_and_ends() {
    let source = memory_source();
    let mut live = source.get_by_id(404);

    assert!(matches!(next(&mut live).await, Err(SourceError::NotFound(404))));
    assert!(live.next().await.is_none());
}

#[tokio::test]
async fn get_by_id_reports_deletion_as_not_found() {
    let source = memory_source();
    let created = next(&mut source.put(draft("a", "t", "b"))).await.unwrap();
    let mut live = source.get_by_id(created.id);
    next(&mut live).await.unwrap();

    next(&mut source.delete(created.clone())).await.unwrap();

    assert!(matches!(
        next(&mut live).await,
        Err(SourceError::NotFound(id)) if id == created.id
    ));
}

#[tokio::test]
async fn update_replaces_every_field_and_keeps_timestamps_ordered() {
    let source = memory_source();
    let created = next(&mut source.put(draft("a", "t1", "b1"))).await.unwrap();

    let replacement = PostRecord {
        name: "z".to_string(),
        title: "t2".to_string(),
        body: "b2".to_string(),
        view_count: 9,
        ..created.clone()
    };
    let updated = next(&mut source.update(replacement)).await.unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.name, "z");
    assert_eq!(updated.title, "t2");
    assert_eq!(updated.body, "b2");
    assert_eq!(updated.view_count, 9);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.modified_at >= updated.created_at);
}

#[tokio::test]
async fn update_never_moves_modified_at_backwards() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posts.db");
    let source = SqlitePostDataSource::try_new(open_db(&path).unwrap()).unwrap();
    let created = next(&mut source.put(draft("a", "t1", "b1"))).await.unwrap();

    let later = created.created_at + 86_400_000_000;
    let writer = Connection::open(&path).unwrap();
    writer
        .execute(
            "UPDATE posts SET modified_at = ?1 WHERE id = ?2;",
            [later, created.id],
        )
        .unwrap();
    drop(writer);

    let mut edited = created.clone();
    edited.title = "t2".to_string();
    let updated = next(&mut source.update(edited)).await.unwrap();

    assert_eq!(updated.title, "t2");
    assert_eq!(updated.modified_at, later);
}

#[tokio::test]
async fn update_and_delete_of_missing_row_fail_with_not_found() {
    let source = memory_source();
    let mut ghost = draft("a", "t", "b");
    ghost.id = 77;

    assert!(matches!(
        next(&mut source.update(ghost.clone())).await,
        Err(SourceError::NotFound(77))
    ));
    assert!(matches!(
        next(&mut source.delete(ghost)).await,
        Err(SourceError::NotFound(77))
    ));
}

#[tokio::test]
async fn live_query_ends_when_source_is_dropped() {
    let source = memory_source();
    let mut all = source.get_all();
    next(&mut all).await.unwrap();

    drop(source);

    assert!(timeout(Duration::from_secs(5), all.next())
        .await
        .expect("stream should end")
        .is_none());
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqlitePostDataSource::try_new(conn) {
        Err(SourceError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn try_new_rejects_missing_posts_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqlitePostDataSource::try_new(conn),
        Err(SourceError::MissingRequiredTable("posts"))
    ));
}

#[test]
fn try_new_rejects_missing_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            modified_at INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqlitePostDataSource::try_new(conn),
        Err(SourceError::MissingRequiredColumn {
            table: "posts",
            column: "view_count"
        })
    ));
}
