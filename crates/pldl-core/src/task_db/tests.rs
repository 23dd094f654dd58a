//! Tests for task_db (use in-memory DB helper from db).

use crate::task_db::{open_memory, Playlist, TaskOptions, TaskStatus, TaskStore, Track};

fn sample_playlist() -> Playlist {
    Playlist {
        title: "Road Trip".to_string(),
        tracks: vec![Track {
            id: "0".to_string(),
            title: "Song".to_string(),
            artist: "Band".to_string(),
            url: "https://example.com/0".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn create_and_get_task() {
    let db = open_memory().await.unwrap();
    let id = db
        .create_task("https://example.com/list", Some("dev-1"))
        .await
        .unwrap();
    let task = db.get_task(&id).await.unwrap().expect("task exists");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.owner.as_deref(), Some("dev-1"));
    assert_eq!(task.url, "https://example.com/list");
    assert_eq!(task.options, TaskOptions::default());
    assert!(task.playlist.is_none());
    assert!(db.get_task("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn save_task_state_persists_playlist_and_options() {
    let db = open_memory().await.unwrap();
    let id = db.create_task("https://example.com/list", None).await.unwrap();
    let mut task = db.get_task(&id).await.unwrap().unwrap();
    task.transition(TaskStatus::Preparing, "Fetching").unwrap();
    task.transition(TaskStatus::Ready, "Ready").unwrap();
    task.playlist = Some(sample_playlist());
    task.options.selected_indices = vec![0];
    task.options.format = "m4a".to_string();
    db.save_task_state(&task).await.unwrap();

    let loaded = db.get_task(&id).await.unwrap().unwrap();
    assert_eq!(loaded.status, TaskStatus::Ready);
    assert_eq!(loaded.playlist, Some(sample_playlist()));
    assert_eq!(loaded.options.selected_indices, vec![0]);
    assert_eq!(loaded.options.format, "m4a");
}

#[tokio::test]
async fn full_save_does_not_clear_cancel_flag() {
    let db = open_memory().await.unwrap();
    let id = db.create_task("https://example.com/list", None).await.unwrap();
    let stale = db.get_task(&id).await.unwrap().unwrap();

    assert!(db.request_cancel(&id).await.unwrap());
    db.save_task_state(&stale).await.unwrap();
    assert!(db.is_cancel_requested(&id).await.unwrap());

    assert!(!db.request_cancel("missing").await.unwrap());
    assert!(db.is_cancel_requested("missing").await.unwrap());
}

#[tokio::test]
async fn owner_lookup_and_counts() {
    let db = open_memory().await.unwrap();
    let a = db.create_task("https://example.com/a", Some("dev-1")).await.unwrap();
    db.create_task("https://example.com/b", Some("dev-1")).await.unwrap();
    db.create_task("https://example.com/c", Some("dev-2")).await.unwrap();
    db.create_task("https://example.com/d", None).await.unwrap();

    assert_eq!(db.get_task_owner(&a).await.unwrap().as_deref(), Some("dev-1"));
    assert_eq!(db.get_task_owner("missing").await.unwrap(), None);

    let pending = [TaskStatus::Pending];
    assert_eq!(db.count_tasks_for_owner(Some("dev-1"), &pending).await.unwrap(), 2);
    assert_eq!(db.count_tasks_for_owner(Some("dev-2"), &pending).await.unwrap(), 1);
    assert_eq!(db.count_tasks_for_owner(None, &pending).await.unwrap(), 1);
    assert_eq!(
        db.count_tasks_for_owner(Some("dev-1"), &TaskStatus::RUNNING)
            .await
            .unwrap(),
        0
    );
    assert_eq!(db.count_tasks_for_owner(Some("dev-1"), &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn trait_object_delegates_to_db() {
    let db = open_memory().await.unwrap();
    let store: &dyn TaskStore = &db;
    let id = store.create_task("https://example.com/x", Some("o")).await.unwrap();
    assert_eq!(store.get_task_owner(&id).await.unwrap().as_deref(), Some("o"));
    assert!(!store.is_cancel_requested(&id).await.unwrap());
}

#[tokio::test]
async fn list_history_and_delete() {
    let db = open_memory().await.unwrap();
    let a = db.create_task("https://example.com/a", Some("dev-1")).await.unwrap();
    let b = db.create_task("https://example.com/b", Some("dev-2")).await.unwrap();

    let mut done = db.get_task(&a).await.unwrap().unwrap();
    done.playlist = Some(sample_playlist());
    for next in [
        TaskStatus::Preparing,
        TaskStatus::Ready,
        TaskStatus::Downloading,
        TaskStatus::Zipping,
        TaskStatus::Completed,
    ] {
        done.transition(next, "step").unwrap();
    }
    done.artifact_path = Some("/tmp/Song.mp3".to_string());
    db.save_task_state(&done).await.unwrap();

    let all = db.list_tasks(None, 50).await.unwrap();
    assert_eq!(all.len(), 2);
    let mine = db.list_tasks(Some("dev-1"), 50).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title.as_deref(), Some("Road Trip"));

    let history = db.recent_completed(None, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, a);
    assert!(db.recent_completed(Some("dev-2"), 10).await.unwrap().is_empty());

    assert!(db.delete_task(&b).await.unwrap());
    assert!(!db.delete_task(&b).await.unwrap());
    assert_eq!(db.list_tasks(None, 50).await.unwrap().len(), 1);
}

#[tokio::test]
async fn recover_interrupted_marks_in_flight_as_error() {
    let db = open_memory().await.unwrap();
    let running = db.create_task("https://example.com/a", None).await.unwrap();
    let idle = db.create_task("https://example.com/b", None).await.unwrap();

    let mut task = db.get_task(&running).await.unwrap().unwrap();
    task.transition(TaskStatus::Preparing, "Fetching").unwrap();
    task.transition(TaskStatus::Ready, "Ready").unwrap();
    task.transition(TaskStatus::Downloading, "Downloading 0/1").unwrap();
    db.save_task_state(&task).await.unwrap();

    assert_eq!(db.recover_interrupted_tasks(&[]).await.unwrap(), 1);
    let task = db.get_task(&running).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.message, crate::task_db::INTERRUPTED_MESSAGE);
    let idle = db.get_task(&idle).await.unwrap().unwrap();
    assert_eq!(idle.status, TaskStatus::Pending);
}

#[tokio::test]
async fn recover_interrupted_skips_live_tasks() {
    let db = open_memory().await.unwrap();
    let mut ids = Vec::new();
    for url in ["https://example.com/a", "https://example.com/b"] {
        let id = db.create_task(url, None).await.unwrap();
        let mut task = db.get_task(&id).await.unwrap().unwrap();
        task.transition(TaskStatus::Preparing, "Fetching").unwrap();
        db.save_task_state(&task).await.unwrap();
        ids.push(id);
    }

    let live = vec![ids[0].clone()];
    assert_eq!(db.recover_interrupted_tasks(&live).await.unwrap(), 1);
    let kept = db.get_task(&ids[0]).await.unwrap().unwrap();
    assert_eq!(kept.status, TaskStatus::Preparing);
    let failed = db.get_task(&ids[1]).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Error);
}
