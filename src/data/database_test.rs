//! Database tests

use super::*;
use crate::error::AppError;
use chrono::Utc;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn test_account(username: &str, email: &str) -> Account {
    Account {
        id: generate_account_id(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: "hash".to_string(),
        private_key_pem: "test_private_key".to_string(),
        created_at: Utc::now(),
    }
}

const ALICE: &str = "https://a.example/u/alice";
const BOB: &str = "https://b.example/u/bob";

#[tokio::test]
async fn test_database_connection() {
    let (db, _temp_dir) = create_test_db().await;
    assert_eq!(db.count_accounts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_account_save_and_find() {
    let (db, _temp_dir) = create_test_db().await;
    let account = test_account("alice", "alice@example.com");
    db.save(&account).await.unwrap();

    let by_id = db.find(&account.id).await.unwrap();
    assert_eq!(by_id.username, "alice");

    let by_email = db.find_by_email("alice@example.com").await.unwrap();
    assert_eq!(by_email.id, account.id);

    let by_username = db.find_by_username("alice").await.unwrap();
    assert_eq!(by_username.email, "alice@example.com");
}

#[tokio::test]
async fn test_missing_account_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;
    assert!(matches!(db.find("nope").await, Err(AppError::NotFound)));
    assert!(matches!(
        db.find_by_username("nobody").await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn test_duplicate_account_is_conflict() {
    let (db, _temp_dir) = create_test_db().await;
    db.save(&test_account("alice", "alice@example.com"))
        .await
        .unwrap();

    let same_username = db.save(&test_account("alice", "other@example.com")).await;
    assert!(matches!(same_username, Err(AppError::Conflict(_))));

    let same_email = db.save(&test_account("alice2", "alice@example.com")).await;
    assert!(matches!(same_email, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_absent_edge_is_unfollowing() {
    let (db, _temp_dir) = create_test_db().await;
    let status = db.find_follow_status(ALICE, BOB).await.unwrap();
    assert_eq!(status, FollowStatus::Unfollowing);
}

#[tokio::test]
async fn test_pending_then_following_keeps_single_edge() {
    let (db, _temp_dir) = create_test_db().await;

    db.request_follow(ALICE, BOB).await.unwrap();
    assert_eq!(
        db.find_follow_status(ALICE, BOB).await.unwrap(),
        FollowStatus::Pending
    );
    let pending = db.get_follow_edge(ALICE, BOB).await.unwrap().unwrap();

    db.follow(ALICE, BOB).await.unwrap();
    assert_eq!(
        db.find_follow_status(ALICE, BOB).await.unwrap(),
        FollowStatus::Following
    );
    let following = db.get_follow_edge(ALICE, BOB).await.unwrap().unwrap();

    // The upsert keeps the original row id and creation time.
    assert_eq!(pending.id, following.id);
    assert_eq!(pending.created_at, following.created_at);
    assert!(following.updated_at >= pending.updated_at);
}

#[tokio::test]
async fn test_request_follow_does_not_downgrade_following() {
    let (db, _temp_dir) = create_test_db().await;
    db.follow(ALICE, BOB).await.unwrap();
    let confirmed = db.get_follow_edge(ALICE, BOB).await.unwrap().unwrap();

    // An Accept that lands before the Pending write must win.
    db.request_follow(ALICE, BOB).await.unwrap();
    assert_eq!(
        db.find_follow_status(ALICE, BOB).await.unwrap(),
        FollowStatus::Following
    );
    let after = db.get_follow_edge(ALICE, BOB).await.unwrap().unwrap();
    assert_eq!(after.status, "following");
    assert_eq!(after.updated_at, confirmed.updated_at);

    // Re-requesting a pending edge keeps it pending.
    db.request_follow(BOB, ALICE).await.unwrap();
    db.request_follow(BOB, ALICE).await.unwrap();
    assert_eq!(
        db.find_follow_status(BOB, ALICE).await.unwrap(),
        FollowStatus::Pending
    );
}

#[tokio::test]
async fn test_follow_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;
    db.follow(ALICE, BOB).await.unwrap();
    db.follow(ALICE, BOB).await.unwrap();

    assert_eq!(db.list_follows(ALICE).await.unwrap(), vec![BOB.to_string()]);
    assert_eq!(
        db.list_followers(BOB).await.unwrap(),
        vec![ALICE.to_string()]
    );
}

#[tokio::test]
async fn test_edges_are_directional() {
    let (db, _temp_dir) = create_test_db().await;
    db.follow(ALICE, BOB).await.unwrap();

    assert_eq!(
        db.find_follow_status(BOB, ALICE).await.unwrap(),
        FollowStatus::Unfollowing
    );
    assert!(db.list_follows(BOB).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lists_exclude_pending() {
    let (db, _temp_dir) = create_test_db().await;
    db.request_follow(ALICE, BOB).await.unwrap();

    assert!(db.list_follows(ALICE).await.unwrap().is_empty());
    assert!(db.list_followers(BOB).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unfollow_removes_edge_and_tolerates_absence() {
    let (db, _temp_dir) = create_test_db().await;
    db.follow(ALICE, BOB).await.unwrap();

    db.unfollow(ALICE, BOB).await.unwrap();
    assert_eq!(
        db.find_follow_status(ALICE, BOB).await.unwrap(),
        FollowStatus::Unfollowing
    );

    db.unfollow(ALICE, BOB).await.unwrap();
}
