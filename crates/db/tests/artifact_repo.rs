use hdlbridge_core::types::DbId;
use hdlbridge_db::models::artifact::CreateArtifact;
use hdlbridge_db::models::user::CreateUser;
use hdlbridge_db::repositories::{ArtifactRepo, UserRepo};
use sqlx::PgPool;

async fn create_user(pool: &PgPool, email: &str) -> DbId {
    UserRepo::create(
        pool,
        &CreateUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            security_question: "First chip?".to_string(),
            answer_hash: "hash".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn upload(user_id: DbId, filename: &str, url: &str) -> CreateArtifact {
    CreateArtifact {
        user_id,
        filename: filename.to_string(),
        storage_key: format!("uploads/{user_id}/{filename}"),
        url: url.to_string(),
        content_type: Some("text/plain".to_string()),
        size_bytes: 12,
    }
}

/// A re-upload makes that user's copy the one jobs resolve to.
#[sqlx::test(migrations = "./migrations")]
async fn test_reupload_becomes_most_recent(pool: PgPool) {
    let alice = create_user(&pool, "alice@example.com").await;
    let bob = create_user(&pool, "bob@example.com").await;

    let first = ArtifactRepo::upsert(&pool, &upload(alice, "adder.v", "https://a/1"))
        .await
        .unwrap();
    ArtifactRepo::upsert(&pool, &upload(bob, "adder.v", "https://b/1"))
        .await
        .unwrap();

    let found = ArtifactRepo::find_by_filename(&pool, "adder.v")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.user_id, bob);

    let again = ArtifactRepo::upsert(&pool, &upload(alice, "adder.v", "https://a/2"))
        .await
        .unwrap();
    assert_eq!(again.id, first.id);
    assert!(again.uploaded_at > first.uploaded_at);
    assert_eq!(again.created_at, first.created_at);

    let found = ArtifactRepo::find_by_filename(&pool, "adder.v")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.user_id, alice);
    assert_eq!(found.url, "https://a/2");
}

/// Re-uploading clears the status left by an earlier job.
#[sqlx::test(migrations = "./migrations")]
async fn test_reupload_clears_status(pool: PgPool) {
    let alice = create_user(&pool, "alice@example.com").await;
    ArtifactRepo::upsert(&pool, &upload(alice, "alu.v", "https://a/1"))
        .await
        .unwrap();

    let touched = ArtifactRepo::update_status(&pool, "alu.v", "done")
        .await
        .unwrap();
    assert_eq!(touched, 1);

    let again = ArtifactRepo::upsert(&pool, &upload(alice, "alu.v", "https://a/2"))
        .await
        .unwrap();
    assert_eq!(again.status, None);
    assert_eq!(again.status_updated_at, None);
}
