mod common;

use common::*;
use serde_json::{json, Value};
use talentlink_messaging::models::conversation::ParticipantRole;

async fn setup_thread_with_message(
    pool: &sqlx::PgPool,
    base: &str,
) -> (String, String, String, String) {
    let talent = insert_user(pool, "dave").await;
    let company = insert_user(pool, "Umbrella").await;
    let t_talent = token_for(talent, ParticipantRole::Talent);
    let t_company = token_for(company, ParticipantRole::Company);
    let http = reqwest::Client::new();

    let conv: Value = http
        .post(format!("{base}/api/v1/conversations"))
        .bearer_auth(&t_talent)
        .json(&json!({ "counterpart_id": company }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conv_id = conv["id"].as_str().unwrap().to_string();

    let message: Value = http
        .post(format!("{base}/api/v1/conversations/{conv_id}/messages"))
        .bearer_auth(&t_talent)
        .json(&json!({ "content": "original" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let message_id = message["id"].as_str().unwrap().to_string();

    (conv_id, message_id, t_talent, t_company)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn only_the_sender_may_edit_and_the_row_is_untouched_on_denial() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let base = start_app(pool.clone(), redis).await;
    let (_conv_id, message_id, t_talent, t_company) =
        setup_thread_with_message(&pool, &base).await;
    let http = reqwest::Client::new();

    // The recipient may not edit.
    let resp = http
        .put(format!("{base}/api/v1/messages/{message_id}"))
        .bearer_auth(&t_company)
        .json(&json!({ "content": "tampered" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let (content, edited_at): (Option<String>, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as("SELECT content, edited_at FROM messages WHERE id = $1::uuid")
            .bind(&message_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(content.as_deref(), Some("original"));
    assert!(edited_at.is_none(), "denied edit must not touch the row");

    // The sender may.
    let updated: Value = http
        .put(format!("{base}/api/v1/messages/{message_id}"))
        .bearer_auth(&t_talent)
        .json(&json!({ "content": "corrected" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["content"], "corrected");
    assert!(!updated["edited_at"].is_null());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn only_the_sender_may_delete() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let base = start_app(pool.clone(), redis).await;
    let (_conv_id, message_id, t_talent, t_company) =
        setup_thread_with_message(&pool, &base).await;
    let http = reqwest::Client::new();

    let resp = http
        .delete(format!("{base}/api/v1/messages/{message_id}"))
        .bearer_auth(&t_company)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE id = $1::uuid")
        .bind(&message_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let resp = http
        .delete(format!("{base}/api/v1/messages/{message_id}"))
        .bearer_auth(&t_talent)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE id = $1::uuid")
        .bind(&message_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn delivery_receipt_is_recipient_only_and_idempotent() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let base = start_app(pool.clone(), redis).await;
    let (_conv_id, message_id, t_talent, t_company) =
        setup_thread_with_message(&pool, &base).await;
    let http = reqwest::Client::new();

    // The sender cannot acknowledge delivery of their own message.
    let resp = http
        .post(format!("{base}/api/v1/messages/{message_id}/delivered"))
        .bearer_auth(&t_talent)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    for _ in 0..2 {
        let resp = http
            .post(format!("{base}/api/v1/messages/{message_id}/delivered"))
            .bearer_auth(&t_company)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);
    }

    let delivered_at: Option<chrono::DateTime<chrono::Utc>> =
        sqlx::query_scalar("SELECT delivered_at FROM messages WHERE id = $1::uuid")
            .bind(&message_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(delivered_at.is_some());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn attachment_upload_then_send_and_access_url() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let talent = insert_user(&pool, "erin").await;
    let company = insert_user(&pool, "Hooli").await;
    let base = start_app(pool.clone(), redis).await;
    let http = reqwest::Client::new();
    let t_talent = token_for(talent, ParticipantRole::Talent);
    let t_company = token_for(company, ParticipantRole::Company);

    let conv: Value = http
        .post(format!("{base}/api/v1/conversations"))
        .bearer_auth(&t_talent)
        .json(&json!({ "counterpart_id": company }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conv_id = conv["id"].as_str().unwrap().to_string();

    let resp = http
        .post(format!("{base}/api/v1/attachments?file_name=cv.pdf"))
        .bearer_auth(&t_talent)
        .header("content-type", "application/pdf")
        .body(&b"%PDF-1.7 fake"[..])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let attachment: Value = resp.json().await.unwrap();
    assert_eq!(attachment["mime_class"], "file");
    let key = attachment["key"].as_str().unwrap().to_string();

    // Someone else cannot send with a key outside their namespace.
    let resp = http
        .post(format!("{base}/api/v1/conversations/{conv_id}/messages"))
        .bearer_auth(&t_company)
        .json(&json!({ "attachment": attachment }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = http
        .post(format!("{base}/api/v1/conversations/{conv_id}/messages"))
        .bearer_auth(&t_talent)
        .json(&json!({ "attachment": attachment }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let message: Value = resp.json().await.unwrap();
    assert_eq!(message["attachment"]["key"].as_str().unwrap(), key);
    assert!(message["content"].is_null());

    // Both parties of the owning thread can mint access URLs.
    for token in [&t_talent, &t_company] {
        let resp = http
            .get(format!("{base}/api/v1/attachments/access-url?key={key}"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert!(body["url"].as_str().unwrap().contains("sig=test"));
    }

    // An outsider cannot.
    let outsider = token_for(uuid::Uuid::new_v4(), ParticipantRole::Talent);
    let resp = http
        .get(format!("{base}/api/v1/attachments/access-url?key={key}"))
        .bearer_auth(&outsider)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Zero-byte uploads are rejected up front.
    let resp = http
        .post(format!("{base}/api/v1/attachments?file_name=empty.png"))
        .bearer_auth(&t_talent)
        .header("content-type", "image/png")
        .body(Vec::new())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
