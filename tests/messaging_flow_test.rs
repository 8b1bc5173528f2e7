mod common;

use common::*;
use serde_json::{json, Value};
use talentlink_messaging::models::conversation::ParticipantRole;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires docker"]
async fn hello_flow_send_read_recount() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let talent = insert_user(&pool, "alice").await;
    let company = insert_user(&pool, "Acme GmbH").await;
    let base = start_app(pool.clone(), redis).await;
    let http = reqwest::Client::new();

    let t_talent = token_for(talent, ParticipantRole::Talent);
    let t_company = token_for(company, ParticipantRole::Company);

    // Start the thread.
    let resp = http
        .post(format!("{base}/api/v1/conversations"))
        .bearer_auth(&t_talent)
        .json(&json!({ "counterpart_id": company, "subject": "Backend role" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let conv: Value = resp.json().await.unwrap();
    assert_eq!(conv["created"], true);
    assert_eq!(conv["subject"], "Backend role");
    let conv_id = conv["id"].as_str().unwrap().to_string();

    // Starting again resolves the same thread.
    let resp = http
        .post(format!("{base}/api/v1/conversations"))
        .bearer_auth(&t_talent)
        .json(&json!({ "counterpart_id": company }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let again: Value = resp.json().await.unwrap();
    assert_eq!(again["created"], false);
    assert_eq!(again["id"].as_str().unwrap(), conv_id);

    // Talent sends two messages.
    for text in ["Hello!", "Did you see my application?"] {
        let resp = http
            .post(format!("{base}/api/v1/conversations/{conv_id}/messages"))
            .bearer_auth(&t_talent)
            .json(&json!({ "content": text }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    // Company opens the thread: both messages, unread 2, delivery stamped.
    let detail: Value = http
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(&t_company)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "Hello!");
    assert_eq!(detail["unread_count"], 2);
    assert!(messages.iter().all(|m| !m["delivered_at"].is_null()));
    assert!(messages.iter().all(|m| m["read_at"].is_null()));

    // The sender's own view has nothing unread.
    let sender_view: Value = http
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(&t_talent)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sender_view["unread_count"], 0);

    // Mark read, then recount.
    let read: Value = http
        .post(format!("{base}/api/v1/conversations/{conv_id}/read"))
        .bearer_auth(&t_company)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["marked_read"], 2);
    assert_eq!(read["unread_count"], 0);

    // Idempotent: nothing left to flip.
    let read_again: Value = http
        .post(format!("{base}/api/v1/conversations/{conv_id}/read"))
        .bearer_auth(&t_company)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read_again["marked_read"], 0);

    // Read flags are monotonic and stamped.
    let after: Value = http
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(&t_company)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(after["messages"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["is_read"] == true && !m["read_at"].is_null()));

    // Conversation listing shows the denormalized preview.
    let listing: Value = http
        .get(format!("{base}/api/v1/conversations"))
        .bearer_auth(&t_company)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = listing.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["last_message_preview"], "Did you see my application?");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn message_order_is_stable_under_equal_timestamps() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let talent = insert_user(&pool, "bob").await;
    let company = insert_user(&pool, "Initech").await;
    let base = start_app(pool.clone(), redis).await;
    let http = reqwest::Client::new();
    let token = token_for(talent, ParticipantRole::Talent);

    let conv: Value = http
        .post(format!("{base}/api/v1/conversations"))
        .bearer_auth(&token)
        .json(&json!({ "counterpart_id": company }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conv_id = conv["id"].as_str().unwrap().to_string();

    for i in 0..10 {
        http.post(format!("{base}/api/v1/conversations/{conv_id}/messages"))
            .bearer_auth(&token)
            .json(&json!({ "content": format!("m{i}") }))
            .send()
            .await
            .unwrap();
    }

    let detail: Value = http
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 10);
    let seqs: Vec<i64> = messages.iter().map(|m| m["seq"].as_i64().unwrap()).collect();
    let mut sorted = seqs.clone();
    sorted.sort_unstable();
    assert_eq!(seqs, sorted, "history must be sorted by (created_at, seq)");
    for (i, m) in messages.iter().enumerate() {
        assert_eq!(m["content"], format!("m{i}"));
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn unauthenticated_and_outsider_access_is_rejected() {
    let (_pg, pool) = start_db().await;
    let (_rd, redis) = start_redis().await;
    let talent = insert_user(&pool, "carol").await;
    let company = insert_user(&pool, "Globex").await;
    let outsider = Uuid::new_v4();
    let base = start_app(pool.clone(), redis).await;
    let http = reqwest::Client::new();
    let token = token_for(talent, ParticipantRole::Talent);

    let conv: Value = http
        .post(format!("{base}/api/v1/conversations"))
        .bearer_auth(&token)
        .json(&json!({ "counterpart_id": company }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conv_id = conv["id"].as_str().unwrap().to_string();

    // No token at all.
    let resp = http
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Valid token, but not a party of the thread.
    let resp = http
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(token_for(outsider, ParticipantRole::Company))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Unknown conversation.
    let resp = http
        .get(format!("{base}/api/v1/conversations/{}", Uuid::new_v4()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
