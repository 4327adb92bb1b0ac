use crate::fixtures::test_app::TestApp;
use serde_json::json;

#[tokio::test]
async fn messages_echo_to_the_whole_room_with_server_ids() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    c1.send(
        "send-message",
        json!({ "roomId": room, "message": "hi", "username": "Alice" }),
    )
    .await;

    for client in [&mut c1, &mut c2] {
        let msg = loop {
            let msg = client.expect_event("chat-message").await;
            // Skip membership system messages.
            if msg["type"] == "text" {
                break msg;
            }
        };
        assert_eq!(msg["sender"], "Alice");
        assert_eq!(msg["message"], "hi");
        assert!(msg["id"].as_str().unwrap().len() > 0);
        assert!(msg["timestamp"].as_str().unwrap().len() > 0);
    }
}

#[tokio::test]
async fn empty_messages_are_rejected_to_the_sender_only() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;

    c1.send(
        "send-message",
        json!({ "roomId": room, "message": "   ", "username": "Alice" }),
    )
    .await;
    let err = c1.expect_event("invalid-request").await;
    assert_eq!(err["op"], "send-message");
}

#[tokio::test]
async fn replies_carry_the_target_message_id() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;

    c1.send(
        "send-message",
        json!({ "roomId": room, "message": "first", "username": "Alice" }),
    )
    .await;
    let original = c1.expect_event("chat-message").await;
    let original_id = original["id"].as_str().unwrap().to_string();

    c1.send(
        "send-message",
        json!({ "roomId": room, "message": "reply", "username": "Alice", "replyTo": original_id }),
    )
    .await;
    let reply = c1.expect_event("chat-message").await;
    assert_eq!(reply["replyTo"], original_id.as_str());
}

#[tokio::test]
async fn room_messages_returns_recent_history() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;
    for i in 0..3 {
        c1.send(
            "send-message",
            json!({ "roomId": room, "message": format!("m{i}"), "username": "Alice" }),
        )
        .await;
        c1.expect_event("chat-message").await;
    }

    c1.send("get-room-messages", json!({ "roomId": room })).await;
    let history = c1.expect_event("room-messages").await;
    let texts: Vec<&str> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["type"] == "text")
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["m0", "m1", "m2"]);
}

#[tokio::test]
async fn concurrent_senders_are_observed_in_history_order() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    let mut c3 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;
    c3.join(&room, "Carol").await;

    // Two senders racing; their fan-outs must not interleave out of the
    // order the room's history recorded.
    tokio::join!(
        async {
            for i in 0..20 {
                c1.send(
                    "send-message",
                    json!({ "roomId": room, "message": format!("a{i}"), "username": "Alice" }),
                )
                .await;
            }
        },
        async {
            for i in 0..20 {
                c2.send(
                    "send-message",
                    json!({ "roomId": room, "message": format!("b{i}"), "username": "Bob" }),
                )
                .await;
            }
        },
    );

    let mut observed = Vec::new();
    for _ in 0..40 {
        let msg = c3.expect_event("chat-message").await;
        observed.push(msg["id"].as_str().unwrap().to_string());
    }

    c3.send("get-room-messages", json!({ "roomId": room })).await;
    let history = c3.expect_event("room-messages").await;
    let recorded: Vec<String> = history["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["type"] == "text")
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(observed, recorded);
}

#[tokio::test]
async fn typing_indicator_reaches_everyone_else() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    c1.send(
        "typing",
        json!({ "roomId": room, "username": "Alice", "isTyping": true }),
    )
    .await;
    let typing = c2.expect_event("user-typing").await;
    assert_eq!(typing["username"], "Alice");
    assert_eq!(typing["isTyping"], true);
    assert_eq!(typing["userId"], c1.conn_id.as_str());

    c1.send(
        "typing",
        json!({ "roomId": room, "username": "Alice", "isTyping": false }),
    )
    .await;
    let typing = c2.expect_event("user-typing").await;
    assert_eq!(typing["isTyping"], false);
}
