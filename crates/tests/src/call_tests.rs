use crate::fixtures::test_app::TestApp;
use serde_json::json;

#[tokio::test]
async fn two_participants_see_the_full_call_roster() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    c1.send("start-call", json!({ "roomId": room })).await;
    let started = c1.expect_event("call-started").await;
    assert_eq!(started["participants"].as_array().unwrap().len(), 1);
    assert_eq!(started["fallbackMode"], true);
    c2.expect_event("call-started").await;
    let joined = c2.expect_event("user-joined-call").await;
    assert_eq!(joined["username"], "Alice");

    c2.send("start-call", json!({ "roomId": room })).await;
    let joined = c1.expect_event("user-joined-call").await;
    assert_eq!(joined["username"], "Bob");
    let started = c1.expect_event("call-started").await;
    assert_eq!(started["participants"].as_array().unwrap().len(), 2);
    let started = c2.expect_event("call-started").await;
    assert_eq!(started["participants"].as_array().unwrap().len(), 2);

    let status = app.get_json(&format!("/api/rooms/{room}/call")).await;
    assert_eq!(status["isActive"], true);
    assert_eq!(status["participantCount"], 2);
}

#[tokio::test]
async fn start_call_twice_is_a_noop() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;

    c1.send("start-call", json!({ "roomId": room })).await;
    c1.expect_event("call-started").await;
    let call_msg = c1.expect_event("chat-message").await;
    assert_eq!(call_msg["type"], "call-join");

    c1.send("start-call", json!({ "roomId": room })).await;

    let status = app.get_json(&format!("/api/rooms/{room}/call")).await;
    assert_eq!(status["participantCount"], 1);

    // A later joiner sees one participant and exactly one call-join message.
    let mut c2 = app.ws().await;
    let snapshot = c2.join(&room, "Bob").await;
    let call_joins = snapshot["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["type"] == "call-join")
        .count();
    assert_eq!(call_joins, 1);
    let in_call: Vec<bool> = snapshot["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["inCall"].as_bool().unwrap())
        .collect();
    assert_eq!(in_call, vec![true, false]);
}

#[tokio::test]
async fn start_call_requires_room_membership() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;
    let mut c1 = app.ws().await;

    c1.send("start-call", json!({ "roomId": room })).await;
    let err = c1.expect_event("invalid-request").await;
    assert_eq!(err["op"], "start-call");
}

#[tokio::test]
async fn mic_and_speaking_state_reach_the_other_participants() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;
    c1.send("start-call", json!({ "roomId": room })).await;
    c2.send("start-call", json!({ "roomId": room })).await;

    c1.send(
        "toggle-mic",
        json!({ "userId": c1.conn_id, "micEnabled": false, "roomId": room }),
    )
    .await;
    let toggled = c2.expect_event("toggle-mic").await;
    assert_eq!(toggled["userId"], c1.conn_id.as_str());
    assert_eq!(toggled["micEnabled"], false);

    c1.send(
        "speaking-status",
        json!({ "userId": c1.conn_id, "isSpeaking": true, "roomId": room }),
    )
    .await;
    let speaking = c2.expect_event("speaking-status").await;
    assert_eq!(speaking["userId"], c1.conn_id.as_str());
    assert_eq!(speaking["isSpeaking"], true);
}

#[tokio::test]
async fn leave_call_is_broadcast_to_the_leaver_too() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;
    c1.send("start-call", json!({ "roomId": room })).await;
    c2.send("start-call", json!({ "roomId": room })).await;

    c1.send("leave-call", json!({ "roomId": room })).await;
    let left = c1.expect_event("user-left-call").await;
    assert_eq!(left["userId"], c1.conn_id.as_str());
    let left = c2.expect_event("user-left-call").await;
    assert_eq!(left["username"], "Alice");

    let status = app.get_json(&format!("/api/rooms/{room}/call")).await;
    assert_eq!(status["participantCount"], 1);
}

#[tokio::test]
async fn disconnect_while_in_call_tears_the_participant_down() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;
    c1.send("start-call", json!({ "roomId": room })).await;
    c1.expect_event("call-started").await;

    let c1_id = c1.conn_id.clone();
    c1.drop_connection().await;

    let left_call = c2.expect_event("user-left-call").await;
    assert_eq!(left_call["userId"], c1_id.as_str());
    let left = c2.expect_event("user-left").await;
    assert_eq!(left["userId"], c1_id.as_str());

    let status = app.get_json(&format!("/api/rooms/{room}/call")).await;
    assert_eq!(status["isActive"], false);
    assert_eq!(status["participantCount"], 0);
}
