use crate::fixtures::test_app::TestApp;
use serde_json::json;

#[tokio::test]
async fn fallback_capabilities_are_fixed_per_process() {
    let app = TestApp::spawn().await;
    let room_a = app.create_room("alice").await;
    let room_b = app.create_room("bob").await;

    let mut c1 = app.ws().await;
    c1.join(&room_a, "Alice").await;

    let caps_a = c1
        .request("getRouterRtpCapabilities", json!({ "roomId": room_a }))
        .await;
    let caps_b = c1
        .request("getRouterRtpCapabilities", json!({ "roomId": room_b }))
        .await;
    assert_eq!(caps_a, caps_b);
    assert_eq!(caps_a["codecs"][0]["mimeType"], "audio/opus");
    assert_eq!(caps_a["codecs"][0]["clockRate"], 48000);
    assert_eq!(caps_a["codecs"][0]["channels"], 2);
}

#[tokio::test]
async fn unknown_rooms_fail_only_the_caller() {
    let app = TestApp::spawn().await;
    let mut c1 = app.ws().await;

    let result = c1
        .request("getRouterRtpCapabilities", json!({ "roomId": "nope" }))
        .await;
    assert_eq!(result["error"], "Room not found");

    let result = c1
        .request("createWebRtcTransport", json!({ "roomId": "nope" }))
        .await;
    assert_eq!(result["error"], "Room not found");
}

#[tokio::test]
async fn synthetic_transport_flow_acknowledges_the_full_sequence() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    let transport = c1
        .request("createWebRtcTransport", json!({ "roomId": room }))
        .await;
    let transport_id = transport["id"].as_str().unwrap().to_string();
    assert!(transport["iceParameters"]["usernameFragment"].is_string());
    assert_eq!(transport["iceCandidates"].as_array().unwrap().len(), 0);
    assert_eq!(transport["dtlsParameters"]["role"], "auto");

    let connected = c1
        .request(
            "connectTransport",
            json!({ "roomId": room, "transportId": transport_id, "dtlsParameters": {} }),
        )
        .await;
    assert_eq!(connected["connected"], true);

    let produced = c1
        .request(
            "produce",
            json!({ "roomId": room, "transportId": transport_id, "kind": "audio", "rtpParameters": {} }),
        )
        .await;
    let producer_id = produced["id"].as_str().unwrap().to_string();

    // No media is routed, but the rest of the room still learns about the
    // producer.
    let new_producer = c2.expect_event("new-producer").await;
    assert_eq!(new_producer["producerId"], producer_id.as_str());
    assert_eq!(new_producer["userId"], c1.conn_id.as_str());
    assert_eq!(new_producer["kind"], "audio");

    let producers = c2
        .request(
            "getProducers",
            json!({ "userId": c2.conn_id, "roomId": room }),
        )
        .await;
    let producers = producers.as_array().unwrap();
    assert_eq!(producers.len(), 1);
    assert_eq!(producers[0]["producerId"], producer_id.as_str());

    let resumed = c2
        .request(
            "resumeConsumer",
            json!({ "roomId": room, "consumerId": "whatever" }),
        )
        .await;
    assert_eq!(resumed["resumed"], true);
}

#[tokio::test]
async fn leaving_the_room_retires_producers_even_without_a_call() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    // Alice produces without ever sending start-call.
    let transport = c1
        .request("createWebRtcTransport", json!({ "roomId": room }))
        .await;
    let transport_id = transport["id"].as_str().unwrap().to_string();
    c1.request(
        "produce",
        json!({ "roomId": room, "transportId": transport_id, "kind": "audio", "rtpParameters": {} }),
    )
    .await;
    c2.expect_event("new-producer").await;

    c1.send("leave-room", json!({ "roomId": room })).await;
    c2.expect_event("user-left").await;

    // Her producer must not be advertised to anyone still in the room.
    let producers = c2
        .request(
            "getProducers",
            json!({ "userId": c2.conn_id, "roomId": room }),
        )
        .await;
    assert_eq!(producers.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn produce_on_a_bogus_transport_fails_only_the_caller() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;

    let result = c1
        .request(
            "produce",
            json!({ "roomId": room, "transportId": "bogus", "kind": "audio", "rtpParameters": {} }),
        )
        .await;
    assert_eq!(result["error"], "transport not found");
}

#[tokio::test]
async fn offer_answer_ice_are_relayed_verbatim_with_the_origin_added() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    c1.send(
        "offer",
        json!({ "to": c2.conn_id, "offer": { "sdp": "v=0...", "type": "offer" }, "roomId": room }),
    )
    .await;
    let offer = c2.expect_event("offer").await;
    assert_eq!(offer["from"], c1.conn_id.as_str());
    assert_eq!(offer["offer"]["sdp"], "v=0...");

    c2.send(
        "answer",
        json!({ "to": c1.conn_id, "answer": { "sdp": "v=0...answer", "type": "answer" }, "roomId": room }),
    )
    .await;
    let answer = c1.expect_event("answer").await;
    assert_eq!(answer["from"], c2.conn_id.as_str());
    assert_eq!(answer["answer"]["type"], "answer");

    c1.send(
        "ice-candidate",
        json!({ "to": c2.conn_id, "candidate": { "candidate": "candidate:1 1 UDP ..." }, "roomId": room }),
    )
    .await;
    let candidate = c2.expect_event("ice-candidate").await;
    assert_eq!(candidate["from"], c1.conn_id.as_str());
    assert!(
        candidate["candidate"]["candidate"]
            .as_str()
            .unwrap()
            .starts_with("candidate:")
    );
}
