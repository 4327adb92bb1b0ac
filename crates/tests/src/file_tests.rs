use crate::fixtures::test_app::TestApp;
use base64::Engine;
use serde_json::json;

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[tokio::test]
async fn uploads_reach_every_member_including_the_uploader() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    let payload = b64(b"body { color: red; }");
    c1.send(
        "upload-files",
        json!({
            "roomId": room,
            "files": [{ "name": "theme.css", "type": "text/css", "content": payload }]
        }),
    )
    .await;

    for client in [&mut c1, &mut c2] {
        let update = client.expect_event("files-updated").await;
        let files = update["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["name"], "theme.css");
        assert_eq!(files[0]["type"], "text/css");
        assert_eq!(files[0]["size"], 20);
        assert_eq!(files[0]["uploadedBy"], "Alice");
        assert_eq!(files[0]["content"], payload.as_str());
        assert!(files[0]["id"].is_string());
    }
}

#[tokio::test]
async fn a_batch_with_one_bad_file_is_rejected_whole() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;

    c1.send(
        "upload-files",
        json!({
            "roomId": room,
            "files": [
                { "name": "ok.txt", "type": "text/plain", "content": b64(b"fine") },
                { "name": "bad.txt", "type": "text/plain", "content": "!!not-base64!!" }
            ]
        }),
    )
    .await;
    let rejected = c1.expect_event("invalid-request").await;
    assert_eq!(rejected["op"], "upload-files");

    // Nothing from the batch was kept.
    c1.send("get-room-files", json!({ "roomId": room })).await;
    let listing = c1.expect_event("files-updated").await;
    assert_eq!(listing["files"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn any_member_may_delete_any_file() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    let mut c2 = app.ws().await;
    c1.join(&room, "Alice").await;
    c2.join(&room, "Bob").await;

    c1.send(
        "upload-files",
        json!({
            "roomId": room,
            "files": [{ "name": "notes.md", "type": "text/markdown", "content": b64(b"# notes") }]
        }),
    )
    .await;
    let update = c1.expect_event("files-updated").await;
    let file_id = update["files"][0]["id"].as_str().unwrap().to_string();
    c2.expect_event("files-updated").await;

    // Bob deletes Alice's file.
    c2.send(
        "delete-file",
        json!({ "roomId": room, "fileId": file_id }),
    )
    .await;
    for client in [&mut c1, &mut c2] {
        let update = client.expect_event("files-updated").await;
        assert_eq!(update["files"].as_array().unwrap().len(), 0);
    }
}

#[tokio::test]
async fn deleting_a_missing_file_is_reported_to_the_caller() {
    let app = TestApp::spawn().await;
    let room = app.create_room("alice").await;

    let mut c1 = app.ws().await;
    c1.join(&room, "Alice").await;

    c1.send(
        "delete-file",
        json!({ "roomId": room, "fileId": "does-not-exist" }),
    )
    .await;
    let rejected = c1.expect_event("invalid-request").await;
    assert_eq!(rejected["op"], "delete-file");
}
