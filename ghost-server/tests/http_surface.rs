// End-to-end exercises of the HTTP surface against a live listener.

use ghost_host::{handlers, Host};
use ghost_server::{router, ServerState};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

async fn serve(host: Arc<Host>) -> String {
    let app = router(ServerState::new(host));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn write_tape(root: &Path, id: &str) {
    let dir = root.join(id);
    fs::create_dir_all(dir.join("public")).unwrap();
    fs::write(dir.join("public/index.html"), "<html></html>").unwrap();
    fs::write(
        dir.join("tape.json"),
        format!(
            r#"{{"id":"{id}","name":"{id}","version":"1.0.0","entry":"public/index.html","api":"echo"}}"#
        ),
    )
    .unwrap();
}

async fn run_program(base: &str, body: Value) -> Value {
    reqwest::Client::new()
        .post(format!("{}/run", base))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn ping_round_trip() {
    let tapes = tempdir().unwrap();
    let sandbox = tempdir().unwrap();
    let host = Host::builder()
        .tape_root(tapes.path())
        .sandbox_root(sandbox.path())
        .build();
    let base = serve(host).await;

    let reply = run_program(&base, json!({"program": {"type": "ping", "input": {}}})).await;
    assert_eq!(reply["ok"], json!(true));
    assert_eq!(reply["result"]["status"], json!("ok"));
    assert_eq!(reply["backend"], json!("local"));
    assert!(reply["elapsed_ms"].is_number());
}

#[tokio::test]
async fn tape_discovery_via_envelope() {
    let tapes = tempdir().unwrap();
    write_tape(tapes.path(), "alpha");
    let host = Host::builder().tape_root(tapes.path()).build();
    host.registry.scan(&handlers::is_handler).unwrap();
    let base = serve(host).await;

    let reply = run_program(&base, json!({"program": {"type": "ghost_list", "input": {}}})).await;
    assert_eq!(reply["ok"], json!(true));
    assert_eq!(reply["result"]["total"], json!(1));
    assert_eq!(reply["result"]["tapes"][0]["id"], json!("alpha"));
}

#[tokio::test]
async fn sandbox_escape_is_rejected() {
    let tapes = tempdir().unwrap();
    let sandbox = tempdir().unwrap();
    let host = Host::builder()
        .tape_root(tapes.path())
        .sandbox_root(sandbox.path())
        .build();
    let base = serve(host).await;

    let reply = run_program(
        &base,
        json!({"program": {"type": "fs_read", "input": {"path": "../../etc/passwd"}}}),
    )
    .await;
    assert_eq!(reply["ok"], json!(false));
    assert_eq!(reply["error"], json!("path-escape"));
}

#[tokio::test]
async fn glyph_arithmetic_via_envelope() {
    let tapes = tempdir().unwrap();
    let host = Host::builder().tape_root(tapes.path()).build();
    let base = serve(host).await;

    let reply = run_program(
        &base,
        json!({"program": {"type": "kuhul_glyph", "input": {
            "program": "[fn-begin main][push 2][push 3][op add][store x][fn-end]"
        }}}),
    )
    .await;
    assert_eq!(reply["ok"], json!(true));
    assert_eq!(reply["result"]["variables"]["x"], json!(5));

    let reply = run_program(
        &base,
        json!({"program": {"type": "kuhul_glyph", "input": {"program": "[load x]"}}}),
    )
    .await;
    assert_eq!(reply["result"]["result"], json!(5));
}

#[tokio::test]
async fn bad_envelope_is_bad_request() {
    let tapes = tempdir().unwrap();
    let host = Host::builder().tape_root(tapes.path()).build();
    let base = serve(host).await;

    let reply = run_program(&base, json!({"not_a_program": 1})).await;
    assert_eq!(reply["ok"], json!(false));
    assert_eq!(reply["error"], json!("bad-request"));

    // Even a non-JSON body gets an envelope back, not a bare rejection.
    let raw: Value = reqwest::Client::new()
        .post(format!("{}/run", base))
        .body("definitely not json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(raw["error"], json!("bad-request"));
}

#[tokio::test]
async fn unknown_handler_is_typed() {
    let tapes = tempdir().unwrap();
    let host = Host::builder().tape_root(tapes.path()).build();
    let base = serve(host).await;

    let reply = run_program(&base, json!({"program": {"type": "warp_drive", "input": {}}})).await;
    assert_eq!(reply["error"], json!("handler-unknown"));
}

#[tokio::test]
async fn fixed_routes_list_get_proxy() {
    let tapes = tempdir().unwrap();
    write_tape(tapes.path(), "alpha");
    let host = Host::builder().tape_root(tapes.path()).build();
    host.registry.scan(&handlers::is_handler).unwrap();
    let base = serve(host).await;
    let client = reqwest::Client::new();

    let listed: Value = client
        .get(format!("{}/tapes", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], json!(1));

    let got: Value = client
        .get(format!("{}/tapes/alpha", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(got["status"], json!("mounted"));

    let missing = client
        .get(format!("{}/tapes/nope", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], json!("tape-not-found"));

    let proxied: Value = client
        .post(format!("{}/proxy/alpha", base))
        .json(&json!({"payload": {"hello": "tape"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(proxied["ok"], json!(true));
    assert_eq!(proxied["result"]["hello"], json!("tape"));
}

#[tokio::test]
async fn mount_unmount_reload_cycle() {
    let tapes = tempdir().unwrap();
    write_tape(tapes.path(), "alpha");
    let host = Host::builder().tape_root(tapes.path()).build();
    host.registry.scan(&handlers::is_handler).unwrap();
    let base = serve(host).await;
    let client = reqwest::Client::new();

    let unmounted: Value = client
        .post(format!("{}/tapes/alpha/unmount", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unmounted["status"], json!("unmounted"));

    let mounted: Value = client
        .post(format!("{}/tapes/alpha/mount", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mounted["status"], json!("mounted"));

    let reloaded: Value = client
        .post(format!("{}/tapes/alpha/reload", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reloaded["status"], json!("mounted"));
    assert_eq!(reloaded["version"], json!("1.0.0"));
}

#[tokio::test]
async fn health_and_metrics() {
    let tapes = tempdir().unwrap();
    let host = Host::builder().tape_root(tapes.path()).build();
    let base = serve(host).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["ok"], json!(true));
    assert!(health["handlers"].as_u64().unwrap() > 30);

    run_program(&base, json!({"program": {"type": "ping", "input": {}}})).await;
    let metrics: Value = client
        .get(format!("{}/metrics", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(metrics["requests"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn store_round_trip_via_envelope() {
    let tapes = tempdir().unwrap();
    let host = Host::builder().tape_root(tapes.path()).build();
    let base = serve(host).await;

    let set = run_program(
        &base,
        json!({"program": {"type": "store", "input": {"action": "set", "key": "k", "value": 7}}}),
    )
    .await;
    assert_eq!(set["ok"], json!(true));

    let get = run_program(
        &base,
        json!({"program": {"type": "store", "input": {"action": "get", "key": "k"}}}),
    )
    .await;
    assert_eq!(get["result"]["value"], json!(7));

    run_program(
        &base,
        json!({"program": {"type": "store", "input": {"action": "delete", "key": "k"}}}),
    )
    .await;
    let missing = run_program(
        &base,
        json!({"program": {"type": "store", "input": {"action": "get", "key": "k"}}}),
    )
    .await;
    assert_eq!(missing["ok"], json!(false));
}

#[tokio::test]
async fn scxq2_round_trip_via_envelope() {
    let tapes = tempdir().unwrap();
    let host = Host::builder().tape_root(tapes.path()).build();
    let base = serve(host).await;

    let payload = "compress me ".repeat(100);
    let encoded = run_program(
        &base,
        json!({"program": {"type": "scxq2_encode", "input": {"data": payload}}}),
    )
    .await;
    assert_eq!(encoded["ok"], json!(true));

    let decoded = run_program(
        &base,
        json!({"program": {"type": "scxq2_decode", "input": {"data": encoded["result"]["encoded"]}}}),
    )
    .await;
    assert_eq!(decoded["result"]["decoded"], json!(payload));
}
