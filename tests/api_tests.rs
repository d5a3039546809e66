//! HTTP-level tests through the full router

mod common;

use acc_server_manager::server::{AppState, ServerBuilder};
use axum::http::StatusCode;
use axum_test::TestServer;
use common::{
    StubHost, configuration_payload, event_payload, settings_payload, test_config,
};
use serde_json::{Value, json};
use tempfile::TempDir;

struct Harness {
    server: TestServer,
    #[allow(dead_code)]
    state: AppState,
    _dir: TempDir,
}

async fn harness(host: &StubHost) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let builder = ServerBuilder::new(test_config(dir.path())).with_process_host(host.clone());
    let (router, state) = builder.build().await.unwrap();
    let server = TestServer::new(router);
    Harness {
        server,
        state,
        _dir: dir,
    }
}

async fn login(server: &TestServer, mail: &str, password: &str) -> String {
    let response = server
        .post("/auth/token")
        .form(&[("username", mail), ("password", password)])
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["access_token"].as_str().unwrap().to_string()
}

async fn admin_token(server: &TestServer) -> String {
    login(server, "admin@example.com", "admin").await
}

/// Create configuration, settings and event through the API
async fn seed_blobs(server: &TestServer, token: &str) -> (i64, i64, i64) {
    let mut ids = Vec::new();
    for (path, payload) in [
        ("/configuration", configuration_payload("net")),
        ("/settings", settings_payload("League")),
        ("/event", event_payload("spa")),
    ] {
        let response = server
            .post(path)
            .authorization_bearer(token)
            .json(&payload)
            .await;
        response.assert_status(StatusCode::CREATED);
        ids.push(response.json::<Value>()["id"].as_i64().unwrap());
    }
    (ids[0], ids[1], ids[2])
}

// =============================================================================
// Health and auth
// =============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let h = harness(&StubHost::with_pid(1)).await;
        let response = h.server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "ok");
    }

    #[tokio::test]
    async fn test_token_for_bootstrap_admin() {
        let h = harness(&StubHost::with_pid(1)).await;
        let response = h
            .server
            .post("/auth/token")
            .form(&[("username", "admin@example.com"), ("password", "admin")])
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["scope"], "admin");
        assert!(body["access_token"].as_str().unwrap().contains('.'));
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let h = harness(&StubHost::with_pid(1)).await;
        let response = h
            .server
            .post("/auth/token")
            .form(&[("username", "admin@example.com"), ("password", "nope")])
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_or_bad_token_is_unauthorized() {
        let h = harness(&StubHost::with_pid(1)).await;

        h.server
            .get("/event/1")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        h.server
            .get("/event/1")
            .authorization_bearer("not-a-jwt")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_check_reissues() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;

        let response = h
            .server
            .post("/auth/token-check")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "authenticated");
        assert!(body["access_token"].is_string());
    }

    #[tokio::test]
    async fn test_scope_is_enforced() {
        let h = harness(&StubHost::with_pid(1)).await;
        let admin = admin_token(&h.server).await;

        let created = h
            .server
            .post("/user")
            .authorization_bearer(&admin)
            .json(&json!({
                "mail": "organizer@league.net",
                "password": "pw",
                "password_confirm": "pw",
                "scopes": "event",
                "is_enabled": true
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: Value = created.json();
        assert!(body.get("password_hash").is_none());

        let token = login(&h.server, "organizer@league.net", "pw").await;
        h.server
            .post("/event")
            .authorization_bearer(&token)
            .json(&event_payload("monza"))
            .await
            .assert_status(StatusCode::CREATED);
        h.server
            .post("/configuration/_filter")
            .authorization_bearer(&token)
            .json(&json!({}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_log_in() {
        let h = harness(&StubHost::with_pid(1)).await;
        let admin = admin_token(&h.server).await;

        h.server
            .post("/user")
            .authorization_bearer(&admin)
            .json(&json!({
                "mail": "retired@league.net",
                "password": "pw",
                "password_confirm": "pw",
                "is_enabled": false
            }))
            .await
            .assert_status(StatusCode::CREATED);

        h.server
            .post("/auth/token")
            .form(&[("username", "retired@league.net"), ("password", "pw")])
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}

// =============================================================================
// CRUD and filter
// =============================================================================

mod crud_tests {
    use super::*;

    #[tokio::test]
    async fn test_event_crud_cycle() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;

        let created = h
            .server
            .post("/event")
            .authorization_bearer(&token)
            .json(&event_payload("monza"))
            .await;
        created.assert_status(StatusCode::CREATED);
        let event: Value = created.json();
        let id = event["id"].as_i64().unwrap();
        assert_eq!(event["sessions"].as_array().unwrap().len(), 2);

        let patched = h
            .server
            .patch(&format!("/event/{}", id))
            .authorization_bearer(&token)
            .json(&json!({ "ambientTemp": 31 }))
            .await;
        patched.assert_status_ok();
        let body: Value = patched.json();
        assert_eq!(body["ambientTemp"], 31);
        assert_eq!(body["track"], "monza");
        assert_eq!(body["created"], event["created"]);

        h.server
            .delete(&format!("/event/{}", id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        h.server
            .get(&format!("/event/{}", id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        h.server
            .delete(&format!("/event/{}", id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_unprocessable() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;

        let mut payload = event_payload("monza");
        payload["preRaceWaitingTimeSeconds"] = json!(10);
        let response = h
            .server
            .post("/event")
            .authorization_bearer(&token)
            .json(&payload)
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;

        let response = h
            .server
            .post("/event")
            .authorization_bearer(&token)
            .content_type("application/json")
            .bytes("{ not json".into())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_endpoint() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;
        for track in ["monza", "spa", "misano", "monza"] {
            h.server
                .post("/event")
                .authorization_bearer(&token)
                .json(&event_payload(track))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = h
            .server
            .post("/event/_filter")
            .authorization_bearer(&token)
            .json(&json!({
                "query": [["track", "==", "monza"]],
                "sort": [["id", "desc"]],
                "page": 0,
                "items_per_page": 1
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["id"], 4);
    }

    #[tokio::test]
    async fn test_filter_on_unknown_field_is_rejected() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;

        let response = h
            .server
            .post("/user/_filter")
            .authorization_bearer(&token)
            .json(&json!({ "query": [["password_hash", "eq", "x"]] }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["code"], "INVALID_FIELD");
        assert_eq!(body["details"]["field"], "password_hash");
    }
}

// =============================================================================
// Server config lifecycle over HTTP
// =============================================================================

mod lifecycle_routes {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_over_http() {
        let host = StubHost::with_pid(4242);
        let h = harness(&host).await;
        let token = admin_token(&h.server).await;
        let (configuration_id, settings_id, event_id) = seed_blobs(&h.server, &token).await;

        let created = h
            .server
            .post("/server_config")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "league",
                "configuration_id": configuration_id,
                "settings_id": settings_id,
                "event_id": event_id,
                "is_enabled": true
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let body: Value = created.json();
        let id = body["id"].as_i64().unwrap();
        assert_eq!(body["process_is_running"], false);
        assert_eq!(body["event"]["track"], "spa");

        let started = h
            .server
            .post(&format!("/server_config/{}/_start", id))
            .authorization_bearer(&token)
            .await;
        started.assert_status_ok();
        let body: Value = started.json();
        assert_eq!(body["process_is_running"], true);
        assert_eq!(body["process_id"], 4242);

        let again = h
            .server
            .post(&format!("/server_config/{}/_start", id))
            .authorization_bearer(&token)
            .await;
        again.assert_status(StatusCode::CONFLICT);
        assert_eq!(again.json::<Value>()["code"], "ALREADY_RUNNING");

        h.server
            .delete(&format!("/server_config/{}", id))
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::CONFLICT);

        let stopped = h
            .server
            .post(&format!("/server_config/{}/_stop", id))
            .authorization_bearer(&token)
            .await;
        stopped.assert_status_ok();
        let body: Value = stopped.json();
        assert_eq!(body["process_is_running"], false);
        assert!(body["process_id"].is_null());

        let again = h
            .server
            .post(&format!("/server_config/{}/_stop", id))
            .authorization_bearer(&token)
            .await;
        again.assert_status(StatusCode::CONFLICT);
        assert_eq!(again.json::<Value>()["code"], "NOT_RUNNING");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let host = StubHost::with_pid(1);
        host.fail_spawn(true);
        let h = harness(&host).await;
        let token = admin_token(&h.server).await;
        let (configuration_id, settings_id, event_id) = seed_blobs(&h.server, &token).await;

        h.server
            .post("/server_config")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "league",
                "configuration_id": configuration_id,
                "settings_id": settings_id,
                "event_id": event_id,
                "is_enabled": true
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = h
            .server
            .post("/server_config/1/_start")
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["code"], "SPAWN_FAILED");

        let current: Value = h
            .server
            .get("/server_config/1")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(current["process_is_running"], false);
        assert!(current["process_id"].is_null());
    }

    #[tokio::test]
    async fn test_referenced_event_is_locked() {
        let h = harness(&StubHost::with_pid(7)).await;
        let token = admin_token(&h.server).await;
        let (configuration_id, settings_id, event_id) = seed_blobs(&h.server, &token).await;
        h.server
            .post("/server_config")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "league",
                "configuration_id": configuration_id,
                "settings_id": settings_id,
                "event_id": event_id,
                "is_enabled": true
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = h
            .server
            .delete(&format!("/event/{}", event_id))
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["code"], "ENTITY_IN_USE");
        assert_eq!(body["details"]["server_config_id"], 1);

        h.server
            .post("/server_config/1/_start")
            .authorization_bearer(&token)
            .await
            .assert_status_ok();
        let response = h
            .server
            .patch(&format!("/event/{}", event_id))
            .authorization_bearer(&token)
            .json(&json!({ "track": "monza" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["code"], "ENTITY_IN_USE");

        let event: Value = h
            .server
            .get(&format!("/event/{}", event_id))
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(event["track"], "spa");
    }

    #[tokio::test]
    async fn test_dangling_reference_is_bad_request() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;

        let response = h
            .server
            .post("/server_config")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "league",
                "configuration_id": 1,
                "settings_id": 1,
                "event_id": 1,
                "is_enabled": true
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_REFERENCE");
    }

    #[tokio::test]
    async fn test_run_state_is_not_patchable() {
        let h = harness(&StubHost::with_pid(1)).await;
        let token = admin_token(&h.server).await;
        let (configuration_id, settings_id, event_id) = seed_blobs(&h.server, &token).await;
        h.server
            .post("/server_config")
            .authorization_bearer(&token)
            .json(&json!({
                "name": "league",
                "configuration_id": configuration_id,
                "settings_id": settings_id,
                "event_id": event_id,
                "is_enabled": true
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = h
            .server
            .patch("/server_config/1")
            .authorization_bearer(&token)
            .json(&json!({ "process_is_running": true }))
            .await;
        assert!(response.status_code().is_client_error());
    }
}
