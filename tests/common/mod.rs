//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use hyper::{Request, Response};
use tower::ServiceExt;

use kaiten_inbox::auth::{Credentials, SessionStore};
use kaiten_inbox::files::FileStore;
use kaiten_inbox::gateway::MemoryGateway;
use kaiten_inbox::models::{CardId, ColumnId, IncomingNo, QueueItem};
use kaiten_inbox::workflow::{InboxWorkflow, WorkflowConfig};
use kaiten_inbox::{api, AppState};

pub const QUEUE: ColumnId = 100;
pub const ASSIGNED: ColumnId = 200;
pub const USERNAME: &str = "operator";
pub const PASSWORD: &str = "secret";

pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<MemoryGateway>,
    pub files: tempfile::TempDir,
}

pub fn card(id: CardId, no: IncomingNo) -> QueueItem {
    QueueItem {
        id,
        title: format!("Letter {}", id),
        incoming_no: Some(no),
        column_id: QUEUE,
        assignees: vec![],
    }
}

/// Router over an in-memory board. `with_auth` turns on operator login.
pub async fn setup_app(cards: &[(CardId, IncomingNo)], with_auth: bool) -> TestApp {
    let gateway = Arc::new(MemoryGateway::new());
    for &(id, no) in cards {
        gateway.insert(card(id, no)).await;
    }

    let files = tempfile::tempdir().expect("Failed to create files dir");
    let store = FileStore::new(files.path());
    let credentials = with_auth.then(|| Credentials {
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
    });

    let workflow = InboxWorkflow::new(
        gateway.clone(),
        store.clone(),
        WorkflowConfig {
            queue_column: QUEUE,
            assigned_column: ASSIGNED,
        },
    );
    let state = AppState::new(
        workflow,
        SessionStore::new(credentials, chrono::Duration::hours(8)),
        store,
    );

    TestApp {
        router: api::router(state),
        gateway,
        files,
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(
    app: &TestApp,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Log in with the fixture credentials and return the token
pub async fn login(app: &TestApp) -> String {
    let response = post_json(
        app,
        "/api/login",
        serde_json::json!({"username": USERNAME, "password": PASSWORD}),
        None,
    )
    .await;
    assert_eq!(response.status(), hyper::StatusCode::OK);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}
