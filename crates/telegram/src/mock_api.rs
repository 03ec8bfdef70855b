//! Minimal Bot API stand-in for tests: records every call and answers with
//! canned success payloads.

use std::sync::{Arc, Mutex};

use {
    axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
    serde_json::{Value, json},
    teloxide::Bot,
    tokio::{sync::oneshot, task::JoinHandle},
};

pub type Captured = Arc<Mutex<Vec<(String, Value)>>>;

pub struct MockTelegramApi {
    pub bot: Bot,
    pub captured: Captured,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl MockTelegramApi {
    pub async fn start() -> Self {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route("/{*path}", post(api_handler))
            .with_state(Arc::clone(&captured));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        Self {
            bot: Bot::new("test-token").set_api_url(api_url),
            captured,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        }
    }

    /// Recorded `(method, body)` pairs.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.captured.lock().expect("captured lock").clone()
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.await.expect("server join");
        }
    }
}

async fn api_handler(State(captured): State<Captured>, uri: Uri, body: Bytes) -> Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let chat_id = body["chat_id"].as_i64().unwrap_or(42);
    let text = body["text"].as_str().unwrap_or_default().to_string();
    let mut captured = captured.lock().expect("captured lock");
    let message_id = captured.len() + 100;
    captured.push((method.clone(), body));

    if method == "SendMessage" {
        Json(json!({
            "ok": true,
            "result": {
                "message_id": message_id,
                "date": 0,
                "chat": { "id": chat_id, "type": "private", "first_name": "Alice" },
                "text": text
            }
        }))
    } else {
        Json(json!({ "ok": true, "result": true }))
    }
}
