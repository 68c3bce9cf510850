use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// What the stub `/v1/responses` endpoint sends back.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum StubAnswer {
    Text(String),
    Error { status: u16, message: String },
}

pub struct OpenAiStub {
    pub base_url: String,
    bodies: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl OpenAiStub {
    pub fn spawn(answer: StubAnswer) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let bodies = Arc::new(Mutex::new(Vec::new()));
        let bodies_by_server = Arc::clone(&bodies);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/responses" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let authorized = request
                    .headers()
                    .iter()
                    .any(|h| h.field.equiv("Authorization") && h.value.as_str().starts_with("Bearer "));
                if !authorized {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing bearer token").with_status_code(401),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };
                bodies_by_server.lock().expect("lock bodies").push(parsed.clone());

                let (status, response_body) = match &answer {
                    StubAnswer::Text(text) => (
                        200,
                        serde_json::json!({
                            "id": "resp_stub",
                            "object": "response",
                            "model": parsed.get("model").cloned().unwrap_or(Value::String("stub-model".to_owned())),
                            "output": [
                                {
                                    "type": "message",
                                    "role": "assistant",
                                    "content": [
                                        { "type": "output_text", "text": text }
                                    ]
                                }
                            ],
                            "output_text": text
                        }),
                    ),
                    StubAnswer::Error { status, message } => (
                        *status,
                        serde_json::json!({ "error": { "message": message, "type": "stub_error" } }),
                    ),
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            bodies,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Request bodies received so far.
    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().expect("lock bodies").clone()
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
