use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const TOP_SECTION_PAGE: &str = r#"<!doctype html>
<html><head><title>Wine</title></head><body>
<script type="application/json" data-component-name="WinePageTopSection">
{"pageInformation":{
  "vintage":{
    "year":2015,
    "wine":{"name":"Margaux","region":{"name":"Bordeaux"},"winery":{"name":"Château Margaux"},"style":{"wine_type_id":1}},
    "grapes":[{"name":"Cabernet Sauvignon"},{"name":"Merlot"}],
    "image":{"variations":{"bottle_medium":"//images.example/bottle.png"}}
  },
  "price":{"amount":42.5},
  "wine":{"foods":[{"name":"Boeuf"}]},
  "tastes":{"structure":{"acidity":3.4,"tannin":4.1}}
}}
</script>
</body></html>"#;

pub const CHALLENGE_PAGE: &str =
    r#"<html><head><script src="https://token.awswaf.com/challenge.js"></script></head></html>"#;

/// One scripted reply. The stub walks the script in order and repeats the
/// last entry once it runs out.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

#[allow(dead_code)]
impl Reply {
    pub fn page(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_owned(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: format!("status {status}"),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
}

pub struct WinePageStub {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl WinePageStub {
    pub fn spawn(script: Vec<Reply>) -> Self {
        assert!(!script.is_empty(), "stub needs at least one reply");
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start wine page stub");
        let base_url = format!("http://{}", server.server_addr());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_server = Arc::clone(&seen);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut served = 0usize;
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_owned())
                };
                let seen_request = SeenRequest {
                    path: request.url().to_owned(),
                    user_agent: header("User-Agent"),
                    accept_language: header("Accept-Language"),
                };
                seen_by_server.lock().expect("lock seen").push(seen_request);

                let reply = script[served.min(script.len() - 1)].clone();
                served += 1;
                if !reply.delay.is_zero() {
                    thread::sleep(reply.delay);
                }

                let content_type =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(reply.body)
                    .with_status_code(reply.status)
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            seen,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("lock seen").clone()
    }
}

impl Drop for WinePageStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
