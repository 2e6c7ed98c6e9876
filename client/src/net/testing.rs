//! Scripted transport shared by the client's unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::transport::{ApiRequest, HttpTransport, RawResponse, TransportError};

pub(crate) enum Reply {
    Json(u16, Value),
    Status(u16),
    Fail(TransportError),
    Delayed(Duration, u16, Value),
    Hang,
}

/// Answers by path from per-path queues. Unscripted paths get a 404.
#[derive(Default)]
pub(crate) struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn on(&self, path: &str, reply: Reply) {
        self.scripts.lock().unwrap().entry(path.to_owned()).or_default().push_back(reply);
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self.scripts.lock().unwrap().get_mut(&path).and_then(VecDeque::pop_front);
        match reply {
            None => Ok(RawResponse { status: 404, body: None }),
            Some(Reply::Json(status, body)) => Ok(RawResponse { status, body: Some(body) }),
            Some(Reply::Status(status)) => Ok(RawResponse { status, body: None }),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::Delayed(delay, status, body)) => {
                tokio::time::sleep(delay).await;
                Ok(RawResponse { status, body: Some(body) })
            }
            Some(Reply::Hang) => std::future::pending().await,
        }
    }
}
