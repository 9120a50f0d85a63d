//! Scripted REST transport (testing only)
//!
//! Responses are queued per `(method, path)`. When a queue holds a single
//! response it is repeated, so a steady-state endpoint only needs one entry.
//! Unscripted calls answer `404`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::transport::{ApiRequest, ApiResponse, Method, RestTransport};

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<(Method, String), Vec<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `body` with `status` for the next call to `method path`.
    pub fn respond(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push(ApiResponse::new(status, body));
        self
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl RestTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let key = (request.method, request.path.clone());
        self.requests.lock().unwrap().push(request);

        let mut script = self.script.lock().unwrap();
        let response = match script.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => ApiResponse::new(404, "{\"message\":\"Not Found\"}"),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_response_repeats() {
        let transport = ScriptedTransport::new()
            .respond(Method::Get, "/x", 200, "a")
            .respond(Method::Get, "/x", 200, "b");

        for expected in ["a", "b", "b"] {
            let resp = transport
                .send(ApiRequest::new(Method::Get, "/x", "t"))
                .await
                .unwrap();
            assert_eq!(resp.body, expected);
        }
        assert_eq!(transport.count(Method::Get, "/x"), 3);
    }

    #[tokio::test]
    async fn unscripted_path_is_not_found() {
        let transport = ScriptedTransport::new();
        let resp = transport
            .send(ApiRequest::new(Method::Post, "/nope", "t"))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(transport.requests().len(), 1);
    }
}
