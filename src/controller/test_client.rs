//! Scripted API server for controller tests.
//!
//! Each reply answers one request with a matching method and path, in the
//! order the replies were queued. Unscripted requests get a 404.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use http::{Request, Response};
use kube::Client;
use kube::client::Body;
use serde::Serialize;
use serde_json::json;

#[derive(Debug)]
struct Reply {
    method: &'static str,
    path: String,
    status: u16,
    body: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct ApiServer {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

fn status_body(code: u16) -> Vec<u8> {
    let reason = match code {
        404 => "NotFound",
        409 => "Conflict",
        _ => "InternalError",
    };
    serde_json::to_vec(&json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("scripted {code}"),
        "reason": reason,
        "code": code,
    }))
    .unwrap()
}

impl ApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `method path` request with `object`.
    pub fn reply<T: Serialize>(&self, method: &'static str, path: &str, object: &T) -> &Self {
        let status = if method == "POST" { 201 } else { 200 };
        self.push(method, path, status, serde_json::to_vec(object).unwrap())
    }

    /// Answer the next `method path` request with an API error.
    pub fn fail(&self, method: &'static str, path: &str, code: u16) -> &Self {
        self.push(method, path, code, status_body(code))
    }

    fn push(&self, method: &'static str, path: &str, status: u16, body: Vec<u8>) -> &Self {
        self.replies.lock().unwrap().push_back(Reply {
            method,
            path: path.to_string(),
            status,
            body,
        });
        self
    }

    /// Requests seen so far as `METHOD path`, event writes excluded.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.contains("/events"))
            .cloned()
            .collect()
    }

    /// Scripted replies nobody asked for.
    pub fn unused(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    fn handle(&self, request: &Request<Body>) -> Response<Body> {
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();
        self.requests
            .lock()
            .unwrap()
            .push(format!("{method} {path}"));

        let mut replies = self.replies.lock().unwrap();
        let position = replies
            .iter()
            .position(|r| r.method == method && r.path == path);
        let (status, body) = match position.and_then(|i| replies.remove(i)) {
            Some(reply) => (reply.status, reply.body),
            None => (404, status_body(404)),
        };
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    pub fn client(&self) -> Client {
        let server = self.clone();
        let service = tower::service_fn(move |request: Request<Body>| {
            let response = server.handle(&request);
            async move { Ok::<_, Infallible>(response) }
        });
        Client::new(service, "default")
    }
}
