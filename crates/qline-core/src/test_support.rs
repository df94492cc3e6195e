//! Scripted transport for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::stream;
use futures_util::StreamExt;
use reqwest::Method;
use serde_json::Value;

use crate::api::{ByteStream, HttpRequest, HttpResponse, Transport, TransportError};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Answers requests from a closure and records everything it was sent
#[derive(Clone)]
pub struct ScriptedTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    streams: Arc<Mutex<VecDeque<Result<Vec<&'static str>, TransportError>>>>,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
            streams: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue one stream connection attempt: its chunks, or a failure
    pub fn push_stream(&self, stream: Result<Vec<&'static str>, TransportError>) {
        self.streams.lock().unwrap().push_back(stream);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests matching a method and URL path suffix
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(path))
            .count()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self.streams.lock().unwrap().pop_front();
        match next {
            Some(Ok(chunks)) => Ok(stream::iter(
                chunks
                    .into_iter()
                    .map(|c| Ok(c.as_bytes().to_vec()))
                    .collect::<Vec<_>>(),
            )
            .boxed()),
            Some(Err(e)) => Err(e),
            None => Err(TransportError("no stream scripted".to_string())),
        }
    }
}

/// JSON response helper
pub fn json_response(status: u16, body: Value) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(status, body.to_string()))
}
