//! REST client for the queue service
//!
//! One attempt per call, no retries. Each call looks the bearer token up
//! once, holds a busy guard on the shared state while it runs, and on
//! failure leaves a readable message in the state's error slot.

use std::future::Future;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::error::RequestError;
use super::transport::{ByteStream, HttpRequest, Transport, TransportError};
use crate::credentials::CredentialStore;
use crate::models::{
    AuthStatus, CreatedQueue, EntryId, JoinedQueue, Queue, QueueId, User,
};
use crate::state::StateStore;

const JSON: &str = "application/json";

/// Authenticated client for the queue REST API
pub struct ApiClient<T> {
    base_url: String,
    transport: T,
    credentials: Arc<dyn CredentialStore>,
    store: StateStore,
}

impl<T: Transport> ApiClient<T> {
    /// Create a client for the service at `base_url`
    pub fn new(
        base_url: impl Into<String>,
        transport: T,
        credentials: Arc<dyn CredentialStore>,
        store: StateStore,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            credentials,
            store,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and return the parsed JSON body
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        self.tracked(self.execute(path, method, body)).await
    }

    /// GET /api/queues
    pub async fn list_queues(&self) -> Result<Vec<Queue>, RequestError> {
        self.tracked(async {
            let value = self.execute("/api/queues", Method::GET, None).await?;
            Ok(decode_data::<Vec<Queue>>(value)?.unwrap_or_default())
        })
        .await
    }

    /// POST /api/queues
    pub async fn create_queue(&self, name: &str) -> Result<QueueId, RequestError> {
        let body = json!({ "name": name });
        self.tracked(async {
            let value = self
                .execute("/api/queues", Method::POST, Some(&body))
                .await?;
            let created: CreatedQueue = require_data(value)?;
            Ok(created.queue_id)
        })
        .await
    }

    /// POST /api/queues/{id}/join
    pub async fn join_queue(&self, queue_id: &QueueId) -> Result<EntryId, RequestError> {
        let path = format!("/api/queues/{}/join", queue_id);
        let body = self.identity_body();
        self.tracked(async {
            let value = self.execute(&path, Method::POST, body.as_ref()).await?;
            let joined: JoinedQueue = require_data(value)?;
            Ok(joined.entry_id)
        })
        .await
    }

    /// DELETE /api/queues/{id}/leave
    pub async fn leave_queue(&self, queue_id: &QueueId) -> Result<(), RequestError> {
        let path = format!("/api/queues/{}/leave", queue_id);
        let body = self.identity_body();
        self.tracked(async {
            let value = self.execute(&path, Method::DELETE, body.as_ref()).await?;
            require_data::<Value>(value).map(drop)
        })
        .await
    }

    /// POST /api/queues/{id}/skip
    pub async fn skip_turn(&self, queue_id: &QueueId) -> Result<(), RequestError> {
        let path = format!("/api/queues/{}/skip", queue_id);
        let body = self.identity_body();
        self.tracked(async {
            let value = self.execute(&path, Method::POST, body.as_ref()).await?;
            require_data::<Value>(value).map(drop)
        })
        .await
    }

    /// POST /api/queues/{id}/swap
    pub async fn request_swap(
        &self,
        queue_id: &QueueId,
        target: &EntryId,
    ) -> Result<(), RequestError> {
        let path = format!("/api/queues/{}/swap", queue_id);
        let mut body = json!({ "target_entry_id": target });
        if let Some(user) = self.store.read(|s| s.user.clone()) {
            body["user_id"] = json!(user.id);
        }
        self.tracked(async {
            let value = self.execute(&path, Method::POST, Some(&body)).await?;
            require_data::<Value>(value).map(drop)
        })
        .await
    }

    /// GET /api/authcheck
    pub async fn auth_check(&self) -> Result<AuthStatus, RequestError> {
        self.tracked(async {
            let value = self.execute("/api/authcheck", Method::GET, None).await?;
            Ok(AuthStatus::from_value(&value))
        })
        .await
    }

    /// GET /api/user
    pub async fn current_user(&self) -> Result<User, RequestError> {
        self.tracked(async {
            let value = self.execute("/api/user", Method::GET, None).await?;
            require_data(value)
        })
        .await
    }

    /// Open the server-sent update stream with the current credential
    pub async fn open_update_stream(
        &self,
        url: &str,
        last_event_id: Option<&str>,
    ) -> Result<ByteStream, TransportError> {
        let mut headers = vec![("Accept", "text/event-stream".to_string())];
        if let Some(auth) = self.authorization() {
            headers.push(("Authorization", auth));
        }
        if let Some(id) = last_event_id {
            headers.push(("Last-Event-ID", id.to_string()));
        }
        let request = HttpRequest {
            method: Method::GET,
            url: url.to_string(),
            headers,
            body: None,
        };
        self.transport.open_stream(request).await
    }

    /// Run a call with the busy guard held, recording its failure
    async fn tracked<R>(
        &self,
        call: impl Future<Output = Result<R, RequestError>>,
    ) -> Result<R, RequestError> {
        let _busy = self.store.begin_request();
        let result = call.await;
        if let Err(ref err) = result {
            warn!("{}", err);
            if err.is_unauthorized() {
                self.store.mark_unauthenticated();
            }
            self.store.record_error(err.to_string());
        }
        result
    }

    async fn execute(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let mut headers = vec![("Accept", JSON.to_string())];
        if body.is_some() {
            headers.push(("Content-Type", JSON.to_string()));
        }
        if let Some(auth) = self.authorization() {
            headers.push(("Authorization", auth));
        }

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body: body.map(|b| b.to_string().into_bytes()),
        };
        debug!("{} {}", request.method, request.url);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RequestError::Network { message: e.0 })?;

        let parsed = if response.body.iter().all(u8::is_ascii_whitespace) {
            Ok(Value::Null)
        } else {
            serde_json::from_slice::<Value>(&response.body)
        };

        if response.is_success() {
            parsed.map_err(|e| RequestError::Parse {
                status: Some(response.status),
                details: e.to_string(),
            })
        } else {
            let payload = parsed.ok().filter(|v| !v.is_null());
            Err(RequestError::from_http(response.status, payload))
        }
    }

    /// `Bearer <token>` from a single credential lookup
    fn authorization(&self) -> Option<String> {
        match self.credentials.token() {
            Ok(token) => token.map(|t| format!("Bearer {}", t)),
            Err(e) => {
                warn!("Could not read credential: {}", e);
                None
            }
        }
    }

    /// `{ "user_id": ... }` when the user is known
    fn identity_body(&self) -> Option<Value> {
        self.store
            .read(|s| s.user.as_ref().map(|u| json!({ "user_id": u.id })))
    }
}

/// Decode the `data` field; `None` when it is missing or null
fn decode_data<D: DeserializeOwned>(mut value: Value) -> Result<Option<D>, RequestError> {
    match value.get_mut("data").map(Value::take) {
        None | Some(Value::Null) => Ok(None),
        Some(data) => serde_json::from_value(data)
            .map(Some)
            .map_err(|e| RequestError::Parse {
                status: None,
                details: e.to_string(),
            }),
    }
}

fn require_data<D: DeserializeOwned>(value: Value) -> Result<D, RequestError> {
    decode_data(value)?.ok_or_else(RequestError::missing_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::test_support::{json_response, ScriptedTransport};
    use crate::api::HttpResponse;

    fn client(transport: ScriptedTransport) -> ApiClient<ScriptedTransport> {
        ApiClient::new(
            "http://queue.test/",
            transport,
            Arc::new(MemoryCredentialStore::with_token("tok-1")),
            StateStore::new(),
        )
    }

    #[tokio::test]
    async fn test_request_attaches_headers() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({"data": []})));
        let api = client(transport.clone());

        let body = json!({"name": "x"});
        api.request("/api/queues", Method::POST, Some(&body))
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://queue.test/api/queues");
        assert_eq!(sent.header("Authorization"), Some("Bearer tok-1"));
        assert_eq!(sent.header("Accept"), Some("application/json"));
        assert_eq!(sent.header("Content-Type"), Some("application/json"));
        assert_eq!(sent.body.as_deref(), Some(br#"{"name":"x"}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_request_without_token_omits_authorization() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({})));
        let api = ApiClient::new(
            "http://queue.test",
            transport.clone(),
            Arc::new(MemoryCredentialStore::new()),
            StateStore::new(),
        );

        api.request("/api/queues", Method::GET, None).await.unwrap();
        assert_eq!(transport.requests()[0].header("Authorization"), None);
        assert!(transport.requests()[0].body.is_none());
        assert_eq!(transport.requests()[0].header("Content-Type"), None);
    }

    #[tokio::test]
    async fn test_forbidden_records_error_and_clears_loading() {
        let transport =
            ScriptedTransport::new(|_| json_response(403, json!({"error": "expired token"})));
        let api = client(transport);

        let err = api
            .request("/api/queues", Method::GET, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));

        let state = api.store().snapshot();
        let message = state.error.as_deref().expect("error recorded");
        assert!(message.contains("403"));
        assert!(message.contains("expired token"));
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_non_json_error_body_gets_generic_message() {
        let transport =
            ScriptedTransport::new(|_| Ok(HttpResponse::new(500, "<html>oops</html>")));
        let api = client(transport);

        let err = api.list_queues().await.unwrap_err();
        assert_eq!(
            err,
            RequestError::Http {
                status: 500,
                payload: None,
                message: "Network error".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_network_failure_has_no_status() {
        let transport =
            ScriptedTransport::new(|_| Err(TransportError("connection refused".to_string())));
        let api = client(transport);

        let err = api.list_queues().await.unwrap_err();
        assert!(matches!(err, RequestError::Network { .. }));
        assert_eq!(err.status(), None);

        let state = api.store().snapshot();
        assert!(state.error.as_deref().unwrap().contains("connection refused"));
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_success_with_invalid_json_is_parse_error() {
        let transport = ScriptedTransport::new(|_| Ok(HttpResponse::new(200, "not json")));
        let api = client(transport);

        let err = api.list_queues().await.unwrap_err();
        assert!(matches!(err, RequestError::Parse { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_marks_state() {
        let transport = ScriptedTransport::new(|_| json_response(401, json!({"error": "no"})));
        let api = client(transport);
        api.store().set_auth(AuthStatus {
            authenticated: true,
            user: None,
        });

        api.list_queues().await.unwrap_err();
        assert!(!api.store().snapshot().authenticated);
    }

    #[tokio::test]
    async fn test_next_request_clears_previous_error() {
        let transport = ScriptedTransport::new(|req| {
            if req.url.ends_with("/api/user") {
                json_response(404, json!({"error": "missing"}))
            } else {
                json_response(200, json!({"data": []}))
            }
        });
        let api = client(transport);

        api.current_user().await.unwrap_err();
        assert!(api.store().snapshot().error.is_some());

        api.list_queues().await.unwrap();
        assert!(api.store().snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_list_queues_missing_data_is_empty() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({"data": null})));
        let api = client(transport);
        assert!(api.list_queues().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_without_data_fails() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({"ok": true})));
        let api = client(transport);

        let err = api.skip_turn(&QueueId::from("q1")).await.unwrap_err();
        assert!(matches!(err, RequestError::Parse { .. }));
        assert!(api.store().snapshot().error.is_some());
    }

    #[tokio::test]
    async fn test_create_and_join_decode_ids() {
        let transport = ScriptedTransport::new(|req| {
            if req.url.ends_with("/join") {
                json_response(201, json!({"data": {"entry_id": 12}}))
            } else {
                json_response(201, json!({"data": {"queue_id": "q1"}}))
            }
        });
        let api = client(transport.clone());

        assert_eq!(
            api.create_queue("Bread Line").await.unwrap(),
            QueueId::from("q1")
        );
        assert_eq!(
            api.join_queue(&QueueId::from("q1")).await.unwrap(),
            EntryId::from("12")
        );
        assert_eq!(transport.count(Method::POST, "/api/queues/q1/join"), 1);
    }

    #[tokio::test]
    async fn test_mutations_identify_known_user() {
        let transport = ScriptedTransport::new(|_| json_response(200, json!({"data": "ok"})));
        let api = client(transport.clone());
        api.store().set_user(User {
            id: crate::models::UserId::from("42"),
            name: None,
        });

        api.request_swap(&QueueId::from("q1"), &EntryId::from("e9"))
            .await
            .unwrap();

        let body: Value = serde_json::from_slice(
            transport.requests()[0].body.as_deref().unwrap(),
        )
        .unwrap();
        assert_eq!(body, json!({"target_entry_id": "e9", "user_id": "42"}));
    }
}
