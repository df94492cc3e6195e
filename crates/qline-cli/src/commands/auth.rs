//! Credential command handlers

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::warn;

use qline_core::credentials::TOKEN_ENV;
use qline_core::{
    Config, CredentialStore, MemoryCredentialStore, QueueSession, ReqwestTransport, Transport,
    User,
};

use crate::output::Output;
use crate::Session;

/// Store a token once the server accepts it
pub async fn login(
    config: &Config,
    credentials: &dyn CredentialStore,
    token: String,
    output: &Output,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token cannot be empty");
    }
    if std::env::var(TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()) {
        warn!("{} is set and takes precedence over the stored token", TOKEN_ENV);
    }

    let candidate = QueueSession::from_config(
        config,
        ReqwestTransport::new(),
        Arc::new(MemoryCredentialStore::with_token(token)),
    );
    match store_if_accepted(&candidate, credentials, token).await? {
        Some(user) => output.success(&format!("Logged in as {}", display_name(&user))),
        None => output.success("Logged in"),
    }
    Ok(())
}

/// Check `token` through a session that holds only it, then persist it
///
/// The stored credential is untouched when the server says no.
async fn store_if_accepted<T: Transport>(
    candidate: &QueueSession<T>,
    credentials: &dyn CredentialStore,
    token: &str,
) -> Result<Option<User>> {
    if !candidate.check_auth().await? {
        bail!("The server rejected this token");
    }
    credentials
        .set_token(token)
        .context("Failed to store token")?;
    Ok(candidate.snapshot().user)
}

/// Forget the stored token
pub fn logout(credentials: &dyn CredentialStore, output: &Output) -> Result<()> {
    credentials.clear().context("Failed to remove token")?;
    output.success("Logged out");
    Ok(())
}

/// Show the authenticated user
pub async fn whoami(session: &Session, output: &Output) -> Result<()> {
    if !session.check_auth().await? {
        bail!("Not logged in. Run `qline login --token <token>` first.");
    }
    let user = match session.snapshot().user {
        Some(user) => user,
        None => session.fetch_user().await?,
    };
    output.print_user(&user);
    Ok(())
}

fn display_name(user: &User) -> String {
    match user.name {
        Some(ref name) => format!("{} ({})", name, user.id),
        None => user.id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qline_core::api::{ByteStream, HttpRequest, HttpResponse, TransportError};
    use qline_core::{StateStore, UserId};
    use qline_core::ApiClient;

    /// Accepts exactly one bearer token
    struct SingleTokenServer {
        accepted: &'static str,
    }

    impl Transport for SingleTokenServer {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let expected = format!("Bearer {}", self.accepted);
            let body = if request.header("Authorization") == Some(expected.as_str()) {
                r#"{"auth": true, "data": {"id": 7, "name": "Anna"}}"#
            } else {
                r#"{"auth": false}"#
            };
            Ok(HttpResponse::new(200, body))
        }

        async fn open_stream(&self, _request: HttpRequest) -> Result<ByteStream, TransportError> {
            Err(TransportError("no streams".to_string()))
        }
    }

    fn candidate(token: &str) -> QueueSession<SingleTokenServer> {
        QueueSession::new(ApiClient::new(
            "http://queue.test",
            SingleTokenServer { accepted: "good" },
            Arc::new(MemoryCredentialStore::with_token(token)),
            StateStore::new(),
        ))
    }

    #[tokio::test]
    async fn test_login_stores_accepted_token() {
        let stored = MemoryCredentialStore::new();

        let user = store_if_accepted(&candidate("good"), &stored, "good")
            .await
            .unwrap();

        assert_eq!(user.map(|u| u.id), Some(UserId::from("7")));
        assert_eq!(stored.token().unwrap().as_deref(), Some("good"));
    }

    #[tokio::test]
    async fn test_rejected_login_keeps_previous_token() {
        let stored = MemoryCredentialStore::with_token("previous");

        let err = store_if_accepted(&candidate("bad"), &stored, "bad")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("rejected"));
        assert_eq!(stored.token().unwrap().as_deref(), Some("previous"));
    }

    #[test]
    fn test_display_name() {
        let named = qline_core::User {
            id: UserId::from("7"),
            name: Some("Anna".to_string()),
        };
        assert_eq!(display_name(&named), "Anna (7)");

        let anonymous = qline_core::User {
            id: UserId::from("7"),
            name: None,
        };
        assert_eq!(display_name(&anonymous), "7");
    }
}
