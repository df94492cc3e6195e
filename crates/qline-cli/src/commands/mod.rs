//! Command handlers

pub mod auth;
pub mod config;
pub mod queue;
pub mod status;

use anyhow::{bail, Result};

use crate::Session;

/// Check the credential and load the queue list
///
/// Fails with a login hint when the server does not accept the token.
pub async fn connect(session: &Session) -> Result<()> {
    session.load().await?;
    if !session.snapshot().authenticated {
        bail!("Not logged in. Run `qline login --token <token>` first.");
    }
    Ok(())
}
