//! Queue session
//!
//! [`QueueSession`] is what front ends drive. Every mutation is followed by
//! a full re-fetch of the queue list, so local state only ever reflects what
//! the server last said. Push updates trigger the same re-fetch, but only
//! for the queue the user is looking at.
//!
//! Sessions are cheap to clone; clones share the client and the state, so
//! UI actions and update handling can run as separate tasks.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, RequestError, Transport};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::models::{EntryId, QueueId, QueueUpdate, User};
use crate::state::{ClientState, StateStore};
use crate::updates::UpdateEvent;
use crate::view::Action;

/// Failures of session operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Queue name cannot be empty")]
    EmptyQueueName,

    #[error("No active queue")]
    NoActiveQueue,
}

/// Client-side view of one user's queues
pub struct QueueSession<T> {
    api: Arc<ApiClient<T>>,
}

impl<T> Clone for QueueSession<T> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<T: Transport> QueueSession<T> {
    pub fn new(api: ApiClient<T>) -> Self {
        Self { api: Arc::new(api) }
    }

    /// Session against the configured server, with fresh state
    pub fn from_config(
        config: &Config,
        transport: T,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self::new(ApiClient::new(
            config.base_url.clone(),
            transport,
            credentials,
            StateStore::new(),
        ))
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    /// Shared handle to the client, for the update channel
    pub fn api_arc(&self) -> Arc<ApiClient<T>> {
        Arc::clone(&self.api)
    }

    pub fn store(&self) -> &StateStore {
        self.api.store()
    }

    pub fn snapshot(&self) -> ClientState {
        self.store().snapshot()
    }

    /// Check the credential, then load the queue list if it was accepted
    pub async fn load(&self) -> Result<(), SessionError> {
        if self.check_auth().await? {
            self.fetch_queues().await?;
        }
        Ok(())
    }

    /// Ask the server whether our credential is valid
    ///
    /// Returns whether it was. When the server confirms without naming the
    /// user, the user is fetched separately.
    pub async fn check_auth(&self) -> Result<bool, SessionError> {
        let status = self.api.auth_check().await?;
        let authenticated = status.authenticated;
        let needs_user = authenticated && status.user.is_none();
        self.store().set_auth(status);

        if needs_user && self.store().read(|s| s.user.is_none()) {
            self.fetch_user().await?;
        }
        debug!("Auth check: authenticated={}", authenticated);
        Ok(authenticated)
    }

    pub async fn fetch_user(&self) -> Result<User, SessionError> {
        let user = self.api.current_user().await?;
        self.store().set_user(user.clone());
        Ok(user)
    }

    /// Replace the local queue list with the server's
    ///
    /// A response that was overtaken by a newer fetch is dropped.
    pub async fn fetch_queues(&self) -> Result<(), SessionError> {
        let ticket = self.store().begin_fetch();
        let queues = self.api.list_queues().await?;
        self.store().apply_queues(ticket, queues);
        Ok(())
    }

    /// Create a queue and make it active
    pub async fn create_queue(&self, name: &str) -> Result<QueueId, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(SessionError::EmptyQueueName));
        }

        let queue_id = self.api.create_queue(name).await?;
        info!("Created queue {} ({})", name, queue_id);
        self.store().set_active_queue(queue_id.clone());
        self.fetch_queues().await?;
        Ok(queue_id)
    }

    /// Join a queue; it becomes the active one
    pub async fn join_queue(&self, queue_id: &QueueId) -> Result<EntryId, SessionError> {
        let entry_id = self.api.join_queue(queue_id).await?;
        info!("Joined queue {} as entry {}", queue_id, entry_id);
        self.store().record_join(queue_id.clone(), entry_id.clone());
        self.fetch_queues().await?;
        Ok(entry_id)
    }

    /// Leave the active queue
    ///
    /// Returns false without contacting the server when we hold no entry.
    pub async fn leave_queue(&self) -> Result<bool, SessionError> {
        let Some(queue_id) = self.membership() else {
            debug!("Leave ignored: not in a queue");
            return Ok(false);
        };

        self.api.leave_queue(&queue_id).await?;
        info!("Left queue {}", queue_id);
        self.store().clear_membership();
        self.fetch_queues().await?;
        Ok(true)
    }

    /// Let the person behind us go first
    ///
    /// Returns false without contacting the server when we hold no entry.
    pub async fn skip_turn(&self) -> Result<bool, SessionError> {
        let Some(queue_id) = self.membership() else {
            debug!("Skip ignored: not in a queue");
            return Ok(false);
        };

        self.api.skip_turn(&queue_id).await?;
        self.fetch_queues().await?;
        Ok(true)
    }

    /// Ask the holder of `target` in the active queue to trade places
    pub async fn request_swap(&self, target: &EntryId) -> Result<(), SessionError> {
        let Some(queue_id) = self.store().read(|s| s.active_queue_id.clone()) else {
            return Err(self.reject(SessionError::NoActiveQueue));
        };

        self.api.request_swap(&queue_id, target).await?;
        self.fetch_queues().await
    }

    /// Make `queue_id` the active queue and refresh
    pub async fn open_queue(&self, queue_id: &QueueId) -> Result<(), SessionError> {
        self.store().set_active_queue(queue_id.clone());
        self.fetch_queues().await
    }

    /// React to a push notification
    ///
    /// Re-fetches once when the update concerns the active queue and
    /// returns whether it did.
    pub async fn handle_update(&self, update: &QueueUpdate) -> Result<bool, SessionError> {
        let active = self.store().read(|s| s.active_queue_id.clone());
        if active.as_ref() != Some(&update.queue_id) {
            debug!("Ignoring update for inactive queue {}", update.queue_id);
            return Ok(false);
        }
        self.fetch_queues().await?;
        Ok(true)
    }

    /// React to an update channel event
    pub async fn handle_channel_event(&self, event: &UpdateEvent) -> Result<(), SessionError> {
        match event {
            UpdateEvent::QueueChanged(queue_id) => {
                self.handle_update(&QueueUpdate {
                    queue_id: queue_id.clone(),
                })
                .await?;
            }
            UpdateEvent::Resubscribed => {
                // Notifications may have been missed while offline
                self.fetch_queues().await?;
            }
            UpdateEvent::StatusChanged(_) => {}
            UpdateEvent::Error(message) => warn!("Update channel: {}", message),
        }
        Ok(())
    }

    /// Run an action offered by a rendered row
    pub async fn dispatch(&self, action: &Action) -> Result<(), SessionError> {
        match action {
            Action::Join(queue_id) => self.join_queue(queue_id).await.map(drop),
            Action::Open(queue_id) => self.open_queue(queue_id).await,
            Action::Skip => self.skip_turn().await.map(drop),
            Action::Leave => self.leave_queue().await.map(drop),
            Action::RequestSwap(target) => self.request_swap(target).await,
        }
    }

    /// Active queue, if we hold an entry in it
    fn membership(&self) -> Option<QueueId> {
        self.store().read(|s| match (&s.active_queue_id, &s.my_entry_id) {
            (Some(queue_id), Some(_)) => Some(queue_id.clone()),
            _ => None,
        })
    }

    /// Surface a guard failure the same way as a failed request
    fn reject(&self, err: SessionError) -> SessionError {
        warn!("{}", err);
        self.store().record_error(err.to_string());
        err
    }
}
