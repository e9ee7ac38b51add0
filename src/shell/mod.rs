//! Application shell: owns the top-level pollers for an authenticated user
//! and reacts when the session expires.

pub mod login;
pub mod navigation;

use crate::api::client::ApiClient;
use crate::api::events::{EventSink, SyncEvent};
use crate::api::transport::ReqwestTransport;
use crate::app::AppConfig;
use crate::error::{ClientError, Result};
use crate::notifications::NotificationFeed;
use crate::session::{Session, SessionStatus};
use crate::storage::SqliteStore;
use crate::sync::thread::{RefreshOutcome, ThreadConfig};
use crate::sync::{ConversationDirectory, Synchronizer, ThreadSynchronizer};
use log::{info, warn};
use navigation::{NavigationTarget, Navigator};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub struct Shell {
    api: ApiClient,
    directory: ConversationDirectory,
    notifications: NotificationFeed,
    thread: ThreadSynchronizer,
    navigator: Arc<dyn Navigator>,
    events: EventSink,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Shell {
    pub fn new(
        api: ApiClient,
        config: &AppConfig,
        navigator: Arc<dyn Navigator>,
        events: EventSink,
    ) -> Self {
        let directory = ConversationDirectory::new(
            api.clone(),
            config.conversation_poll_interval(),
            events.clone(),
        );
        let notifications = NotificationFeed::new(
            api.clone(),
            config.notification_poll_interval(),
            events.clone(),
        );
        let thread = ThreadSynchronizer::new(
            api.clone(),
            Some(directory.clone()),
            ThreadConfig::from(config),
            events.clone(),
        );
        Self {
            api,
            directory,
            notifications,
            thread,
            navigator,
            events,
            watcher: Mutex::new(None),
        }
    }

    /// Wires the on-disk session store and the HTTP transport from `config`.
    pub fn connect(
        config: &AppConfig,
        navigator: Arc<dyn Navigator>,
        events: EventSink,
    ) -> Result<Self> {
        let session = Arc::new(Session::new(SqliteStore::open_default()?)?);
        let transport = ReqwestTransport::new(&config.api_base()?, config.request_timeout())?;
        let api = ApiClient::new(Arc::new(transport), session);
        Ok(Self::new(api, config, navigator, events))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    pub fn notifications(&self) -> &NotificationFeed {
        &self.notifications
    }

    pub fn thread(&self) -> &ThreadSynchronizer {
        &self.thread
    }

    /// Starts the directory and notification pollers and the session watcher.
    pub fn mount(&self) {
        self.directory.start();
        self.notifications.start();

        let mut status = self.api.session().subscribe();
        let directory = self.directory.clone();
        let notifications = self.notifications.clone();
        let thread = self.thread.clone();
        let navigator = self.navigator.clone();
        let events = self.events.clone();
        let watcher = tokio::spawn(async move {
            loop {
                if *status.borrow_and_update() == SessionStatus::Expired {
                    warn!("session expired, returning to sign-in");
                    directory.stop();
                    notifications.stop();
                    thread.stop();
                    events.emit(SyncEvent::SessionExpired);
                    navigator.navigate(&NavigationTarget::SignIn);
                    break;
                }
                if status.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Ok(mut slot) = self.watcher.lock() {
            if let Some(previous) = slot.replace(watcher) {
                previous.abort();
            }
        }
        info!("shell mounted");
    }

    pub fn unmount(&self) {
        self.directory.stop();
        self.notifications.stop();
        self.thread.stop();
        if let Some(watcher) = self.watcher.lock().ok().and_then(|mut slot| slot.take()) {
            watcher.abort();
        }
        info!("shell unmounted");
    }

    pub async fn open_conversation(&self, peer_id: i64) -> Result<RefreshOutcome> {
        let outcome = self.thread.open_peer(peer_id).await?;
        self.navigator.navigate(&NavigationTarget::Thread(peer_id));
        Ok(outcome)
    }

    /// Opens a notification by id, fetching the feed first when it is not
    /// known locally.
    pub async fn open_notification(&self, id: i64) -> Result<NavigationTarget> {
        let mut found = self.notifications.items().into_iter().find(|n| n.id == id);
        if found.is_none() {
            found = self.notifications.list().await?.into_iter().find(|n| n.id == id);
        }
        let notification =
            found.ok_or_else(|| ClientError::Validation(format!("no notification {}", id)))?;
        self.notifications
            .resolve_and_open(&notification, &self.directory, self.navigator.as_ref())
            .await
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().ok().and_then(|mut slot| slot.take()) {
            watcher.abort();
        }
    }
}
