use crate::api::client::ApiClient;
use crate::api::events::{EventSink, SyncEvent};
use crate::api::models::ConversationSummary;
use crate::error::Result;
use crate::sync::poller::{PollControl, Poller, Synchronizer};
use log::{debug, warn};
use std::sync::{Arc, RwLock};
use std::time::Duration;

struct DirectoryInner {
    api: ApiClient,
    interval: Duration,
    events: EventSink,
    conversations: RwLock<Vec<ConversationSummary>>,
    // Peers opened before any message was exchanged; dropped once the server
    // lists them.
    provisional: RwLock<Vec<ConversationSummary>>,
    poller: Poller,
}

/// Periodically refreshed list of everyone the user has a thread with.
#[derive(Clone)]
pub struct ConversationDirectory {
    inner: Arc<DirectoryInner>,
}

impl ConversationDirectory {
    pub fn new(api: ApiClient, interval: Duration, events: EventSink) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                api,
                interval,
                events,
                conversations: RwLock::new(Vec::new()),
                provisional: RwLock::new(Vec::new()),
                poller: Poller::new("conversations"),
            }),
        }
    }

    /// Fetches the list and replaces the local copy. On error the previous
    /// list stays in place.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let fetched = self.inner.api.conversations().await?;
        if let Ok(mut provisional) = self.inner.provisional.write() {
            provisional.retain(|p| !fetched.iter().any(|c| c.peer_id == p.peer_id));
        }
        if let Ok(mut current) = self.inner.conversations.write() {
            *current = fetched;
        }
        let snapshot = self.conversations();
        debug!("conversation directory holds {} peers", snapshot.len());
        self.inner
            .events
            .emit(SyncEvent::ConversationsUpdated(snapshot.clone()));
        Ok(snapshot)
    }

    /// Server list followed by provisional peers not yet known to the server.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        let mut out = self
            .inner
            .conversations
            .read()
            .map(|c| c.clone())
            .unwrap_or_default();
        if let Ok(provisional) = self.inner.provisional.read() {
            for peer in provisional.iter() {
                if !out.iter().any(|c| c.peer_id == peer.peer_id) {
                    out.push(peer.clone());
                }
            }
        }
        out
    }

    pub fn find(&self, peer_id: i64) -> Option<ConversationSummary> {
        self.conversations()
            .into_iter()
            .find(|c| c.peer_id == peer_id)
    }

    /// Returns the directory entry for `peer_id`, looking the user up when no
    /// conversation exists yet so a first message can be written.
    pub async fn resolve_or_create_thread(&self, peer_id: i64) -> Result<ConversationSummary> {
        if let Some(existing) = self.find(peer_id) {
            return Ok(existing);
        }
        let user = self.inner.api.user(peer_id).await?;
        let summary = ConversationSummary::from(&user);
        if let Ok(mut provisional) = self.inner.provisional.write() {
            if !provisional.iter().any(|p| p.peer_id == peer_id) {
                provisional.push(summary.clone());
            }
        }
        debug!("opened provisional thread with peer {}", peer_id);
        Ok(summary)
    }
}

impl Synchronizer for ConversationDirectory {
    fn start(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.poller.start(self.inner.interval, true, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return PollControl::Stop;
                };
                match (ConversationDirectory { inner }).list_conversations().await {
                    Ok(_) => PollControl::Continue,
                    Err(err) if err.is_recoverable() => {
                        warn!("conversation refresh failed: {}", err);
                        PollControl::Continue
                    }
                    Err(err) => {
                        warn!("conversation polling stopped: {}", err);
                        PollControl::Stop
                    }
                }
            }
        });
    }

    fn stop(&self) {
        self.inner.poller.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.poller.is_running()
    }
}
