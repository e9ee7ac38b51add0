use crate::api::client::ApiClient;
use crate::api::events::{EventSink, SyncEvent};
use crate::api::models::Notification;
use crate::error::Result;
use crate::notifications::route::{route, Route};
use crate::shell::navigation::{NavigationTarget, Navigator};
use crate::sync::directory::ConversationDirectory;
use crate::sync::poller::{PollControl, Poller, Synchronizer};
use log::{debug, warn};
use std::sync::{Arc, RwLock};
use std::time::Duration;

struct FeedInner {
    api: ApiClient,
    interval: Duration,
    events: EventSink,
    items: RwLock<Vec<Notification>>,
    poller: Poller,
}

/// Locally mirrored notification list. Mutations apply to the local copy
/// first; server failures are logged and returned but never rolled back.
#[derive(Clone)]
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
}

impl NotificationFeed {
    pub fn new(api: ApiClient, interval: Duration, events: EventSink) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                api,
                interval,
                events,
                items: RwLock::new(Vec::new()),
                poller: Poller::new("notifications"),
            }),
        }
    }

    /// Fetches the server's list (newest first) and replaces the local copy.
    pub async fn list(&self) -> Result<Vec<Notification>> {
        let fetched = self.inner.api.notifications().await?;
        self.replace(fetched.clone());
        Ok(fetched)
    }

    pub fn items(&self) -> Vec<Notification> {
        self.inner
            .items
            .read()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    pub fn unread_count(&self) -> usize {
        self.inner
            .items
            .read()
            .map(|items| items.iter().filter(|n| !n.is_read).count())
            .unwrap_or(0)
    }

    fn replace(&self, items: Vec<Notification>) {
        if let Ok(mut current) = self.inner.items.write() {
            *current = items;
        }
        self.announce();
    }

    fn update_local<F: FnOnce(&mut Vec<Notification>)>(&self, apply: F) {
        if let Ok(mut items) = self.inner.items.write() {
            apply(&mut items);
        }
        self.announce();
    }

    fn announce(&self) {
        let (total, unread) = self
            .inner
            .items
            .read()
            .map(|items| (items.len(), items.iter().filter(|n| !n.is_read).count()))
            .unwrap_or((0, 0));
        self.inner
            .events
            .emit(SyncEvent::NotificationsUpdated { total, unread });
    }

    pub async fn mark_read(&self, id: i64) -> Result<()> {
        self.update_local(|items| {
            if let Some(n) = items.iter_mut().find(|n| n.id == id) {
                n.is_read = true;
            }
        });
        self.inner
            .api
            .mark_notification_read(id)
            .await
            .inspect_err(|err| warn!("marking notification {} read failed: {}", id, err))
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.update_local(|items| items.iter_mut().for_each(|n| n.is_read = true));
        self.inner
            .api
            .mark_all_notifications_read()
            .await
            .inspect_err(|err| warn!("marking all notifications read failed: {}", err))
    }

    pub async fn clear(&self, id: i64) -> Result<()> {
        self.update_local(|items| items.retain(|n| n.id != id));
        self.inner
            .api
            .clear_notification(id)
            .await
            .inspect_err(|err| warn!("clearing notification {} failed: {}", id, err))
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.update_local(Vec::clear);
        self.inner
            .api
            .clear_notifications()
            .await
            .inspect_err(|err| warn!("clearing notifications failed: {}", err))
    }

    /// Marks the notification read (awaited) and navigates to what it is
    /// about. Recoverable failures fall back to a generic view; an expired
    /// session is returned without navigating.
    pub async fn resolve_and_open(
        &self,
        notification: &Notification,
        directory: &ConversationDirectory,
        navigator: &dyn Navigator,
    ) -> Result<NavigationTarget> {
        if !notification.is_read {
            if let Err(err) = self.mark_read(notification.id).await {
                if !err.is_recoverable() {
                    return Err(err);
                }
            }
        }

        let target = match route(&notification.payload) {
            Route::Go(target) => target,
            Route::ResolveThread { peer_id } => {
                match directory.resolve_or_create_thread(peer_id).await {
                    Ok(peer) => NavigationTarget::Thread(peer.peer_id),
                    Err(err) if err.is_recoverable() => {
                        warn!("could not open thread with peer {}: {}", peer_id, err);
                        NavigationTarget::Messages
                    }
                    Err(err) => return Err(err),
                }
            }
        };
        debug!(
            "notification {} ({}) resolved to {}",
            notification.id,
            notification.payload.kind(),
            target
        );
        navigator.navigate(&target);
        Ok(target)
    }
}

impl Synchronizer for NotificationFeed {
    fn start(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.poller.start(self.inner.interval, true, move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return PollControl::Stop;
                };
                match (NotificationFeed { inner }).list().await {
                    Ok(_) => PollControl::Continue,
                    Err(err) if err.is_recoverable() => {
                        warn!("notification refresh failed: {}", err);
                        PollControl::Continue
                    }
                    Err(err) => {
                        warn!("notification polling stopped: {}", err);
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
