//! Message thread with one selected peer.
//!
//! Idle → Opening (first fetch, forced scroll) → Synced (timer re-fetches the
//! whole log) ↔ Sending. Every fetch is tagged with the selection it was
//! issued for and dropped on arrival if the selection has moved on.

use crate::api::client::ApiClient;
use crate::api::events::{EventSink, SyncEvent};
use crate::api::models::{ConversationSummary, Message};
use crate::api::transport::StagedFile;
use crate::app::{AppConfig, MAX_ATTACHMENT_BYTES};
use crate::error::{ClientError, Result};
use crate::sync::directory::ConversationDirectory;
use crate::sync::poller::{PollControl, Poller, Synchronizer};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Sent as the text of a message that only carries a file.
pub const ATTACHMENT_PLACEHOLDER: &str = "📎 Attachment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPhase {
    Idle,
    Opening,
    Synced,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirective {
    ToBottom,
    Preserve,
}

/// Scroll metrics last reported by the message list, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.client_height - self.scroll_top).max(0.0)
    }

    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() <= threshold
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = (self.scroll_height - self.client_height).max(0.0);
    }
}

/// Composed but not yet acknowledged message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingSend {
    pub text: String,
    pub attachment: Option<StagedFile>,
}

impl PendingSend {
    pub fn new(text: impl Into<String>, attachment: Option<StagedFile>) -> Self {
        Self {
            text: text.into(),
            attachment,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }

    pub fn validate(&self, max_attachment_bytes: u64) -> Result<()> {
        if self.is_blank() {
            return Err(ClientError::Validation(
                "message needs text or an attachment".into(),
            ));
        }
        if let Some(file) = &self.attachment {
            if file.len() > max_attachment_bytes {
                return Err(ClientError::Validation(format!(
                    "{} is {} bytes, the limit is {}",
                    file.file_name,
                    file.len(),
                    max_attachment_bytes
                )));
            }
        }
        Ok(())
    }

    /// Text put on the wire; attachment-only sends get a placeholder.
    pub fn wire_content(&self) -> String {
        if self.text.trim().is_empty() {
            ATTACHMENT_PLACEHOLDER.to_string()
        } else {
            self.text.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadConfig {
    pub poll_interval: Duration,
    pub scroll_threshold_px: f64,
    pub max_attachment_bytes: u64,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            scroll_threshold_px: 80.0,
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

impl From<&AppConfig> for ThreadConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_interval: config.thread_poll_interval(),
            scroll_threshold_px: config.scroll_threshold_px,
            max_attachment_bytes: config.max_attachment_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(ScrollDirective),
    /// The selection changed while the fetch was in flight.
    Discarded,
    /// Nothing is selected.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Background,
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSnapshot {
    pub peer: Option<ConversationSummary>,
    pub phase: ThreadPhase,
    pub messages: Vec<Message>,
    pub scroll: ScrollDirective,
    pub viewport: Viewport,
    pub revision: u64,
}

#[derive(Debug)]
struct ThreadState {
    peer: Option<ConversationSummary>,
    epoch: u64,
    awaiting_initial: bool,
    sends_in_flight: usize,
    messages: Vec<Message>,
    viewport: Viewport,
    last_scroll: ScrollDirective,
    revision: u64,
    compose: PendingSend,
}

impl ThreadState {
    fn phase(&self) -> ThreadPhase {
        if self.peer.is_none() {
            ThreadPhase::Idle
        } else if self.sends_in_flight > 0 {
            ThreadPhase::Sending
        } else if self.awaiting_initial {
            ThreadPhase::Opening
        } else {
            ThreadPhase::Synced
        }
    }

    fn selection(&self) -> Option<(i64, u64)> {
        self.peer.as_ref().map(|p| (p.peer_id, self.epoch))
    }

    fn is_current(&self, peer_id: i64, epoch: u64) -> bool {
        self.selection() == Some((peer_id, epoch))
    }
}

struct ThreadInner {
    api: ApiClient,
    directory: Option<ConversationDirectory>,
    config: ThreadConfig,
    events: EventSink,
    state: Mutex<ThreadState>,
    // FIFO: concurrent sends hit the server in submission order.
    send_order: tokio::sync::Mutex<()>,
    poller: Poller,
}

#[derive(Clone)]
pub struct ThreadSynchronizer {
    inner: Arc<ThreadInner>,
}

impl ThreadSynchronizer {
    pub fn new(
        api: ApiClient,
        directory: Option<ConversationDirectory>,
        config: ThreadConfig,
        events: EventSink,
    ) -> Self {
        Self {
            inner: Arc::new(ThreadInner {
                api,
                directory,
                config,
                events,
                state: Mutex::new(ThreadState {
                    peer: None,
                    epoch: 0,
                    awaiting_initial: false,
                    sends_in_flight: 0,
                    messages: Vec::new(),
                    viewport: Viewport::default(),
                    last_scroll: ScrollDirective::Preserve,
                    revision: 0,
                    compose: PendingSend::default(),
                }),
                send_order: tokio::sync::Mutex::new(()),
                poller: Poller::new("thread"),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ThreadState> {
        // A poisoned lock only means a panic elsewhere; the data is still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switches to `peer`: stops the old timer, fetches the log once, and
    /// keeps polling it.
    pub async fn select(&self, peer: ConversationSummary) -> Result<RefreshOutcome> {
        self.inner.poller.stop();
        let peer_id = peer.peer_id;
        let epoch = {
            let mut st = self.state();
            st.epoch += 1;
            st.peer = Some(peer);
            st.awaiting_initial = true;
            st.messages.clear();
            st.compose = PendingSend::default();
            st.revision += 1;
            st.epoch
        };
        debug!("thread opening for peer {}", peer_id);
        self.start_polling();
        self.fetch(peer_id, epoch, FetchKind::Forced).await
    }

    /// Opens the thread with `peer_id`, creating a directory entry if needed.
    pub async fn open_peer(&self, peer_id: i64) -> Result<RefreshOutcome> {
        let peer = match &self.inner.directory {
            Some(directory) => directory.resolve_or_create_thread(peer_id).await?,
            None => ConversationSummary::from(&self.inner.api.user(peer_id).await?),
        };
        self.select(peer).await
    }

    /// Back to Idle.
    pub fn clear_selection(&self) {
        self.inner.poller.stop();
        let mut st = self.state();
        st.epoch += 1;
        st.peer = None;
        st.awaiting_initial = false;
        st.messages.clear();
        st.compose = PendingSend::default();
        st.revision += 1;
    }

    /// Re-fetches the log of the current selection.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let Some((peer_id, epoch)) = self.state().selection() else {
            return Ok(RefreshOutcome::Skipped);
        };
        self.fetch(peer_id, epoch, FetchKind::Background).await
    }

    async fn fetch(&self, peer_id: i64, epoch: u64, kind: FetchKind) -> Result<RefreshOutcome> {
        let fetched = self.inner.api.messages_with(peer_id).await;

        let mut st = self.state();
        if !st.is_current(peer_id, epoch) {
            debug!("dropping stale message log for peer {}", peer_id);
            return Ok(RefreshOutcome::Discarded);
        }
        let messages = fetched?;

        let force = kind == FetchKind::Forced || st.awaiting_initial;
        let scroll = if force || st.viewport.is_near_bottom(self.inner.config.scroll_threshold_px) {
            ScrollDirective::ToBottom
        } else {
            ScrollDirective::Preserve
        };
        st.messages = messages;
        st.awaiting_initial = false;
        st.last_scroll = scroll;
        st.revision += 1;
        if scroll == ScrollDirective::ToBottom {
            st.viewport.scroll_to_bottom();
        }
        let event = SyncEvent::ThreadUpdated {
            peer_id,
            phase: st.phase(),
            message_count: st.messages.len(),
            scroll,
        };
        drop(st);
        self.inner.events.emit(event);
        Ok(RefreshOutcome::Applied(scroll))
    }

    fn start_polling(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .poller
            .start(self.inner.config.poll_interval, false, move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return PollControl::Stop;
                    };
                    match (ThreadSynchronizer { inner }).refresh().await {
                        Ok(RefreshOutcome::Skipped) => PollControl::Stop,
                        Ok(_) => PollControl::Continue,
                        Err(err) if err.is_recoverable() => {
                            warn!("message refresh failed: {}", err);
                            PollControl::Continue
                        }
                        Err(err) => {
                            warn!("message polling stopped: {}", err);
                            PollControl::Stop
                        }
                    }
                }
            });
    }

    pub fn report_viewport(&self, viewport: Viewport) {
        self.state().viewport = viewport;
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.state().compose.text = text.into();
    }

    /// Stages a file for the next send, rejecting it right away if too big.
    pub fn stage_attachment(&self, file: StagedFile) -> Result<()> {
        let max = self.inner.config.max_attachment_bytes;
        if file.len() > max {
            return Err(ClientError::Validation(format!(
                "{} is {} bytes, the limit is {}",
                file.file_name,
                file.len(),
                max
            )));
        }
        self.state().compose.attachment = Some(file);
        Ok(())
    }

    pub fn compose(&self) -> PendingSend {
        self.state().compose.clone()
    }

    pub async fn send_draft(&self) -> Result<Message> {
        let pending = self.compose();
        self.dispatch(pending).await
    }

    pub async fn send(&self, text: &str, attachment: Option<StagedFile>) -> Result<Message> {
        self.dispatch(PendingSend::new(text, attachment)).await
    }

    async fn dispatch(&self, pending: PendingSend) -> Result<Message> {
        pending.validate(self.inner.config.max_attachment_bytes)?;
        let (peer_id, epoch) = {
            let mut st = self.state();
            let selection = st
                .selection()
                .ok_or_else(|| ClientError::Validation("no conversation selected".into()))?;
            st.sends_in_flight += 1;
            selection
        };
        let in_flight = SendInFlight { thread: self };

        let result = {
            let _order = self.inner.send_order.lock().await;
            self.inner
                .api
                .send_message(peer_id, &pending.wire_content(), pending.attachment.as_ref())
                .await
        };

        drop(in_flight);
        {
            let mut st = self.state();
            if st.is_current(peer_id, epoch) {
                st.compose = match &result {
                    Ok(_) => PendingSend::default(),
                    Err(_) => pending,
                };
            }
        }

        let message = match result {
            Ok(message) => message,
            Err(err) => {
                warn!("sending to peer {} failed: {}", peer_id, err);
                return Err(err);
            }
        };

        if let Err(err) = self.fetch(peer_id, epoch, FetchKind::Forced).await {
            warn!("refresh after send failed: {}", err);
        }
        if let Some(directory) = &self.inner.directory {
            if let Err(err) = directory.list_conversations().await {
                warn!("directory refresh after send failed: {}", err);
            }
        }
        Ok(message)
    }

    pub fn phase(&self) -> ThreadPhase {
        self.state().phase()
    }

    pub fn selected_peer(&self) -> Option<ConversationSummary> {
        self.state().peer.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        let st = self.state();
        ThreadSnapshot {
            peer: st.peer.clone(),
            phase: st.phase(),
            messages: st.messages.clone(),
            scroll: st.last_scroll,
            viewport: st.viewport,
            revision: st.revision,
        }
    }
}

/// Counts one send toward the `Sending` phase until dropped, including when
/// the sending future is cancelled mid-request.
struct SendInFlight<'a> {
    thread: &'a ThreadSynchronizer,
}

impl Drop for SendInFlight<'_> {
    fn drop(&mut self) {
        let mut st = self.thread.state();
        st.sends_in_flight = st.sends_in_flight.saturating_sub(1);
    }
}

impl Synchronizer for ThreadSynchronizer {
    /// Resumes polling for the current selection, if any.
    fn start(&self) {
        if self.state().peer.is_some() {
            self.start_polling();
        }
    }

    fn stop(&self) {
        self.inner.poller.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.poller.is_running()
    }
}
