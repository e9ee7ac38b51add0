use crate::api::models::ConversationSummary;
use crate::sync::thread::{ScrollDirective, ThreadPhase};
use tokio::sync::mpsc;

/// What the background synchronizers report to the shell.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ConversationsUpdated(Vec<ConversationSummary>),
    ThreadUpdated {
        peer_id: i64,
        phase: ThreadPhase,
        message_count: usize,
        scroll: ScrollDirective,
    },
    NotificationsUpdated {
        total: usize,
        unread: usize,
    },
    SessionExpired,
}

/// Cheap cloneable sender; a missing or closed receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
