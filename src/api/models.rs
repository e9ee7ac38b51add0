use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// `POST /token/refresh/` answer. `refresh` is only present when the server
/// rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// User record as served by `/users/...` and `/messages/conversations/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.clone(),
        }
    }
}

/// One entry in the conversation directory: the peer we talk to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    pub peer_id: i64,
    pub display_name: String,
    pub email: String,
}

impl From<&UserRecord> for ConversationSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            peer_id: user.id,
            display_name: user.display_name(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub sender: i64,
    pub recipient: i64,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file_attachment: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn has_attachment(&self) -> bool {
        self.file_attachment.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// List endpoints answer with either a bare array or a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Plain(items) => items,
            Listing::Paged { results } => results,
        }
    }
}

/// Type-specific identifiers carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationPayload {
    Message {
        thread_id: Option<i64>,
        peer_id: Option<i64>,
        sender_name: Option<String>,
    },
    Proposal {
        proposal_id: Option<i64>,
        project_id: Option<i64>,
    },
    JobApplication {
        job_id: Option<i64>,
        application_id: Option<i64>,
    },
    Contract {
        contract_id: Option<i64>,
        project_id: Option<i64>,
    },
    Workspace {
        workspace_id: Option<i64>,
        contract_id: Option<i64>,
    },
    Payment {
        workspace_id: Option<i64>,
    },
    Unrecognized {
        kind: String,
    },
}

impl NotificationPayload {
    pub fn from_parts(kind: &str, metadata: &Value) -> Self {
        let id = |key: &str| metadata.get(key).and_then(as_id);
        match kind {
            "message" => NotificationPayload::Message {
                thread_id: id("thread_id"),
                peer_id: id("conversation_user_id"),
                sender_name: metadata
                    .get("sender_name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "proposal" => NotificationPayload::Proposal {
                proposal_id: id("proposal_id"),
                project_id: id("project_id"),
            },
            "job_application" => NotificationPayload::JobApplication {
                job_id: id("job_id"),
                application_id: id("application_id"),
            },
            "contract" => NotificationPayload::Contract {
                contract_id: id("contract_id"),
                project_id: id("project_id"),
            },
            "workspace" => NotificationPayload::Workspace {
                workspace_id: id("workspace_id"),
                contract_id: id("contract_id"),
            },
            "payment" => NotificationPayload::Payment {
                workspace_id: id("workspace_id"),
            },
            other => NotificationPayload::Unrecognized {
                kind: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            NotificationPayload::Message { .. } => "message",
            NotificationPayload::Proposal { .. } => "proposal",
            NotificationPayload::JobApplication { .. } => "job_application",
            NotificationPayload::Contract { .. } => "contract",
            NotificationPayload::Workspace { .. } => "workspace",
            NotificationPayload::Payment { .. } => "payment",
            NotificationPayload::Unrecognized { kind } => kind,
        }
    }
}

/// Identifiers arrive as numbers or numeric strings depending on the signal
/// that produced them.
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    id: i64,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    is_read: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(from = "NotificationRecord")]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub payload: NotificationPayload,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        let metadata = record.metadata.unwrap_or(Value::Null);
        Self {
            id: record.id,
            title: record.title,
            message: record.message,
            payload: NotificationPayload::from_parts(&record.kind, &metadata),
            is_read: record.is_read,
            created_at: record.created_at,
        }
    }
}
