//! In-memory stand-in for the marketplace REST API.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use talentlink_sync::api::models::TokenPair;
use talentlink_sync::shell::navigation::{NavigationTarget, Navigator};
use talentlink_sync::api::transport::{
    ApiRequest, ApiResponse, FormValue, HttpTransport, RequestBody,
};
use talentlink_sync::storage::SqliteStore;
use talentlink_sync::{ApiClient, ClientError, Result, Session};
use tokio::sync::Semaphore;

pub const ME: i64 = 1;
pub const ANA: i64 = 2;
pub const BEN: i64 = 3;
pub const CLEO: i64 = 4;
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
}

pub struct ServerState {
    pub access: String,
    pub refresh: String,
    pub issued: usize,
    pub refresh_fails: bool,
    pub rotate_refresh: bool,
    pub users: BTreeMap<i64, Value>,
    pub messages: Vec<Value>,
    pub notifications: Vec<Value>,
    pub log: Vec<Recorded>,
    pub forced_status: HashMap<String, u16>,
    pub network_down: Vec<String>,
    pub always_unauthorized: Vec<String>,
}

/// Records every navigation in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<NavigationTarget>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<NavigationTarget> {
        self.visited.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<NavigationTarget> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &NavigationTarget) {
        self.visited.lock().unwrap().push(target.clone());
    }
}

pub struct FakeServer {
    state: Mutex<ServerState>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

fn user(id: i64, first: &str, last: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "username": first.to_lowercase(),
        "first_name": first,
        "last_name": last,
        "role": "freelancer",
    })
}

fn timestamp(seq: i64) -> String {
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
    (base + ChronoDuration::seconds(seq)).to_rfc3339()
}

fn respond(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        body: body.to_string(),
    }
}

/// `path` or `path?k=v&k=v`, used to address gates.
pub fn route_key(request: &ApiRequest) -> String {
    if request.query.is_empty() {
        return request.path.clone();
    }
    let query: Vec<String> = request
        .query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("{}?{}", request.path, query.join("&"))
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        let mut users = BTreeMap::new();
        users.insert(ME, user(ME, "Mia", "Stone", "me@talentlink.test"));
        users.insert(ANA, user(ANA, "Ana", "Lopez", "ana@talentlink.test"));
        users.insert(BEN, user(BEN, "Ben", "Okafor", "ben@talentlink.test"));
        users.insert(CLEO, user(CLEO, "Cleo", "Park", "cleo@talentlink.test"));
        Arc::new(Self {
            state: Mutex::new(ServerState {
                access: "access-0".into(),
                refresh: "refresh-0".into(),
                issued: 0,
                refresh_fails: false,
                rotate_refresh: false,
                users,
                messages: Vec::new(),
                notifications: Vec::new(),
                log: Vec::new(),
                forced_status: HashMap::new(),
                network_down: Vec::new(),
                always_unauthorized: Vec::new(),
            }),
            gates: Mutex::new(HashMap::new()),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    /// Client whose session already holds the server's current tokens.
    pub fn client(self: &Arc<Self>) -> ApiClient {
        let session = Session::new(SqliteStore::in_memory().unwrap()).unwrap();
        let (access, refresh) = {
            let st = self.state();
            (st.access.clone(), st.refresh.clone())
        };
        session.sign_in(&TokenPair { access, refresh }).unwrap();
        ApiClient::new(self.clone(), Arc::new(session))
    }

    pub fn signed_out_client(self: &Arc<Self>) -> ApiClient {
        let session = Session::new(SqliteStore::in_memory().unwrap()).unwrap();
        ApiClient::new(self.clone(), Arc::new(session))
    }

    /// Invalidates the current access token; the refresh token stays valid.
    pub fn expire_access(&self) {
        let mut st = self.state();
        st.access = format!("revoked-{}", st.issued);
    }

    pub fn reject_refresh(&self) {
        self.state().refresh_fails = true;
    }

    pub fn force_status(&self, key: &str, status: u16) {
        self.state().forced_status.insert(key.to_string(), status);
    }

    pub fn clear_forced(&self, key: &str) {
        self.state().forced_status.remove(key);
    }

    pub fn take_down(&self, key: &str) {
        self.state().network_down.push(key.to_string());
    }

    pub fn bring_up(&self, key: &str) {
        self.state().network_down.retain(|k| k != key);
    }

    pub fn always_unauthorized(&self, key: &str) {
        self.state().always_unauthorized.push(key.to_string());
    }

    pub fn add_message(&self, sender: i64, recipient: i64, content: &str) -> i64 {
        let mut st = self.state();
        let id = st.messages.len() as i64 + 1;
        st.messages.push(json!({
            "id": id,
            "sender": sender,
            "recipient": recipient,
            "content": content,
            "file_attachment": null,
            "attachments": [],
            "read": false,
            "created_at": timestamp(id),
        }));
        id
    }

    /// Newest first, like the server's ordering.
    pub fn add_notification(&self, kind: &str, metadata: Value, is_read: bool) -> i64 {
        let mut st = self.state();
        let id = st
            .notifications
            .iter()
            .filter_map(|n| n["id"].as_i64())
            .max()
            .unwrap_or(0)
            + 1;
        st.notifications.insert(
            0,
            json!({
                "id": id,
                "user": ME,
                "type": kind,
                "title": format!("{} update", kind),
                "message": "",
                "metadata": metadata,
                "is_read": is_read,
                "read_at": null,
                "created_at": timestamp(100 + id),
            }),
        );
        id
    }

    /// Contents of the thread between `a` and `b`, in server order.
    pub fn thread_contents(&self, a: i64, b: i64) -> Vec<String> {
        self.state()
            .messages
            .iter()
            .filter(|m| {
                let (s, r) = (m["sender"].as_i64(), m["recipient"].as_i64());
                (s == Some(a) && r == Some(b)) || (s == Some(b) && r == Some(a))
            })
            .map(|m| m["content"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state().log.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.state()
            .log
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn refresh_calls(&self) -> usize {
        self.count("POST", "/token/refresh/")
    }

    /// Requests matching `key` wait until `release` is called.
    pub fn hold(&self, key: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(key) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub async fn wait_for(&self, method: &str, path: &str, n: usize) {
        for _ in 0..2000 {
            if self.count(method, path) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("timed out waiting for {} {} x{}", method, path, n);
    }

    fn handle(&self, request: &ApiRequest, bearer: Option<&str>) -> ApiResponse {
        let key = route_key(request);
        let mut st = self.state();
        if let Some(status) = st.forced_status.get(&key).copied() {
            return respond(status, json!({"detail": "forced failure"}));
        }

        let method = request.method.as_str();
        let path = request.path.as_str();
        let body = match &request.body {
            RequestBody::Json(v) => v.clone(),
            _ => Value::Null,
        };

        match (method, path) {
            ("POST", "/token/") => {
                let email = body["email"].as_str().unwrap_or_default();
                let known = st.users.values().any(|u| u["email"] == email);
                if !known || body["password"] != PASSWORD {
                    return respond(401, json!({"detail": "No active account found"}));
                }
                st.issued += 1;
                st.access = format!("access-{}", st.issued);
                st.refresh = format!("refresh-{}", st.issued);
                return respond(200, json!({"access": st.access, "refresh": st.refresh}));
            }
            ("POST", "/token/refresh/") => {
                if st.refresh_fails || body["refresh"] != st.refresh.as_str() {
                    return respond(401, json!({"detail": "Token is invalid or expired"}));
                }
                st.issued += 1;
                st.access = format!("access-{}", st.issued);
                if st.rotate_refresh {
                    st.refresh = format!("refresh-{}", st.issued);
                    return respond(200, json!({"access": st.access, "refresh": st.refresh}));
                }
                return respond(200, json!({"access": st.access}));
            }
            _ => {}
        }

        if bearer != Some(st.access.as_str()) || st.always_unauthorized.contains(&key) {
            return respond(401, json!({"detail": "Given token not valid for any token type"}));
        }

        let query = |name: &str| {
            request
                .query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            ("GET", ["users", "me"]) => respond(200, st.users[&ME].clone()),
            ("GET", ["users", id]) => match id.parse::<i64>().ok().and_then(|id| st.users.get(&id)) {
                Some(u) => respond(200, u.clone()),
                None => respond(404, json!({"detail": "Not found."})),
            },
            ("GET", ["messages", "conversations"]) => {
                let mut peers: Vec<i64> = Vec::new();
                for m in st.messages.iter().rev() {
                    let (s, r) = (m["sender"].as_i64().unwrap(), m["recipient"].as_i64().unwrap());
                    let peer = if s == ME { r } else if r == ME { s } else { continue };
                    if !peers.contains(&peer) {
                        peers.push(peer);
                    }
                }
                let users: Vec<Value> = peers.iter().filter_map(|p| st.users.get(p).cloned()).collect();
                respond(200, Value::Array(users))
            }
            ("GET", ["messages", "with_user"]) => {
                let peer: i64 = query("user_id").and_then(|v| v.parse().ok()).unwrap_or(-1);
                let thread: Vec<Value> = st
                    .messages
                    .iter()
                    .filter(|m| {
                        let (s, r) = (m["sender"].as_i64(), m["recipient"].as_i64());
                        (s == Some(ME) && r == Some(peer)) || (s == Some(peer) && r == Some(ME))
                    })
                    .cloned()
                    .collect();
                respond(200, Value::Array(thread))
            }
            ("GET", ["messages", "search_users"]) => {
                let q = query("q").unwrap_or_default().to_lowercase();
                let found: Vec<Value> = st
                    .users
                    .iter()
                    .filter(|(id, u)| {
                        **id != ME
                            && (u["first_name"].as_str().unwrap_or_default().to_lowercase().contains(&q)
                                || u["email"].as_str().unwrap_or_default().contains(&q))
                    })
                    .map(|(_, u)| u.clone())
                    .collect();
                respond(200, json!({"count": found.len(), "results": found}))
            }
            ("POST", ["messages"]) => {
                let RequestBody::Multipart(fields) = &request.body else {
                    return respond(415, json!({"detail": "multipart expected"}));
                };
                let mut recipient = None;
                let mut content = String::new();
                let mut attachment = Value::Null;
                for (name, value) in fields {
                    match (name.as_str(), value) {
                        ("recipient", FormValue::Text(v)) => recipient = v.parse::<i64>().ok(),
                        ("content", FormValue::Text(v)) => content = v.clone(),
                        ("file_attachment", FormValue::File(f)) => {
                            attachment = json!(format!("/media/message_attachments/{}", f.file_name))
                        }
                        _ => {}
                    }
                }
                let Some(recipient) = recipient else {
                    return respond(400, json!({"recipient": ["This field is required."]}));
                };
                let id = st.messages.len() as i64 + 1;
                let message = json!({
                    "id": id,
                    "sender": ME,
                    "sender_name": "Mia Stone",
                    "recipient": recipient,
                    "content": content,
                    "file_attachment": attachment,
                    "attachments": [],
                    "read": false,
                    "created_at": timestamp(id),
                });
                st.messages.push(message.clone());
                respond(201, message)
            }
            ("GET", ["notifications"]) => respond(200, Value::Array(st.notifications.clone())),
            ("POST", ["notifications", "mark-all-read"]) => {
                for n in st.notifications.iter_mut() {
                    n["is_read"] = json!(true);
                }
                respond(200, json!({"status": "ok"}))
            }
            ("POST", ["notifications", id, "mark-read"]) => {
                let id: i64 = id.parse().unwrap_or(-1);
                match st.notifications.iter_mut().find(|n| n["id"] == id) {
                    Some(n) => {
                        n["is_read"] = json!(true);
                        respond(200, json!({"status": "ok"}))
                    }
                    None => respond(404, json!({"detail": "Not found."})),
                }
            }
            ("DELETE", ["notifications", "clear-all"]) => {
                st.notifications.clear();
                respond(200, json!({"status": "ok"}))
            }
            ("DELETE", ["notifications", id]) => {
                let id: i64 = id.parse().unwrap_or(-1);
                let before = st.notifications.len();
                st.notifications.retain(|n| n["id"] != id);
                if st.notifications.len() == before {
                    respond(404, json!({"detail": "Not found."}))
                } else {
                    ApiResponse {
                        status: 204,
                        body: String::new(),
                    }
                }
            }
            _ => respond(404, json!({"detail": "Not found."})),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeServer {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let key = route_key(request);
        {
            let mut st = self.state();
            st.log.push(Recorded {
                method: request.method.as_str().to_string(),
                path: request.path.clone(),
                query: request.query.clone(),
                bearer: bearer.map(str::to_string),
            });
            if st.network_down.contains(&key) {
                return Err(ClientError::Network("connection refused".into()));
            }
        }
        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        Ok(self.handle(request, bearer))
    }
}
