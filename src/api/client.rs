use crate::api::models::{
    ConversationSummary, Listing, Message, Notification, RefreshedToken, TokenPair, UserRecord,
};
use crate::api::transport::{ApiRequest, ApiResponse, FormValue, HttpTransport, StagedFile};
use crate::error::{ClientError, Result};
use crate::session::Session;
use log::{debug, error, info};
use serde_json::json;
use std::sync::Arc;

pub const REFRESH_PATH: &str = "/token/refresh/";

/// Authenticated client for the marketplace API.
///
/// Every call attaches the session's current access token. A 401 triggers at
/// most one refresh and one re-dispatch of that request.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, session: Arc<Session>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Sends `request`, recovering once from an expired access token.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let dispatched_with = self.session.access_token();
        let resp = self
            .transport
            .execute(&request, dispatched_with.as_deref())
            .await?;
        if resp.status != 401 || request.path == REFRESH_PATH {
            return resp.into_result();
        }

        debug!("{} {} unauthorized, refreshing", request.method, request.path);
        let fresh = self.refresh_after_unauthorized(dispatched_with.as_deref()).await?;
        self.transport
            .execute(&request, Some(&fresh))
            .await?
            .into_result()
    }

    /// Dispatches without credentials and without the refresh protocol.
    pub async fn send_unauthenticated(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.execute(&request, None).await?.into_result()
    }

    async fn refresh_after_unauthorized(&self, stale: Option<&str>) -> Result<String> {
        let _gate = self.session.lock_refresh().await;

        // Someone else refreshed while we waited for the gate.
        if let Some(current) = self.session.access_token() {
            if Some(current.as_str()) != stale {
                return Ok(current);
            }
        }

        let Some(refresh) = self.session.refresh_token() else {
            self.session.expire("no refresh token stored");
            return Err(ClientError::AuthExpired("no refresh token".into()));
        };

        info!("refreshing access token");
        let request = ApiRequest::post(REFRESH_PATH).json(json!({ "refresh": refresh }));
        let outcome = match self.transport.execute(&request, None).await {
            Ok(resp) if resp.is_success() => resp
                .json::<RefreshedToken>()
                .and_then(|t| t.access.map(|access| (access, t.refresh)).ok_or_else(|| {
                    ClientError::Decode("refresh response missing access token".into())
                })),
            Ok(resp) => Err(ClientError::Server {
                status: resp.status,
                body: resp.body,
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok((access, rotated)) => {
                self.session.replace_access(&access)?;
                if let Some(rotated) = rotated {
                    self.session.rotate_refresh(&rotated)?;
                }
                info!("access token refreshed");
                Ok(access)
            }
            Err(err) => {
                error!("token refresh failed: {}", err);
                self.session.expire(&err.to_string());
                Err(ClientError::AuthExpired(err.to_string()))
            }
        }
    }

    pub async fn obtain_token(&self, email: &str, password: &str) -> Result<TokenPair> {
        let request = ApiRequest::post("/token/").json(json!({
            "email": email,
            "password": password,
        }));
        self.send_unauthenticated(request).await?.json()
    }

    pub async fn me(&self) -> Result<UserRecord> {
        self.send(ApiRequest::get("/users/me/")).await?.json()
    }

    pub async fn user(&self, user_id: i64) -> Result<UserRecord> {
        self.send(ApiRequest::get(format!("/users/{}/", user_id)))
            .await?
            .json()
    }

    pub async fn conversations(&self) -> Result<Vec<ConversationSummary>> {
        let users: Listing<UserRecord> = self
            .send(ApiRequest::get("/messages/conversations/"))
            .await?
            .json()?;
        Ok(users.into_vec().iter().map(ConversationSummary::from).collect())
    }

    /// Full message log with one peer, oldest first as served.
    pub async fn messages_with(&self, peer_id: i64) -> Result<Vec<Message>> {
        let request = ApiRequest::get("/messages/with_user/").query("user_id", peer_id);
        let messages: Listing<Message> = self.send(request).await?.json()?;
        Ok(messages.into_vec())
    }

    pub async fn send_message(
        &self,
        recipient: i64,
        content: &str,
        attachment: Option<&StagedFile>,
    ) -> Result<Message> {
        let mut fields = vec![
            ("recipient".to_string(), FormValue::Text(recipient.to_string())),
            ("content".to_string(), FormValue::Text(content.to_string())),
        ];
        if let Some(file) = attachment {
            fields.push(("file_attachment".to_string(), FormValue::File(file.clone())));
        }
        self.send(ApiRequest::post("/messages/").multipart(fields))
            .await?
            .json()
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<UserRecord>> {
        let request = ApiRequest::get("/messages/search_users/").query("q", query);
        let users: Listing<UserRecord> = self.send(request).await?.json()?;
        Ok(users.into_vec())
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>> {
        let items: Listing<Notification> = self
            .send(ApiRequest::get("/notifications/"))
            .await?
            .json()?;
        Ok(items.into_vec())
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<()> {
        self.send(ApiRequest::post(format!("/notifications/{}/mark-read/", id)))
            .await
            .map(|_| ())
    }

    pub async fn mark_all_notifications_read(&self) -> Result<()> {
        self.send(ApiRequest::post("/notifications/mark-all-read/"))
            .await
            .map(|_| ())
    }

    pub async fn clear_notification(&self, id: i64) -> Result<()> {
        self.send(ApiRequest::delete(format!("/notifications/{}/", id)))
            .await
            .map(|_| ())
    }

    pub async fn clear_notifications(&self) -> Result<()> {
        self.send(ApiRequest::delete("/notifications/clear-all/"))
            .await
            .map(|_| ())
    }
}
