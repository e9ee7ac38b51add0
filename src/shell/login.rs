use crate::api::client::ApiClient;
use crate::api::models::UserRecord;
use crate::error::{ClientError, Result};
use log::{info, warn};

/// Exchanges email and password for a credential pair, stores it, and
/// remembers the signed-in user.
pub async fn sign_in(api: &ApiClient, email: &str, password: &str) -> Result<UserRecord> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ClientError::Validation(
            "Please enter email and password.".into(),
        ));
    }

    let tokens = api.obtain_token(email, password).await?;
    api.session().sign_in(&tokens)?;

    let user = api.me().await?;
    if let Err(err) = api.session().remember_user(&user) {
        warn!("could not persist user record: {}", err);
    }
    info!("signed in as {} (id {})", user.display_name(), user.id);
    Ok(user)
}

pub fn sign_out(api: &ApiClient) -> Result<()> {
    api.session().sign_out()
}
