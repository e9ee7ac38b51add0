//! Client core for the TalentLink marketplace: an authenticated transport
//! with single-flight token refresh, polling conversation and thread
//! synchronizers, and a notification feed that resolves navigation targets.

pub mod api;
pub mod app;
pub mod error;
pub mod notifications;
pub mod session;
pub mod shell;
pub mod storage;
pub mod sync;
pub mod utils;

pub use api::client::ApiClient;
pub use app::AppConfig;
pub use error::{ClientError, Result};
pub use session::{Session, SessionStatus};
pub use shell::Shell;
