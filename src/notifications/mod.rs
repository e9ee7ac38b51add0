pub mod feed;
pub mod route;

pub use feed::NotificationFeed;
