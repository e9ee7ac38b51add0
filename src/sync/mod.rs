pub mod directory;
pub mod poller;
pub mod thread;

pub use directory::ConversationDirectory;
pub use poller::{Poller, Synchronizer};
pub use thread::ThreadSynchronizer;
