// pod-core/src/models/mod.rs
pub mod message;
pub mod session;

pub use message::{ChatMessage, Role};
pub use session::{PendingLogin, SessionSummary};
