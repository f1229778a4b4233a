pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod router;
pub mod storage;
pub mod store;

pub use client::{check_inbox, SecmailClient};
pub use config::{load_config, Config};
pub use constants::{default_headers, DEFAULT_BASE_URL, DEFAULT_HEADERS, DEFAULT_TIMEOUT_SECS};
pub use error::{Error, Result};
pub use models::{Attachment, MailboxSession, Message, MessageId, MessagePage, MessageSummary};
pub use router::{guard, Navigation, Route, Router};
pub use storage::SessionStorage;
pub use store::{MailboxStore, RefreshOutcome, View};
