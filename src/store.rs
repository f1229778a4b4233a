//! Mailbox state: the current address, its inbox and the active view.
//!
//! `MailboxStore` is the single source of truth for the disposable mailbox.
//! Every action that talks to the server goes through it, and every action
//! that changes the address mirrors the change into [`SessionStorage`].
//!
//! Whenever `address` is empty, `messages` is empty and `selected_message`
//! is `None`.

use chrono::{DateTime, Utc};

use crate::client::SecmailClient;
use crate::config::Config;
use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::models::{MailboxSession, Message, MessageSummary};
use crate::storage::SessionStorage;

/// Which screen the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Create,
    Inbox,
}

/// Result of an inbox refresh. Refresh failures are handled here and never
/// returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No address is set.
    Skipped,
    /// The inbox now holds this many messages.
    Updated(usize),
    /// The address expired locally or the server reported it gone; state was cleared.
    Expired,
    /// The request failed; the message list was reset to empty.
    Failed,
}

pub struct MailboxStore {
    client: SecmailClient,
    storage: SessionStorage,
    validate_on_restore: bool,
    page_size: u32,

    address: String,
    expires_at: Option<DateTime<Utc>>,
    messages: Vec<MessageSummary>,
    selected_message: Option<Message>,
    view: View,
}

impl MailboxStore {
    pub fn new(client: SecmailClient, storage: SessionStorage) -> Self {
        Self {
            client,
            storage,
            validate_on_restore: true,
            page_size: DEFAULT_PAGE_SIZE,
            address: String::new(),
            expires_at: None,
            messages: Vec::new(),
            selected_message: None,
            view: View::default(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = SecmailClient::new(config)?;
        let storage = SessionStorage::new(config.session_file_path());
        Ok(Self::new(client, storage)
            .with_validate_on_restore(config.validate_on_restore)
            .with_page_size(config.page_size))
    }

    pub fn with_validate_on_restore(mut self, validate: bool) -> Self {
        self.validate_on_restore = validate;
        self
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn messages(&self) -> &[MessageSummary] {
        &self.messages
    }

    pub fn selected_message(&self) -> Option<&Message> {
        self.selected_message.as_ref()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn client(&self) -> &SecmailClient {
        &self.client
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    pub fn has_session(&self) -> bool {
        !self.address.is_empty()
    }

    /// The active session, if an address is set.
    pub fn session(&self) -> Option<MailboxSession> {
        if self.address.is_empty() {
            return None;
        }
        self.expires_at
            .map(|expires_at| MailboxSession::new(self.address.clone(), expires_at))
    }

    /// Ask the server for a fresh address and make it the active one.
    ///
    /// The inbox and selection are always reset, even when the server hands
    /// back the address already in use. If the server call fails the previous
    /// state is left untouched. If only saving fails the new address stays
    /// active in memory, the stored session is removed and the save error is
    /// returned.
    pub async fn generate_email(&mut self) -> Result<MailboxSession> {
        let session = self.client.create_address().await?;
        tracing::info!(address = %session.address, expires_at = %session.expires_at, "generated address");
        self.clear_state();
        self.assign(&session);
        self.persist()?;
        Ok(session)
    }

    /// Reload the first page of the inbox.
    pub async fn refresh_messages(&mut self) -> RefreshOutcome {
        self.refresh_messages_page(DEFAULT_PAGE, self.page_size).await
    }

    pub async fn refresh_messages_page(&mut self, page: u32, size: u32) -> RefreshOutcome {
        if self.address.is_empty() {
            return RefreshOutcome::Skipped;
        }
        if self.check_expiry() {
            return RefreshOutcome::Expired;
        }

        match self.client.list_messages(&self.address, page, size).await {
            Ok(page) => {
                self.messages = page.messages;
                RefreshOutcome::Updated(self.messages.len())
            }
            Err(e) if e.is_gone() => {
                tracing::info!(address = %self.address, "server reports address gone");
                self.invalidate();
                RefreshOutcome::Expired
            }
            Err(e) => {
                tracing::warn!(address = %self.address, error = %e, "failed to fetch messages");
                self.messages.clear();
                RefreshOutcome::Failed
            }
        }
    }

    /// Fetch a full message and make it the selected one.
    ///
    /// If the server reports the address gone, local state is cleared before
    /// the error is returned.
    pub async fn select_message(&mut self, message_id: &str) -> Result<&Message> {
        if self.address.is_empty() {
            return Err(Error::NoSession);
        }
        self.ensure_live()?;
        match self.client.get_message(message_id).await {
            Ok(message) => Ok(&*self.selected_message.insert(message)),
            Err(e) => {
                if e.is_gone() {
                    self.invalidate();
                }
                Err(e)
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_message = None;
    }

    /// Download one attachment of the selected message.
    pub async fn download_attachment(&mut self, attachment_id: &str) -> Result<Vec<u8>> {
        self.ensure_live()?;
        let message = self
            .selected_message
            .as_ref()
            .ok_or(Error::NoMessageSelected)?;
        if message.attachment(attachment_id).is_none() {
            return Err(Error::UnknownAttachment(attachment_id.to_string()));
        }
        let message_id = message.id.clone();

        match self
            .client
            .download_attachment(message_id.as_str(), attachment_id)
            .await
        {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                if e.is_gone() {
                    self.invalidate();
                }
                Err(e)
            }
        }
    }

    /// Delete the address on the server and forget it locally.
    ///
    /// Local state is cleared even when the remote call fails; the failure is
    /// still returned so the caller knows the server may keep the address.
    pub async fn delete_email(&mut self) -> Result<()> {
        if self.address.is_empty() {
            return Ok(());
        }
        let result = self.client.delete_address(&self.address).await;
        let address = std::mem::take(&mut self.address);
        self.invalidate();

        match result {
            Ok(()) => {
                tracing::info!(%address, "deleted address");
                Ok(())
            }
            Err(e) if e.is_gone() => {
                tracing::info!(%address, "address already gone on server");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%address, error = %e, "remote delete failed, cleared locally");
                Err(e)
            }
        }
    }

    pub async fn show_inbox(&mut self) -> RefreshOutcome {
        self.open_inbox();
        self.refresh_messages().await
    }

    /// Switch to the inbox view without fetching anything.
    pub fn open_inbox(&mut self) {
        self.view = View::Inbox;
    }

    pub fn show_create(&mut self) {
        self.view = View::Create;
    }

    /// Restore the persisted session, if it is still valid.
    ///
    /// An expired session is discarded without asking the server. When
    /// validation is enabled only a confirmed "gone" answer discards a
    /// session; network trouble keeps it.
    pub async fn load_stored_email(&mut self) -> bool {
        let session = match self.storage.load() {
            Ok(Some(session)) => session,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(path = %self.storage.path().display(), error = %e, "ignoring unreadable session");
                return false;
            }
        };

        if session.is_expired() {
            tracing::info!(address = %session.address, "stored address expired");
            self.discard_stored();
            return false;
        }

        if self.validate_on_restore {
            match self.client.get_address(&session.address).await {
                Ok(_) => {}
                Err(e) if e.is_gone() || matches!(e, Error::InvalidAddress(_)) => {
                    tracing::info!(address = %session.address, error = %e, "stored address rejected");
                    self.discard_stored();
                    return false;
                }
                Err(e) => {
                    tracing::warn!(address = %session.address, error = %e, "could not validate stored address, keeping it");
                }
            }
        }

        tracing::info!(address = %session.address, "restored address");
        self.assign(&session);
        true
    }

    /// Make `address` the active one and persist it.
    ///
    /// An empty address clears the session.
    pub fn set_email(&mut self, address: impl Into<String>, expires_at: DateTime<Utc>) -> Result<()> {
        let address = address.into();
        if address.is_empty() {
            self.clear_state();
        } else {
            self.assign(&MailboxSession::new(address, expires_at));
        }
        self.persist()
    }

    /// Write the in-memory session to storage, or remove it when there is none.
    pub fn save_email(&self) -> Result<()> {
        match self.session() {
            Some(session) => self.storage.save(&session),
            None => self.storage.clear(),
        }
    }

    /// Drop the session if it has expired locally. Returns whether it did.
    pub fn check_expiry(&mut self) -> bool {
        match self.session() {
            Some(session) if session.is_expired() => {
                tracing::info!(address = %session.address, "address expired");
                self.invalidate();
                true
            }
            _ => false,
        }
    }

    /// Like `check_expiry`, but an expired session becomes an error.
    fn ensure_live(&mut self) -> Result<()> {
        let address = self.address.clone();
        if self.check_expiry() {
            return Err(Error::SessionExpired {
                resource: format!("address {address}"),
            });
        }
        Ok(())
    }

    fn assign(&mut self, session: &MailboxSession) {
        if self.address != session.address {
            self.messages.clear();
            self.selected_message = None;
        }
        self.address = session.address.clone();
        self.expires_at = Some(session.expires_at);
    }

    fn clear_state(&mut self) {
        self.address.clear();
        self.expires_at = None;
        self.messages.clear();
        self.selected_message = None;
    }

    /// Forget the session everywhere and return to the create view.
    fn invalidate(&mut self) {
        self.clear_state();
        self.view = View::Create;
        self.discard_stored();
    }

    /// Save the session. When that fails, drop whatever is stored so an
    /// older address cannot come back on the next start.
    fn persist(&self) -> Result<()> {
        self.save_email().map_err(|e| {
            tracing::warn!(path = %self.storage.path().display(), error = %e, "failed to persist session");
            self.discard_stored();
            e
        })
    }

    fn discard_stored(&self) {
        if let Err(e) = self.storage.clear() {
            tracing::warn!(path = %self.storage.path().display(), error = %e, "failed to remove stored session");
        }
    }
}
