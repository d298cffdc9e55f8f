//! Client-side session state: who is signed in, whether a request is in
//! flight, and the pending user notifications.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{MembershipLevel, SessionUser};
use crate::storage::{SessionStorage, TOKEN_KEY, USER_KEY};

pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub timeout: Duration,
    created_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.timeout
    }
}

pub struct SessionStore<S: SessionStorage> {
    storage: S,
    user: Option<SessionUser>,
    token: Option<String>,
    loading: bool,
    notifications: Vec<Notification>,
    next_notification_id: u64,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Empty session over `storage`; call [`initialize`](Self::initialize)
    /// to restore a persisted one.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            user: None,
            token: None,
            loading: false,
            notifications: Vec::new(),
            next_notification_id: 1,
        }
    }

    /// Restore token and user from storage.
    ///
    /// Both keys must be present. A user entry that does not parse clears
    /// the whole session.
    pub fn initialize(&mut self) -> Result<()> {
        let token = self.storage.get(TOKEN_KEY)?;
        let user = self.storage.get(USER_KEY)?;

        if let (Some(token), Some(raw_user)) = (token, user) {
            self.token = Some(token);
            match serde_json::from_str::<SessionUser>(&raw_user) {
                Ok(user) => {
                    debug!(user_id = user.id, "session restored");
                    self.user = Some(user);
                }
                Err(e) => {
                    warn!(error = %e, "stored user is corrupt, clearing session");
                    self.clear_auth();
                }
            }
        }
        Ok(())
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    fn membership(&self) -> Option<MembershipLevel> {
        self.user.as_ref().map(|u| u.membership_level)
    }

    pub fn is_premium(&self) -> bool {
        self.membership() == Some(MembershipLevel::Premium)
    }

    pub fn is_basic(&self) -> bool {
        self.membership() == Some(MembershipLevel::Basic)
    }

    pub fn is_free(&self) -> bool {
        self.membership() == Some(MembershipLevel::Free)
    }

    /// Install a freshly issued token and user, persisting both.
    pub fn set_session(&mut self, token: String, user: SessionUser) -> Result<()> {
        self.token = Some(token);
        self.user = Some(user);
        self.save_to_storage()
    }

    /// Replace the user while keeping the token.
    pub fn set_user(&mut self, user: SessionUser) -> Result<()> {
        self.user = Some(user);
        self.save_to_storage()
    }

    pub(crate) fn set_token(&mut self, token: String) -> Result<()> {
        self.token = Some(token);
        self.save_to_storage()
    }

    fn save_to_storage(&mut self) -> Result<()> {
        if let Some(token) = &self.token {
            self.storage.set(TOKEN_KEY, token)?;
        }
        if let Some(user) = &self.user {
            let raw = serde_json::to_string(user)?;
            self.storage.set(USER_KEY, &raw)?;
        }
        Ok(())
    }

    /// Forget token and user in memory and in storage.
    ///
    /// The in-memory session is always cleared; storage failures are logged.
    pub fn clear_auth(&mut self) {
        self.token = None;
        self.user = None;
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "failed to remove session entry");
            }
        }
    }

    /// Queue a notification; `timeout` defaults to five seconds.
    pub fn add_notification(
        &mut self,
        kind: NotificationKind,
        message: impl Into<String>,
        timeout: Option<Duration>,
    ) -> u64 {
        let id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push(Notification {
            id,
            kind,
            message: message.into(),
            timeout: timeout.unwrap_or(DEFAULT_NOTIFICATION_TIMEOUT),
            created_at: Instant::now(),
        });
        id
    }

    pub fn remove_notification(&mut self, id: u64) {
        self.notifications.retain(|n| n.id != id);
    }

    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    /// Live notifications, oldest first. Expired ones are dropped.
    pub fn notifications(&mut self) -> &[Notification] {
        let now = Instant::now();
        self.notifications.retain(|n| !n.is_expired(now));
        &self.notifications
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn user(level: MembershipLevel) -> SessionUser {
        SessionUser {
            id: 7,
            username: "abc".into(),
            email: "a@b.com".into(),
            avatar_url: None,
            membership_level: level,
            membership_expires_at: None,
        }
    }

    #[test]
    fn test_authenticated_needs_token_and_user() {
        let mut storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "t").unwrap();

        let mut session = SessionStore::new(storage);
        session.initialize().unwrap();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());

        session.set_session("t".into(), user(MembershipLevel::Premium)).unwrap();
        assert!(session.is_authenticated());
        assert!(session.is_premium());
        assert!(!session.is_free());
    }

    #[test]
    fn test_session_round_trips_through_storage() {
        let mut first = SessionStore::new(MemoryStorage::new());
        first.set_session("tok".into(), user(MembershipLevel::Basic)).unwrap();

        let mut second = SessionStore::new(first.storage().clone());
        second.initialize().unwrap();
        assert_eq!(second.token(), Some("tok"));
        assert_eq!(second.user().map(|u| u.id), Some(7));
        assert!(second.is_basic());
    }

    #[test]
    fn test_corrupt_user_clears_session() {
        let mut storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "tok").unwrap();
        storage.set(USER_KEY, "{not json").unwrap();

        let mut session = SessionStore::new(storage);
        session.initialize().unwrap();
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
        assert_eq!(session.storage().get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_clear_auth_removes_persisted_entries() {
        let mut session = SessionStore::new(MemoryStorage::new());
        session.set_session("tok".into(), user(MembershipLevel::Free)).unwrap();
        session.clear_auth();

        assert!(!session.is_authenticated());
        assert_eq!(session.storage().get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_notifications_expire_and_can_be_removed() {
        let mut session = SessionStore::new(MemoryStorage::new());
        let keep = session.add_notification(NotificationKind::Info, "hello", None);
        session.add_notification(NotificationKind::Error, "gone", Some(Duration::ZERO));
        let removed = session.add_notification(NotificationKind::Success, "bye", None);

        session.remove_notification(removed);
        let live = session.notifications();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, keep);
        assert_eq!(live[0].timeout, DEFAULT_NOTIFICATION_TIMEOUT);

        session.clear_notifications();
        assert!(session.notifications().is_empty());
    }
}
