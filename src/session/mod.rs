//! The currently logged-in user.

mod storage;

pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

use parking_lot::Mutex;
use serde_derive::{Deserialize, Serialize};
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

/// The storage key holding the bearer token.
pub const TOKEN_KEY: &str = "access_token";
/// The storage key holding the JSON-encoded [`UserProfile`].
pub const PROFILE_KEY: &str = "user_profile";

/// Which part of the clinic a user has access to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => f.write_str("patient"),
            Role::Doctor => f.write_str("doctor"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// The user details returned by the backend when logging in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl UserProfile {
    /// Overwrite any fields which were provided in the [`ProfileUpdate`].
    pub fn merge(&mut self, update: &ProfileUpdate) {
        let ProfileUpdate {
            name,
            email,
            phone,
            address,
            profile_image,
        } = update;

        if let Some(name) = name {
            self.name = name.clone();
        }
        if let Some(email) = email {
            self.email = email.clone();
        }
        if let Some(phone) = phone {
            self.phone = Some(phone.clone());
        }
        if let Some(address) = address {
            self.address = Some(address.clone());
        }
        if let Some(profile_image) = profile_image {
            self.profile_image = Some(profile_image.clone());
        }
    }
}

/// A partial set of profile fields.
///
/// This doubles as the request body for the `PUT .../profile` endpoints, so
/// fields which weren't set are left out of the JSON entirely.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

/// An authenticated user and the bearer token proving who they are.
#[derive(Clone, PartialEq)]
#[non_exhaustive]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// A point-in-time view of the [`SessionStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub session: Option<Session>,
}

impl Snapshot {
    pub fn user(&self) -> Option<&UserProfile> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool { self.session.is_some() }
}

/// Errors returned when mutating the [`SessionStore`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Nobody is logged in")]
    NoActiveSession,
    #[error("Unable to access the stored session")]
    Storage(#[from] StorageError),
    #[error("Unable to serialize the user profile")]
    Serialize(#[from] serde_json::Error),
}

/// A handle returned by [`SessionStore::subscribe()`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

/// The single source of truth for who is logged in.
///
/// The token and profile are written to [`Storage`] on every mutation so the
/// session can be picked up again with [`SessionStore::restore()`] the next
/// time the program starts.
pub struct SessionStore {
    storage: Box<dyn Storage>,
    current: Mutex<Option<Session>>,
    listeners: Mutex<Listeners>,
}

impl SessionStore {
    /// Create an empty store. Call [`SessionStore::restore()`] to load a
    /// previously persisted session.
    pub fn new<S>(storage: S) -> Self
    where
        S: Storage + 'static,
    {
        SessionStore {
            storage: Box::new(storage),
            current: Mutex::new(None),
            listeners: Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    /// Load the persisted session, if there is one.
    ///
    /// Nothing is sent to the server here, so a revoked token will only be
    /// noticed once a request gets rejected. Corrupted storage is treated as
    /// if nobody was logged in.
    pub fn restore(&self) -> Result<Snapshot, SessionError> {
        let stored = self
            .storage
            .get(TOKEN_KEY)
            .and_then(|token| Ok((token, self.storage.get(PROFILE_KEY)?)));

        let (token, profile) = match stored {
            Ok(stored) => stored,
            Err(e @ StorageError::Corrupted { .. }) => {
                log::warn!("Ignoring the stored session: {}", e);
                (None, None)
            },
            Err(e) => return Err(e.into()),
        };

        let session = match (token, profile) {
            (Some(token), Some(profile)) => {
                match serde_json::from_str::<UserProfile>(&profile) {
                    Ok(user) => Some(Session { token, user }),
                    Err(e) => {
                        log::warn!(
                            "Ignoring the stored session because the profile is unreadable: {}",
                            e
                        );
                        None
                    },
                }
            },
            (None, None) => None,
            _ => {
                log::warn!("Ignoring a partially persisted session");
                None
            },
        };

        match session {
            Some(ref s) => {
                log::debug!("Restored the session for {}", s.user.email)
            },
            None => log::debug!("No session to restore"),
        }

        *self.current.lock() = session;
        let snapshot = self.snapshot();
        self.notify(&snapshot);

        Ok(snapshot)
    }

    /// Start a new session, replacing whatever was there before.
    ///
    /// If the session can't be persisted, the previous one is left in place
    /// both in memory and in storage.
    pub fn login(
        &self,
        token: impl Into<String>,
        user: UserProfile,
    ) -> Result<(), SessionError> {
        let token = token.into();
        let profile = serde_json::to_string(&user)?;

        {
            let mut current = self.current.lock();
            self.storage.set(TOKEN_KEY, &token)?;

            if let Err(e) = self.storage.set(PROFILE_KEY, &profile) {
                self.rollback_token(current.as_ref());
                return Err(e.into());
            }

            log::info!("Logged in as {} ({})", user.email, user.role);
            *current = Some(Session { token, user });
        }

        self.notify(&self.snapshot());
        Ok(())
    }

    /// Forget the current session. Calling this when nobody is logged in is
    /// a no-op.
    ///
    /// The in-memory session is always cleared, even if removing it from
    /// storage fails. The first storage error is returned.
    pub fn logout(&self) -> Result<(), SessionError> {
        let (was_logged_in, removed) = {
            let mut current = self.current.lock();
            let was_logged_in = current.take().is_some();
            let token = self.storage.remove(TOKEN_KEY);
            let profile = self.storage.remove(PROFILE_KEY);
            (was_logged_in, token.and(profile))
        };

        if was_logged_in {
            log::info!("Logged out");
            self.notify(&Snapshot::default());
        }

        removed.map_err(SessionError::from)
    }

    /// Put the token back the way it was after a half-finished write, so
    /// storage never pairs one user's token with another's profile.
    fn rollback_token(&self, previous: Option<&Session>) {
        let restored = match previous {
            Some(session) => self.storage.set(TOKEN_KEY, &session.token),
            None => self.storage.remove(TOKEN_KEY),
        };

        if let Err(e) = restored {
            log::warn!("Unable to roll back the stored token: {}", e);
            // restore() ignores a token without a profile
            let _ = self.storage.remove(PROFILE_KEY);
        }
    }

    /// Merge some new profile fields into the current user.
    ///
    /// Returns [`SessionError::NoActiveSession`] if nobody is logged in.
    pub fn update_user(
        &self,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, SessionError> {
        let updated = {
            let mut current = self.current.lock();
            let session =
                current.as_mut().ok_or(SessionError::NoActiveSession)?;

            let mut user = session.user.clone();
            user.merge(update);
            self.storage
                .set(PROFILE_KEY, &serde_json::to_string(&user)?)?;
            session.user = user.clone();
            user
        };

        self.notify(&self.snapshot());
        Ok(updated)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            session: self.current.lock().clone(),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.current.lock().as_ref().map(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool { self.current.lock().is_some() }

    /// Be told whenever the session changes.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = SubscriptionId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(existing, _)| *existing != id);
        listeners.entries.len() != before
    }

    fn notify(&self, snapshot: &Snapshot) {
        // listeners may call back into the store, so don't hold the lock
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl Debug for SessionStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("current", &*self.current.lock())
            .field("listeners", &self.listeners.lock().entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FlakyStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doctor() -> UserProfile {
        UserProfile {
            user_id: String::from("7d9f5a8e-0000-4000-8000-000000000001"),
            email: String::from("house@clinichub.com"),
            name: String::from("A"),
            role: Role::Doctor,
            phone: Some(String::from("1")),
            address: Some(String::from("KN 123 St")),
            profile_image: None,
        }
    }

    fn patient() -> UserProfile {
        UserProfile {
            user_id: String::from("7d9f5a8e-0000-4000-8000-000000000002"),
            email: String::from("bob@example.com"),
            name: String::from("Bob"),
            role: Role::Patient,
            phone: None,
            address: None,
            profile_image: None,
        }
    }

    /// Lets two stores look at the same backing storage, like two page loads
    /// sharing the browser's local storage.
    #[derive(Clone, Default)]
    struct Shared(Arc<MemoryStorage>);

    impl Storage for Shared {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key)
        }
    }

    #[test]
    fn login_then_restore_gives_back_the_same_session() {
        let storage = Shared::default();
        let store = SessionStore::new(storage.clone());
        store.login("abc", doctor()).unwrap();

        let reloaded = SessionStore::new(storage);
        let got = reloaded.restore().unwrap();

        assert_eq!(got, store.snapshot());
        assert_eq!(got.token(), Some("abc"));
        assert_eq!(got.user(), Some(&doctor()));
        assert!(got.is_authenticated());
    }

    #[test]
    fn session_survives_a_restart_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::new(FileStorage::new(&path))
            .login("abc", doctor())
            .unwrap();
        let got = SessionStore::new(FileStorage::new(&path))
            .restore()
            .unwrap();

        assert_eq!(got.token(), Some("abc"));
        assert_eq!(got.user(), Some(&doctor()));
    }

    #[test]
    fn restore_with_nothing_stored_is_empty() {
        let store = SessionStore::new(MemoryStorage::new());

        let got = store.restore().unwrap();

        assert_eq!(got, Snapshot::default());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn restore_ignores_a_token_without_a_profile() {
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "abc").unwrap();
        let store = SessionStore::new(storage);

        let got = store.restore().unwrap();

        assert!(!got.is_authenticated());
        assert_eq!(store.token(), None);
    }

    #[test]
    fn restore_ignores_an_unreadable_profile() {
        let storage = MemoryStorage::new();
        storage.set(TOKEN_KEY, "abc").unwrap();
        storage.set(PROFILE_KEY, "{\"name\": 42}").unwrap();
        let store = SessionStore::new(storage);

        assert!(!store.restore().unwrap().is_authenticated());
    }

    #[test]
    fn a_failed_login_keeps_the_previous_session_intact() {
        let storage = FlakyStorage::default();
        let store = SessionStore::new(storage.clone());
        store.login("old-token", doctor()).unwrap();
        storage.fail_set(PROFILE_KEY);

        let err = store.login("new-token", patient()).unwrap_err();

        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(store.token().as_deref(), Some("old-token"));
        let restored = SessionStore::new(storage).restore().unwrap();
        assert_eq!(restored.token(), Some("old-token"));
        assert_eq!(restored.user(), Some(&doctor()));
    }

    #[test]
    fn a_failed_first_login_leaves_nothing_behind() {
        let storage = FlakyStorage::default();
        storage.fail_set(PROFILE_KEY);
        let store = SessionStore::new(storage.clone());

        assert!(store.login("abc", patient()).is_err());

        assert!(!store.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(SessionStore::new(storage).restore().unwrap(), Snapshot::default());
    }

    #[test]
    fn logout_clears_the_session_even_if_storage_fails() {
        let storage = FlakyStorage::default();
        let store = SessionStore::new(storage.clone());
        store.login("abc", doctor()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.subscribe(move |snapshot| {
            assert!(!snapshot.is_authenticated());
            seen.fetch_add(1, Ordering::SeqCst);
        });
        storage.fail_removes();

        let err = store.logout().unwrap_err();

        assert!(matches!(err, SessionError::Storage(_)));
        assert!(!store.is_authenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_truncated_session_file_is_treated_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{\"access_token\": ").unwrap();
        let store = SessionStore::new(FileStorage::new(&path));

        let got = store.restore().unwrap();
        assert_eq!(got, Snapshot::default());

        // and the file can be recovered from without deleting it by hand
        store.logout().unwrap();
        store.login("abc", doctor()).unwrap();
        let reloaded = SessionStore::new(FileStorage::new(&path))
            .restore()
            .unwrap();
        assert_eq!(reloaded.token(), Some("abc"));
    }

    #[test]
    fn storage_errors_dont_claim_to_be_writes() {
        let err = SessionError::from(FlakyStorage::broken());

        assert_eq!(err.to_string(), "Unable to access the stored session");
    }

    #[test]
    fn logout_is_idempotent() {
        let storage = Shared::default();
        let store = SessionStore::new(storage.clone());
        store.login("abc", doctor()).unwrap();

        store.logout().unwrap();
        let first = store.snapshot();
        store.logout().unwrap();
        let second = store.snapshot();

        assert_eq!(first, Snapshot::default());
        assert_eq!(first, second);
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(PROFILE_KEY).unwrap(), None);
    }

    #[test]
    fn update_user_only_touches_the_supplied_fields() {
        let store = SessionStore::new(MemoryStorage::new());
        store.login("abc", doctor()).unwrap();
        let update = ProfileUpdate {
            phone: Some(String::from("2")),
            ..Default::default()
        };

        let got = store.update_user(&update).unwrap();

        let mut should_be = doctor();
        should_be.phone = Some(String::from("2"));
        assert_eq!(got, should_be);
        assert_eq!(got.name, "A");
        assert_eq!(store.snapshot().user(), Some(&should_be));
        assert_eq!(store.token().as_deref(), Some("abc"));
    }

    #[test]
    fn update_user_is_persisted() {
        let storage = Shared::default();
        let store = SessionStore::new(storage.clone());
        store.login("abc", doctor()).unwrap();
        store
            .update_user(&ProfileUpdate {
                name: Some(String::from("B")),
                ..Default::default()
            })
            .unwrap();

        let got = SessionStore::new(storage).restore().unwrap();

        assert_eq!(got.user().map(|u| u.name.as_str()), Some("B"));
    }

    #[test]
    fn update_user_without_a_session_is_an_error() {
        let store = SessionStore::new(MemoryStorage::new());

        let err = store.update_user(&ProfileUpdate::default()).unwrap_err();

        assert!(matches!(err, SessionError::NoActiveSession));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn subscribers_are_told_about_changes() {
        let store = SessionStore::new(MemoryStorage::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = store.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.login("abc", doctor()).unwrap();
        store.logout().unwrap();
        // already logged out, nothing changed
        store.logout().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(store.unsubscribe(id));
        store.login("abc", doctor()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribers_see_the_new_state() {
        let store = Arc::new(SessionStore::new(MemoryStorage::new()));
        let authenticated = Arc::new(Mutex::new(Vec::new()));
        let states = Arc::clone(&authenticated);
        store.subscribe(move |snapshot| {
            states.lock().push(snapshot.is_authenticated())
        });

        store.login("abc", doctor()).unwrap();
        store.logout().unwrap();

        assert_eq!(*authenticated.lock(), vec![true, false]);
    }

    #[test]
    fn the_token_is_never_printed() {
        let session = Session {
            token: String::from("super-secret"),
            user: doctor(),
        };

        let got = format!("{:?}", session);

        assert!(!got.contains("super-secret"));
    }

    #[test]
    fn roles_use_the_backend_spelling() {
        let got: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(got, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"patient\"");
    }
}
