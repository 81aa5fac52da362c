//! Credential storage.
//!
//! The SDK persists five values between launches: the hostname, the username,
//! the access/refresh token pair and a flag saying whether the access token is
//! still believed valid. [`CredentialStore`] is the key-value seam; the
//! session-level operations the network manager needs live on
//! [`CredentialStoreExt`] so every store gets them for free.

use crate::codec::AuthenticationToken;
use crate::error::BuildError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// Keys persisted by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Host the user logged into.
    Hostname,
    /// Current access token.
    AccessToken,
    /// Current refresh token.
    RefreshToken,
    /// `"true"` while the access token is believed valid.
    TokenValid,
    /// Username used at login.
    Username,
}

impl StorageKey {
    /// Every key, in a stable order.
    pub const ALL: [StorageKey; 5] = [
        StorageKey::Hostname,
        StorageKey::AccessToken,
        StorageKey::RefreshToken,
        StorageKey::TokenValid,
        StorageKey::Username,
    ];

    /// Keys removed when the user is logged out. The hostname survives so the
    /// login screen can offer it again.
    pub const SESSION: [StorageKey; 4] = [
        StorageKey::AccessToken,
        StorageKey::RefreshToken,
        StorageKey::TokenValid,
        StorageKey::Username,
    ];

    /// The name this key is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Hostname => "login.hostname",
            StorageKey::AccessToken => "login.token",
            StorageKey::RefreshToken => "login.refreshToken",
            StorageKey::TokenValid => "login.tokenValidated",
            StorageKey::Username => "login.username",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synchronous key-value store for credentials.
///
/// Stores are shared between concurrent calls, so implementations must
/// synchronise internally.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored value, if any.
    fn get(&self, key: StorageKey) -> Option<String>;

    /// Stores a value, replacing any previous one.
    fn set(&self, key: StorageKey, value: &str);

    /// Removes a value. Removing an absent key is not an error.
    fn delete(&self, key: StorageKey);

    /// Stores several values as one update.
    ///
    /// The default writes them one by one; stores that can do better should
    /// override it so readers never observe a partial update.
    fn set_all(&self, entries: &[(StorageKey, &str)]) {
        for (key, value) in entries {
            self.set(*key, value);
        }
    }

    /// Removes several values as one update.
    fn delete_all(&self, keys: &[StorageKey]) {
        for key in keys {
            self.delete(*key);
        }
    }

    /// Marks the stored access token stale if it is still `access_token`.
    ///
    /// Returns `false` when a different token has been stored since, in which
    /// case nothing is written. The default reads then writes; stores that
    /// can should do both under one lock.
    fn mark_stale_if(&self, access_token: &str) -> bool {
        if self.get(StorageKey::AccessToken).as_deref() != Some(access_token) {
            return false;
        }
        self.set(StorageKey::TokenValid, "false");
        true
    }
}

/// Access/refresh token pair plus the validity flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token for business calls.
    pub access_token: String,
    /// Token used to mint a new access token.
    pub refresh_token: String,
    /// `false` once the access token is known to be stale.
    pub valid: bool,
}

/// Everything needed to make an authenticated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Host the session belongs to.
    pub hostname: String,
    /// Current credentials.
    pub credentials: Credentials,
}

/// Session-level operations available on every [`CredentialStore`].
pub trait CredentialStoreExt: CredentialStore {
    /// Loads the current session in one lookup.
    ///
    /// A missing validity flag is treated as stale so the next call refreshes
    /// before using the token.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingCredentials`] if the hostname or either
    /// token is absent.
    fn load_session(&self) -> Result<Session, BuildError> {
        let hostname = self.get(StorageKey::Hostname);
        let access_token = self.get(StorageKey::AccessToken);
        let refresh_token = self.get(StorageKey::RefreshToken);

        match (hostname, access_token, refresh_token) {
            (Some(hostname), Some(access_token), Some(refresh_token)) => Ok(Session {
                hostname,
                credentials: Credentials {
                    access_token,
                    refresh_token,
                    valid: self.get(StorageKey::TokenValid).as_deref() == Some("true"),
                },
            }),
            _ => Err(BuildError::MissingCredentials),
        }
    }

    /// Persists a successful login.
    fn save_login(&self, hostname: &str, username: &str, token: &AuthenticationToken) {
        self.set_all(&[
            (StorageKey::Hostname, hostname),
            (StorageKey::Username, username),
            (StorageKey::AccessToken, token.token.as_str()),
            (StorageKey::RefreshToken, token.refresh_token.as_str()),
            (StorageKey::TokenValid, "true"),
        ]);
    }

    /// Persists a refreshed token pair and marks it valid, as one update.
    fn save_refreshed(&self, token: &AuthenticationToken) {
        self.set_all(&[
            (StorageKey::AccessToken, token.token.as_str()),
            (StorageKey::RefreshToken, token.refresh_token.as_str()),
            (StorageKey::TokenValid, "true"),
        ]);
    }

    /// Removes the session, keeping the hostname.
    fn clear_session(&self) {
        self.delete_all(&StorageKey::SESSION);
    }
}

impl<S: CredentialStore + ?Sized> CredentialStoreExt for S {}

/// In-process [`CredentialStore`].
///
/// Useful for tests and for short-lived tools that log in on every run.
///
/// # Examples
///
/// ```
/// use newbcook_sdk::{CredentialStore, MemoryStore, StorageKey};
///
/// let store = MemoryStore::new();
/// store.set(StorageKey::Hostname, "api.example.com");
/// assert_eq!(store.get(StorageKey::Hostname).as_deref(), Some("api.example.com"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StorageKey, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a logged-in session.
    pub fn with_session(
        hostname: &str,
        access_token: &str,
        refresh_token: &str,
        valid: bool,
    ) -> Self {
        let store = Self::new();
        store.set_all(&[
            (StorageKey::Hostname, hostname),
            (StorageKey::AccessToken, access_token),
            (StorageKey::RefreshToken, refresh_token),
            (StorageKey::TokenValid, if valid { "true" } else { "false" }),
        ]);
        store
    }

    /// Returns a copy of every stored value.
    pub fn snapshot(&self) -> HashMap<StorageKey, String> {
        self.values.lock().clone()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.values.lock().get(&key).cloned()
    }

    fn set(&self, key: StorageKey, value: &str) {
        self.values.lock().insert(key, value.to_string());
    }

    fn delete(&self, key: StorageKey) {
        self.values.lock().remove(&key);
    }

    fn set_all(&self, entries: &[(StorageKey, &str)]) {
        let mut values = self.values.lock();
        for (key, value) in entries {
            values.insert(*key, (*value).to_string());
        }
    }

    fn delete_all(&self, keys: &[StorageKey]) {
        let mut values = self.values.lock();
        for key in keys {
            values.remove(key);
        }
    }

    fn mark_stale_if(&self, access_token: &str) -> bool {
        let mut values = self.values.lock();
        if values.get(&StorageKey::AccessToken).map(String::as_str) != Some(access_token) {
            return false;
        }
        values.insert(StorageKey::TokenValid, "false".to_string());
        true
    }
}

#[cfg(feature = "keyring")]
pub use keychain::KeyringStore;

#[cfg(feature = "keyring")]
mod keychain {
    use super::{CredentialStore, StorageKey};
    use keyring::Entry;
    use parking_lot::Mutex;
    use std::collections::hash_map::{self, HashMap};

    /// [`CredentialStore`] backed by the platform keychain.
    ///
    /// Keychain writes are independent, so [`CredentialStore::set_all`] cannot
    /// be atomic here. The validity flag is written last, which leaves an
    /// interrupted update looking stale rather than valid.
    #[derive(Debug)]
    pub struct KeyringStore {
        service_name: String,
        entries: Mutex<HashMap<StorageKey, Entry>>,
    }

    impl KeyringStore {
        /// Creates a store whose entries live under `service_name`.
        pub fn new(service_name: impl Into<String>) -> Self {
            Self {
                service_name: service_name.into(),
                entries: Mutex::new(HashMap::new()),
            }
        }

        /// Runs `f` against the entry for `key`, opening it on first use.
        fn with_entry<R>(&self, key: StorageKey, f: impl FnOnce(&Entry) -> R) -> Option<R> {
            let mut entries = self.entries.lock();
            let entry = match entries.entry(key) {
                hash_map::Entry::Occupied(slot) => slot.into_mut(),
                hash_map::Entry::Vacant(slot) => {
                    match Entry::new(&self.service_name, key.as_str()) {
                        Ok(entry) => slot.insert(entry),
                        Err(e) => {
                            tracing::warn!(
                                service = %self.service_name,
                                key = %key,
                                error = %e,
                                "Failed to open keychain entry"
                            );
                            return None;
                        }
                    }
                }
            };
            Some(f(entry))
        }
    }

    impl CredentialStore for KeyringStore {
        fn get(&self, key: StorageKey) -> Option<String> {
            match self.with_entry(key, Entry::get_password)? {
                Ok(value) => Some(value),
                Err(keyring::Error::NoEntry) => None,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to read keychain entry");
                    None
                }
            }
        }

        fn set(&self, key: StorageKey, value: &str) {
            if let Some(Err(e)) = self.with_entry(key, |entry| entry.set_password(value)) {
                tracing::warn!(key = %key, error = %e, "Failed to write keychain entry");
            }
        }

        fn delete(&self, key: StorageKey) {
            match self.with_entry(key, Entry::delete_credential) {
                None | Some(Ok(())) | Some(Err(keyring::Error::NoEntry)) => {}
                Some(Err(e)) => {
                    tracing::warn!(key = %key, error = %e, "Failed to delete keychain entry");
                }
            }
        }

        fn set_all(&self, entries: &[(StorageKey, &str)]) {
            let (flags, values): (Vec<_>, Vec<_>) = entries
                .iter()
                .partition(|(key, _)| *key == StorageKey::TokenValid);
            if !flags.is_empty() {
                self.set(StorageKey::TokenValid, "false");
            }
            for (key, value) in values.into_iter().chain(flags) {
                self.set(*key, value);
            }
        }
    }

}
