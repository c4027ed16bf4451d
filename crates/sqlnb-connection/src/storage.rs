//! Password lookup for saved connections
//!
//! The connection manager only ever reads secrets. Writing them is the
//! host application's business.
//!
//! [`KeyringSecretStore`] reads the system keychain:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (via libsecret/GNOME Keyring)
//!
//! All credentials live in a SINGLE keychain entry holding a JSON map, so
//! the keychain is prompted at most once per process.

use parking_lot::RwLock;
use std::collections::HashMap;
use sqlnb_core::{Result, SqlnbError};

/// Service name used for the keychain entry
const SERVICE_NAME: &str = "dev.sqlnb.connections";

/// Account name for the single keychain entry that stores all credentials
const ACCOUNT_NAME: &str = "credentials";

/// Read-only access to stored passwords
pub trait SecretStore: Send + Sync {
    /// Look up the password for a saved connection
    ///
    /// `Ok(None)` means no password is stored, which is not an error:
    /// trust or peer authentication needs none.
    fn get_password(&self, connection_id: &str) -> Result<Option<String>>;
}

/// Build the key for a connection's password
fn password_key(connection_id: &str) -> String {
    format!("password:{}", connection_id)
}

/// Secret store backed by the system keychain
pub struct KeyringSecretStore {
    service: String,
    /// Map of "password:<id>" -> secret, loaded on first access
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl KeyringSecretStore {
    /// Create a store over the default keychain entry
    ///
    /// Note: This does NOT access the keychain immediately.
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Create a store over a custom keychain service name
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            cache: RwLock::new(None),
        }
    }

    /// Load all credentials from keychain
    fn load_from_keychain(&self) -> Result<HashMap<String, String>> {
        let entry = keyring::Entry::new(&self.service, ACCOUNT_NAME)
            .map_err(|e| SqlnbError::Security(format!("Failed to create keyring entry: {}", e)))?;

        match entry.get_password() {
            Ok(json_str) => {
                let credentials: HashMap<String, String> = serde_json::from_str(&json_str)
                    .unwrap_or_else(|e| {
                        tracing::warn!("Failed to parse credentials JSON, ignoring: {}", e);
                        HashMap::new()
                    });
                tracing::debug!(
                    count = credentials.len(),
                    "loaded credentials from keychain"
                );
                Ok(credentials)
            }
            Err(keyring::Error::NoEntry) => {
                tracing::debug!("no credentials found in keychain");
                Ok(HashMap::new())
            }
            Err(e) => {
                tracing::warn!("Failed to access keychain: {}, using empty credentials", e);
                Ok(HashMap::new())
            }
        }
    }

    /// Ensure cache is loaded
    fn ensure_loaded(&self) -> Result<()> {
        if self.cache.read().is_some() {
            return Ok(());
        }
        let mut cache = self.cache.write();
        if cache.is_none() {
            *cache = Some(self.load_from_keychain()?);
        }
        Ok(())
    }
}

impl Default for KeyringSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeyringSecretStore {
    fn get_password(&self, connection_id: &str) -> Result<Option<String>> {
        self.ensure_loaded()?;

        let key = password_key(connection_id);
        let cache = self.cache.read();
        let value = cache.as_ref().and_then(|credentials| credentials.get(&key).cloned());
        tracing::debug!(key = %key, found = value.is_some(), "retrieved secret");
        Ok(value)
    }
}

/// Secret store held in memory
///
/// Useful for tests and for passwords supplied on the command line.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    passwords: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(self, connection_id: impl Into<String>, password: impl Into<String>) -> Self {
        self.passwords
            .write()
            .insert(connection_id.into(), password.into());
        self
    }
}

impl SecretStore for InMemorySecretStore {
    fn get_password(&self, connection_id: &str) -> Result<Option<String>> {
        Ok(self.passwords.read().get(connection_id).cloned())
    }
}
