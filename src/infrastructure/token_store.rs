use crate::domain::models::TokenKey;
use crate::infrastructure::error::InfraError;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Key-value storage for the three session strings. Each key is read and
/// written independently; nothing checks that they belong together.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: TokenKey) -> Result<Option<String>, InfraError>;
    fn set(&self, key: TokenKey, value: &str) -> Result<(), InfraError>;
    fn remove(&self, key: TokenKey) -> Result<(), InfraError>;

    fn clear(&self) -> Result<(), InfraError> {
        for key in TokenKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }

    fn access_token(&self) -> Result<Option<String>, InfraError> {
        Ok(self
            .get(TokenKey::AccessToken)?
            .filter(|value| !value.trim().is_empty()))
    }
}

#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service_name: String,
}

impl KeyringTokenStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: TokenKey) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, key.as_str())
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new("pomoplay.spotify")
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, InfraError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), InfraError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn remove(&self, key: TokenKey) -> Result<(), InfraError> {
        match self.entry(key)?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

/// Plaintext JSON object on disk, one string per key.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, InfraError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), InfraError> {
        if values.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        let formatted = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, format!("{formatted}\n"))?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), InfraError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .guard
            .lock()
            .map_err(|error| InfraError::Credential(format!("token file lock poisoned: {error}")))?;
        let mut values = self.read_all()?;
        mutate(&mut values);
        self.write_all(&values)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, InfraError> {
        let _guard = self
            .guard
            .lock()
            .map_err(|error| InfraError::Credential(format!("token file lock poisoned: {error}")))?;
        Ok(self.read_all()?.remove(key.as_str()))
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), InfraError> {
        self.update(|values| {
            values.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: TokenKey) -> Result<(), InfraError> {
        self.update(|values| {
            values.remove(key.as_str());
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    values: Mutex<HashMap<TokenKey, String>>,
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, InfraError> {
        let guard = self
            .values
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.get(&key).cloned())
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), InfraError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        guard.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), InfraError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        guard.remove(&key);
        Ok(())
    }
}
