use crate::crypto::{derive_key, CryptoError, NoteKey};
use std::sync::{Arc, PoisonError, RwLock};

/// Source of the active note key. `None` means the vault is locked.
pub trait KeyProvider: Send + Sync {
    fn active_key(&self) -> Option<NoteKey>;
}

/// In-process key holder that the unlock flow (PIN, passkey, password)
/// feeds once it has verified the user.
#[derive(Debug, Clone, Default)]
pub struct Vault {
    key: Arc<RwLock<Option<NoteKey>>>,
}

impl Vault {
    pub fn locked() -> Self {
        Self::default()
    }

    pub fn unlocked(key: NoteKey) -> Self {
        let vault = Self::default();
        vault.unlock(key);
        vault
    }

    pub fn unlock(&self, key: NoteKey) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    pub fn unlock_with_secret(&self, secret: &[u8], salt: &[u8], iterations: u32) -> Result<(), CryptoError> {
        let key = derive_key(secret, salt, iterations)?;
        self.unlock(key);
        Ok(())
    }

    pub fn lock(&self) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl KeyProvider for Vault {
    fn active_key(&self) -> Option<NoteKey> {
        self.key.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
