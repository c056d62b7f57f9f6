//! Durable local persistence of the last-known cart and the guest
//! identity. Write-through: the reconciler saves on every successful
//! state transition and never reads back mid-session.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::warn;

use crate::errors::StorageError;
use crate::models::cart::GUEST_ID_PREFIX;
use crate::models::Cart;

const CART_FILE: &str = "cart.json";
const GUEST_ID_FILE: &str = "guest-id";

/// Key-value persistence for the cart snapshot and guest identity.
///
/// A corrupt or unparsable cart payload is reported as `Ok(None)` and
/// logged; callers proceed to cold-start. Only genuine I/O failures
/// surface as errors, and the reconciler downgrades those to log lines
/// too: the in-memory cart stays authoritative for the session.
pub trait CartStore: Send + Sync {
    fn load(&self) -> Result<Option<Cart>, StorageError>;
    /// `None` deletes the stored entry.
    fn save(&self, cart: Option<&Cart>) -> Result<(), StorageError>;
    /// Removes the cart entry and the guest identity unconditionally.
    fn clear(&self) -> Result<(), StorageError>;
    fn load_guest_id(&self) -> Result<Option<String>, StorageError>;
    fn save_guest_id(&self, id: &str) -> Result<(), StorageError>;
}

/// Produces a new guest identifier, `guest_` plus `token_len` random
/// alphanumerics. Collision probability within a single client is
/// negligible; these ids carry no security weight.
pub fn generate_guest_id(token_len: usize) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(token_len)
        .map(char::from)
        .collect();
    format!("{}{}", GUEST_ID_PREFIX, token)
}

/// JSON-file-backed store rooted at a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn cart_path(&self) -> PathBuf {
        self.dir.join(CART_FILE)
    }

    fn guest_id_path(&self) -> PathBuf {
        self.dir.join(GUEST_ID_FILE)
    }

    fn remove_if_present(path: &Path) -> Result<(), StorageError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CartStore for FileStore {
    fn load(&self) -> Result<Option<Cart>, StorageError> {
        let bytes = match fs::read(self.cart_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Cart>(&bytes) {
            Ok(cart) => Ok(Some(cart)),
            Err(e) => {
                warn!(error = %e, "stored cart failed to parse; treating as absent");
                Ok(None)
            }
        }
    }

    fn save(&self, cart: Option<&Cart>) -> Result<(), StorageError> {
        match cart {
            Some(cart) => {
                let json = serde_json::to_vec(cart)?;
                fs::write(self.cart_path(), json)?;
                Ok(())
            }
            None => Self::remove_if_present(&self.cart_path()),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        Self::remove_if_present(&self.cart_path())?;
        Self::remove_if_present(&self.guest_id_path())
    }

    fn load_guest_id(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.guest_id_path()) {
            Ok(id) => {
                let id = id.trim().to_string();
                Ok(if id.is_empty() { None } else { Some(id) })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_guest_id(&self, id: &str) -> Result<(), StorageError> {
        fs::write(self.guest_id_path(), id)?;
        Ok(())
    }
}

/// In-process store. Serializes through JSON like `FileStore` so
/// round-trip behavior matches; used in tests and when local storage is
/// disabled.
#[derive(Default)]
pub struct MemoryStore {
    cart: Mutex<Option<String>>,
    guest_id: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStore for MemoryStore {
    fn load(&self) -> Result<Option<Cart>, StorageError> {
        let slot = self.cart.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_deref() {
            Some(json) => match serde_json::from_str::<Cart>(json) {
                Ok(cart) => Ok(Some(cart)),
                Err(e) => {
                    warn!(error = %e, "stored cart failed to parse; treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn save(&self, cart: Option<&Cart>) -> Result<(), StorageError> {
        let mut slot = self.cart.lock().unwrap_or_else(|e| e.into_inner());
        *slot = match cart {
            Some(cart) => Some(serde_json::to_string(cart)?),
            None => None,
        };
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.cart.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.guest_id.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    fn load_guest_id(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .guest_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save_guest_id(&self, id: &str) -> Result<(), StorageError> {
        *self.guest_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::models::CartProduct;

    fn sample_cart() -> Cart {
        let mut cart = Cart::guest("guest_store_test");
        cart.upsert_item(
            CartProduct {
                id: "p1".to_string(),
                name: "Widget".to_string(),
                price: dec!(150.00),
                image: "https://cdn.example.com/p1.jpg".to_string(),
                sku: "SKU-P1".to_string(),
            },
            2,
        );
        cart
    }

    #[test]
    fn test_generate_guest_id_shape() {
        let id = generate_guest_id(12);
        assert!(id.starts_with(GUEST_ID_PREFIX));
        assert_eq!(id.len(), GUEST_ID_PREFIX.len() + 12);
        assert_ne!(generate_guest_id(12), generate_guest_id(12));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().expect("load").is_none());

        let cart = sample_cart();
        store.save(Some(&cart)).expect("save");
        let loaded = store.load().expect("load").expect("present");
        assert_eq!(loaded, cart);

        store.save(None).expect("delete");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn test_memory_store_clear_removes_both_entries() {
        let store = MemoryStore::new();
        store.save(Some(&sample_cart())).expect("save");
        store.save_guest_id("guest_abc123def456").expect("save id");

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        assert!(store.load_guest_id().expect("load id").is_none());
    }
}
