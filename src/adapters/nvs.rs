//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`KvStore`] for the node's flat record namespace.
//!
//! - ESP-IDF: blobs in the `meld` NVS namespace; each write is committed
//!   before returning, so a load right after a save observes it.
//! - Host: an in-memory map with the same key mapping, for tests and the
//!   simulation harness.
//!
//! NVS keys are at most 15 characters.  Longer keys (every record key is,
//! e.g. `moment_123456789`) are mapped to a stable digest key so two
//! records never collide by truncation.

use core::fmt::Write;

use log::info;

use crate::app::ports::KvStore;
use crate::error::StorageError;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

const NAMESPACE: &str = "meld";

/// Longest key NVS accepts.
pub const NVS_KEY_MAX: usize = 15;

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 4000;

pub type NvsKey = heapless::String<NVS_KEY_MAX>;

/// Map a storage key onto a valid NVS key.
///
/// Keys that fit are used as-is.  Longer keys become `~` followed by the
/// first 7 bytes of the key's SHA-256 digest in lowercase hex.
pub fn nvs_key(key: &str) -> Result<NvsKey, StorageError> {
    if key.is_empty() || !key.is_ascii() {
        return Err(StorageError::InvalidKey);
    }

    let mut out = NvsKey::new();
    if key.len() <= NVS_KEY_MAX {
        let _ = out.push_str(key);
        return Ok(out);
    }

    let digest = hmac_sha256::Hash::hash(key.as_bytes());
    let _ = out.push('~');
    for byte in &digest[..DIGEST_KEY_BYTES] {
        let _ = write!(out, "{:02x}", byte);
    }
    Ok(out)
}

/// Digest bytes kept in a long key: `~` plus two hex digits each fills
/// [`NVS_KEY_MAX`].
const DIGEST_KEY_BYTES: usize = (NVS_KEY_MAX - 1) / 2;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<NvsKey, Vec<u8>>,
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::Io);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::Io);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::Io);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    /// Open the namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        ns_buf[..NAMESPACE.len()].copy_from_slice(NAMESPACE.as_bytes());

        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let mut handle: nvs_handle_t = 0;
        // SAFETY: ns_buf is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// NUL-terminated copy of an NVS key.
    #[cfg(target_os = "espidf")]
    fn c_key(key: &NvsKey) -> [u8; NVS_KEY_MAX + 1] {
        let mut buf = [0u8; NVS_KEY_MAX + 1];
        buf[..key.len()].copy_from_slice(key.as_bytes());
        buf
    }
}

// ── Host (simulation) engine ──────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl KvStore for NvsAdapter {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key = nvs_key(key)?;
        let data = self.store.get(&key).ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = nvs_key(key)?;
        self.store.insert(key, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        let key = nvs_key(key)?;
        self.store.remove(&key);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        nvs_key(key).is_ok_and(|k| self.store.contains_key(&k))
    }
}

// ── ESP-IDF engine ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl KvStore for NvsAdapter {
    fn read(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let c_key = Self::c_key(&nvs_key(key)?);
        let result = Self::with_nvs_handle(false, |handle| {
            // First call: get size, so a short `buf` still gets a prefix.
            let mut size: usize = 0;
            // SAFETY: a null out-pointer asks NVS for the stored length only.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    c_key.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut blob = vec![0u8; size];
            // SAFETY: blob has exactly `size` writable bytes.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    c_key.as_ptr() as *const _,
                    blob.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(blob)
        });

        match result {
            Ok(blob) => {
                let len = blob.len().min(buf.len());
                buf[..len].copy_from_slice(&blob[..len]);
                Ok(len)
            }
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
            Err(e) => {
                warn!("NvsAdapter: read {} failed ({})", key, e);
                Err(StorageError::Io)
            }
        }
    }

    fn write(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let c_key = Self::c_key(&nvs_key(key)?);
        let result = Self::with_nvs_handle(true, |handle| {
            // SAFETY: data is valid for data.len() bytes for the call.
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    c_key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
            Err(e) => {
                warn!("NvsAdapter: write {} failed ({})", key, e);
                Err(StorageError::Io)
            }
        }
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        let c_key = Self::c_key(&nvs_key(key)?);
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe { nvs_erase_key(handle, c_key.as_ptr() as *const _) };
            if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|_| StorageError::Io)
    }

    fn exists(&self, key: &str) -> bool {
        let Ok(k) = nvs_key(key) else {
            return false;
        };
        let c_key = Self::c_key(&k);
        let result = Self::with_nvs_handle(false, |handle| {
            let ret =
                unsafe { nvs_find_key(handle, c_key.as_ptr() as *const _, core::ptr::null_mut()) };
            Ok(ret == ESP_OK)
        });
        result.unwrap_or(false)
    }
}
