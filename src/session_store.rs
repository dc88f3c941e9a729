//! Process-wide session store backed by a flat key-value file.
//!
//! Two keys matter to the app:
//! - `user`: JSON-serialized [`UserProfile`] (written at registration,
//!   updated when the OTP is verified)
//! - `user-language`: the selected UI language code
//!
//! Both are read at startup to decide between onboarding and home. Every
//! write is flushed atomically (temp file + rename) so a crash mid-write
//! never leaves a truncated blob behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use serde::Serialize;

use crate::models::{Language, UserProfile};

pub const USER_KEY: &str = "user";
pub const LANGUAGE_KEY: &str = "user-language";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot encode stored value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Where the app should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialRoute {
    /// No registered user: onboarding → language → registration.
    Onboarding,
    Home,
}

pub struct SessionStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl SessionStore {
    /// Load the store from `path`. A missing file is an empty store; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Local storage unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Raw key-value access ────────────────────────────────

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    // ── Typed accessors ─────────────────────────────────────

    /// The registered user, if any. A corrupt blob reads as "no user".
    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(error = %e, "Stored user blob is malformed");
                None
            }
        }
    }

    pub fn save_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.set(USER_KEY, serde_json::to_string(profile)?)
    }

    /// Flag the stored user as OTP-verified. Returns `false` when no user
    /// is stored.
    pub fn mark_verified(&self) -> Result<bool, StoreError> {
        let Some(mut profile) = self.user() else {
            return Ok(false);
        };
        profile.is_verified = true;
        self.save_user(&profile)?;
        Ok(true)
    }

    /// Selected language; English when unset or unrecognized.
    pub fn language(&self) -> Language {
        self.get(LANGUAGE_KEY)
            .and_then(|code| Language::from_str(&code).ok())
            .unwrap_or_default()
    }

    pub fn set_language(&self, language: Language) -> Result<(), StoreError> {
        self.set(LANGUAGE_KEY, language.as_str().to_string())
    }

    pub fn initial_route(&self) -> InitialRoute {
        if self.get(USER_KEY).is_some() {
            InitialRoute::Home
        } else {
            InitialRoute::Onboarding
        }
    }

    // ── Internal ────────────────────────────────────────────

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}
