// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable flat key-value storage: a JSON object file with atomic writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Address of the Alexa voice agent's binder.
pub const KEY_ALEXA_VA_ADDRESS: &str = "alexa_va_address";
pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";

const STORE_FILE: &str = "storage.json";

/// Fallback state directory when none is configured: `$XDG_STATE_HOME/vshl`,
/// then `$HOME/.local/state/vshl`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("vshl");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/vshl");
    }
    PathBuf::from(".vshl")
}

/// Process-wide string store that survives restarts.
///
/// Writes go through to disk immediately. There is no locking across
/// processes; within one process the map is guarded by a mutex.
pub struct TokenStore {
    path: Option<PathBuf>,
    values: Mutex<BTreeMap<String, String>>,
}

impl TokenStore {
    /// Open (or create on first write) `storage.json` under `dir`.
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(STORE_FILE);
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path: Some(path), values: Mutex::new(values) })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self { path: None, values: Mutex::new(BTreeMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_owned(), value.to_owned());
        self.save(&values)
    }

    /// Store a token pair in one write. A missing refresh token keeps the
    /// previous one.
    pub fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        values.insert(KEY_ACCESS_TOKEN.to_owned(), access_token.to_owned());
        if let Some(rt) = refresh_token {
            values.insert(KEY_REFRESH_TOKEN.to_owned(), rt.to_owned());
        }
        self.save(&values)
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(KEY_ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get(KEY_REFRESH_TOKEN)
    }

    /// Both tokens present: a refresh can be attempted instead of a login.
    pub fn has_tokens(&self) -> bool {
        let values = self.values.lock();
        values.contains_key(KEY_ACCESS_TOKEN) && values.contains_key(KEY_REFRESH_TOKEN)
    }

    pub fn clear_tokens(&self) -> anyhow::Result<()> {
        let mut values = self.values.lock();
        let had_access = values.remove(KEY_ACCESS_TOKEN).is_some();
        let had_refresh = values.remove(KEY_REFRESH_TOKEN).is_some();
        if had_access || had_refresh {
            self.save(&values)?;
        }
        Ok(())
    }

    /// Write tmp + rename so a crash never leaves a truncated file.
    fn save(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(values)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
