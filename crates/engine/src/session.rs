//! Durable storage for `SessionState`
//!
//! The session is read once when the engine opens and written back after
//! each change the engine makes; algorithms never read it from disk mid-way.
//! An ephemeral store keeps nothing on disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use hearthshare_core::{Error, PersistedSession, Result, SessionState};

/// Session file name placed in the data directory.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Key-value file backing the session
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Store backed by `dir/session.json`
    pub fn open(dir: &Path) -> Self {
        Self {
            path: Some(dir.join(SESSION_FILE_NAME)),
        }
    }

    /// Store that persists nothing
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    /// Location of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the session; a missing file yields the empty session
    pub fn load(&self) -> Result<SessionState> {
        let Some(path) = &self.path else {
            return Ok(SessionState::default());
        };
        if !path.exists() {
            debug!(target: "hearthshare::session", path = %path.display(), "no session file, starting empty");
            return Ok(SessionState::default());
        }
        let content = std::fs::read_to_string(path)?;
        let persisted: PersistedSession = serde_json::from_str(&content).map_err(|e| {
            Error::Serialization(format!(
                "Failed to parse session file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(SessionState::from(persisted))
    }

    /// Write the session back
    pub fn save(&self, state: &SessionState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&PersistedSession::from(state))
            .map_err(|e| Error::Serialization(format!("Failed to serialize session: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reset every key to empty/false and persist the result
    pub fn reset(&self, state: &mut SessionState) -> Result<()> {
        state.reset();
        self.save(state)?;
        info!(target: "hearthshare::session", "session reset");
        Ok(())
    }
}
