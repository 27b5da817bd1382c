//! Engine configuration via `hearthshare.toml`
//!
//! On first open a commented default file is written into the data
//! directory. To change settings, edit the file and reopen.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use hearthshare_core::{Error, Permission, Result, Role};

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "hearthshare.toml";

/// Polling cadence for awaiting shared imports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollConfig {
    /// Attempts for background polling (default 40)
    #[serde(default = "default_background_attempts")]
    pub background_attempts: u32,
    /// Seconds between background attempts (default 15)
    #[serde(default = "default_background_interval_secs")]
    pub background_interval_secs: u64,
    /// Overall timeout while a user is watching (default 120)
    #[serde(default = "default_interactive_timeout_secs")]
    pub interactive_timeout_secs: u64,
    /// Seconds between interactive attempts (default 2)
    #[serde(default = "default_interactive_interval_secs")]
    pub interactive_interval_secs: u64,
}

fn default_background_attempts() -> u32 {
    40
}

fn default_background_interval_secs() -> u64 {
    15
}

fn default_interactive_timeout_secs() -> u64 {
    120
}

fn default_interactive_interval_secs() -> u64 {
    2
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            background_attempts: default_background_attempts(),
            background_interval_secs: default_background_interval_secs(),
            interactive_timeout_secs: default_interactive_timeout_secs(),
            interactive_interval_secs: default_interactive_interval_secs(),
        }
    }
}

/// Retry policy for resolving 6-character share codes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeLookupConfig {
    /// Total lookup attempts (default 3)
    #[serde(default = "default_code_attempts")]
    pub attempts: u32,
    /// Delay between attempts in milliseconds (default 500)
    #[serde(default = "default_code_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_code_attempts() -> u32 {
    3
}

fn default_code_retry_delay_ms() -> u64 {
    500
}

impl Default for CodeLookupConfig {
    fn default() -> Self {
        Self {
            attempts: default_code_attempts(),
            retry_delay_ms: default_code_retry_delay_ms(),
        }
    }
}

impl CodeLookupConfig {
    /// Delay between attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Display defaults for a contributor created without user input
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleDefaults {
    /// Default display name
    pub display_name: String,
    /// Default color tag
    pub color_tag: String,
}

fn default_role_a() -> RoleDefaults {
    RoleDefaults {
        display_name: "Grandparent A".to_string(),
        color_tag: "blue".to_string(),
    }
}

fn default_role_b() -> RoleDefaults {
    RoleDefaults {
        display_name: "Grandparent B".to_string(),
        color_tag: "rose".to_string(),
    }
}

/// Engine configuration loaded from `hearthshare.toml`.
///
/// # Example
///
/// ```toml
/// primary_role = "A"
/// co_owner_role = "B"
/// share_permission = "read_write"
///
/// [poll]
/// background_attempts = 40
/// background_interval_secs = 15
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Canonical role of the primary owner
    #[serde(default = "default_primary_role")]
    pub primary_role: Role,
    /// Canonical role of an invited co-owner
    #[serde(default = "default_co_owner_role")]
    pub co_owner_role: Role,
    /// Public permission given to newly created shares
    #[serde(default = "default_share_permission")]
    pub share_permission: Permission,
    /// Defaults for role A contributors
    #[serde(default = "default_role_a")]
    pub role_a: RoleDefaults,
    /// Defaults for role B contributors
    #[serde(default = "default_role_b")]
    pub role_b: RoleDefaults,
    /// Polling cadence
    #[serde(default)]
    pub poll: PollConfig,
    /// Share code lookup retries
    #[serde(default)]
    pub code_lookup: CodeLookupConfig,
}

fn default_primary_role() -> Role {
    Role::A
}

fn default_co_owner_role() -> Role {
    Role::B
}

fn default_share_permission() -> Permission {
    Permission::ReadWrite
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            primary_role: default_primary_role(),
            co_owner_role: default_co_owner_role(),
            share_permission: default_share_permission(),
            role_a: default_role_a(),
            role_b: default_role_b(),
            poll: PollConfig::default(),
            code_lookup: CodeLookupConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Display defaults for a role
    pub fn role_defaults(&self, role: Role) -> &RoleDefaults {
        match role {
            Role::A => &self.role_a,
            Role::B => &self.role_b,
        }
    }

    /// Check values that would make the engine misbehave
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for identical canonical roles, zero poll
    /// intervals or attempts, or zero code lookup attempts.
    pub fn validate(&self) -> Result<()> {
        if self.primary_role == self.co_owner_role {
            return Err(Error::InvalidConfig(format!(
                "primary_role and co_owner_role are both \"{}\"; they must differ",
                self.primary_role
            )));
        }
        if self.poll.background_attempts == 0 || self.poll.background_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "poll.background_attempts and poll.background_interval_secs must be non-zero"
                    .to_string(),
            ));
        }
        if self.poll.interactive_timeout_secs == 0 || self.poll.interactive_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "poll.interactive_timeout_secs and poll.interactive_interval_secs must be non-zero"
                    .to_string(),
            ));
        }
        if self.code_lookup.attempts == 0 {
            return Err(Error::InvalidConfig(
                "code_lookup.attempts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Hearthshare configuration
#
# Canonical contributor roles: "A" or "B"; they must differ.
primary_role = "A"
co_owner_role = "B"

# Permission for new shares: "read_write", "read_only" or "none".
# Invitations to "none" shares cannot be joined by code or link.
share_permission = "read_write"

[role_a]
display_name = "Grandparent A"
color_tag = "blue"

[role_b]
display_name = "Grandparent B"
color_tag = "rose"

# Waiting for an accepted invitation to show up.
[poll]
background_attempts = 40          # ~10 minutes at 15 s
background_interval_secs = 15
interactive_timeout_secs = 120    # while a spinner is showing
interactive_interval_secs = 2

# Resolving 6-character share codes into links.
[code_lookup]
attempts = 3
retry_delay_ms = 500
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
