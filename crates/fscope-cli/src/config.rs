//! Startup configuration: built-in defaults, optional JSON config file,
//! CLI flags on top.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Resolved settings after merging defaults, config file, and flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub descriptors: PathBuf,
    pub alternate: Option<PathBuf>,
    /// `None` disables change logging.
    pub log_file: Option<PathBuf>,
    /// Whether `enablewrite` may be used at all.
    pub allow_changes: bool,
    pub allow_mounted_read: bool,
    /// Proceed with fallback geometry when autodetection fails.
    pub force_ext2: bool,
    /// Skip autodetection entirely.
    pub force_default: bool,
    pub block_size: u64,
    pub total_blocks: u64,
    pub blocks_per_group: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            descriptors: PathBuf::from("fscope.descriptors"),
            alternate: None,
            log_file: Some(PathBuf::from("fscope.log")),
            allow_changes: false,
            allow_mounted_read: false,
            force_ext2: false,
            force_default: false,
            block_size: 1024,
            total_blocks: 2097151,
            blocks_per_group: 8192,
        }
    }
}

/// On-disk config file shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub descriptors: Option<PathBuf>,
    pub alternate: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub allow_changes: Option<bool>,
    pub allow_mounted_read: Option<bool>,
    pub force_ext2: Option<bool>,
    pub force_default: Option<bool>,
    pub block_size: Option<u64>,
    pub total_blocks: Option<u64>,
    pub blocks_per_group: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<ConfigFile> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file `{}`", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("malformed config file `{}`", path.display()))
    }

    pub fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.descriptors {
            settings.descriptors = v;
        }
        if let Some(v) = self.alternate {
            settings.alternate = Some(v);
        }
        if let Some(v) = self.log_file {
            settings.log_file = Some(v);
        }
        if let Some(v) = self.allow_changes {
            settings.allow_changes = v;
        }
        if let Some(v) = self.allow_mounted_read {
            settings.allow_mounted_read = v;
        }
        if let Some(v) = self.force_ext2 {
            settings.force_ext2 = v;
        }
        if let Some(v) = self.force_default {
            settings.force_default = v;
        }
        if let Some(v) = self.block_size {
            settings.block_size = v;
        }
        if let Some(v) = self.total_blocks {
            settings.total_blocks = v;
        }
        if let Some(v) = self.blocks_per_group {
            settings.blocks_per_group = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_overrides_defaults_field_by_field() {
        let mut settings = Settings::default();
        let file: ConfigFile = serde_json::from_str(
            r#"{ "allow_changes": true, "block_size": 4096, "log_file": "audit.log" }"#,
        )
        .unwrap();
        file.apply(&mut settings);

        assert!(settings.allow_changes);
        assert_eq!(settings.block_size, 4096);
        assert_eq!(settings.log_file, Some(PathBuf::from("audit.log")));
        // Untouched fields keep their defaults.
        assert_eq!(settings.blocks_per_group, 8192);
        assert!(!settings.force_ext2);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let parsed: Result<ConfigFile, _> = serde_json::from_str(r#"{ "blocksize": 1 }"#);
        assert!(parsed.is_err());
    }
}
