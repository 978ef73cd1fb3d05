//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

use subsplease_core::catalog::{BotSource, default_bots};
use subsplease_core::orchestrator::MAX_CONCURRENCY;

const APP_DIR: &str = "subsplease-dl";

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    /// IRC server host.
    pub(crate) server: Option<String>,
    /// IRC server port.
    pub(crate) port: Option<u16>,
    /// Channel the bots sit in.
    pub(crate) channel: Option<String>,
    /// Nickname to register with.
    pub(crate) nickname: Option<String>,
    /// Default output directory.
    pub(crate) output_dir: Option<PathBuf>,
    /// Concurrent DCC transfers.
    pub(crate) concurrency: Option<u8>,
    /// Title similarity cutoff.
    pub(crate) cutoff: Option<f64>,
    pub(crate) register_timeout_secs: Option<u64>,
    pub(crate) reply_timeout_secs: Option<u64>,
    pub(crate) resume_timeout_secs: Option<u64>,
    pub(crate) idle_timeout_secs: Option<u64>,
    /// Bot roster replacing the default one.
    pub(crate) bots: Option<Vec<BotEntry>>,
}

/// One `[[bots]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BotEntry {
    pub(crate) name: String,
    pub(crate) packlist_url: Option<Url>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=MAX_CONCURRENCY).contains(&usize::from(concurrency))
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: 1..={MAX_CONCURRENCY}"
            );
        }
        if let Some(cutoff) = self.cutoff
            && !(0.0..=1.0).contains(&cutoff)
        {
            bail!("Invalid config value for `cutoff`: {cutoff}. Expected range: 0.0..=1.0");
        }
        if let Some(channel) = &self.channel
            && !channel.starts_with(['#', '&'])
        {
            bail!("Invalid config value for `channel`: '{channel}'. Expected a channel name");
        }
        if let Some(nickname) = &self.nickname
            && (nickname.is_empty() || nickname.contains(char::is_whitespace))
        {
            bail!("Invalid config value for `nickname`: '{nickname}'");
        }
        validate_timeout_secs("register_timeout_secs", self.register_timeout_secs)?;
        validate_timeout_secs("reply_timeout_secs", self.reply_timeout_secs)?;
        validate_timeout_secs("resume_timeout_secs", self.resume_timeout_secs)?;
        validate_timeout_secs("idle_timeout_secs", self.idle_timeout_secs)?;
        if let Some(bots) = &self.bots
            && bots.iter().any(|bot| bot.name.trim().is_empty())
        {
            bail!("Invalid config value for `bots`: every bot needs a name");
        }
        Ok(())
    }

    /// Configured bot roster, or the default one.
    pub(crate) fn bot_sources(&self) -> Vec<BotSource> {
        match &self.bots {
            Some(bots) => bots
                .iter()
                .map(|entry| {
                    let source = BotSource::new(entry.name.trim());
                    match &entry.packlist_url {
                        Some(url) => source.with_packlist_url(url.clone()),
                        None => source,
                    }
                })
                .collect(),
            None => default_bots(),
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub(crate) struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub(crate) path: Option<PathBuf>,
    /// Parsed file config, or defaults when no file exists.
    pub(crate) config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub(crate) loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/subsplease-dl/config.toml`
/// 2. `$HOME/.config/subsplease-dl/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub(crate) fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let config = parse_config_str("server = \"irc.example.org\"\nconcurrency = 2\n").unwrap();
        assert_eq!(config.server.as_deref(), Some("irc.example.org"));
        assert_eq!(config.concurrency, Some(2));
        assert!(config.port.is_none());
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        let config = parse_config_str("").unwrap();
        assert!(config.server.is_none());
        assert_eq!(config.bot_sources().len(), 5);
    }

    #[test]
    fn test_parse_config_bots_table() {
        let raw = r#"
[[bots]]
name = "CR-HOLLAND|NEW"

[[bots]]
name = "ARUTHA-BATCH|1080p"
packlist_url = "https://example.org/arutha.txt"
"#;
        let config = parse_config_str(raw).unwrap();
        let bots = config.bot_sources();
        assert_eq!(bots.len(), 2);
        assert_eq!(bots[0].name, "CR-HOLLAND|NEW");
        assert!(bots[0].packlist_url.is_none());
        assert_eq!(
            bots[1].packlist_url.as_ref().map(Url::as_str),
            Some("https://example.org/arutha.txt")
        );
    }

    #[test]
    fn test_parse_config_unknown_key_rejected() {
        let err = parse_config_str("rate_limit = 5\n").unwrap_err();
        assert!(err.to_string().contains("rate_limit"), "{err}");
    }

    #[test]
    fn test_parse_config_syntax_error_reports_line() {
        let err = parse_config_str("server = \"a\"\nport = \n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_parse_config_out_of_range_values() {
        assert!(parse_config_str("concurrency = 4").is_err());
        assert!(parse_config_str("cutoff = 1.5").is_err());
        assert!(parse_config_str("reply_timeout_secs = 0").is_err());
        assert!(parse_config_str("channel = \"subsplease\"").is_err());
        assert!(parse_config_str("nickname = \"two words\"").is_err());
    }
}
