use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

pub const APP_NAME: &str = "binrel";
pub const CONFIG_FILE_NAME: &str = "config.json";

pub const CONFIG_ENV: &str = "BINREL_CONFIG";
pub const TOKEN_ENV: &str = "BINREL_TOKEN";
pub const API_URL_ENV: &str = "BINREL_API_URL";
pub const UPLOAD_URL_ENV: &str = "BINREL_UPLOAD_URL";
pub const WEB_URL_ENV: &str = "BINREL_WEB_URL";

/// A token starting with this character is a shell command printing the token
pub const TOKEN_COMMAND_PREFIX: char = '!';

/// Optional on-disk settings; every key may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Settings for one invocation, fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub token: Option<String>,
    pub dry_run: bool,
    pub api_url: String,
    pub upload_url: String,
    pub web_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            dry_run: false,
            api_url: "https://api.github.com".to_string(),
            upload_url: "https://uploads.github.com".to_string(),
            web_url: "https://github.com".to_string(),
        }
    }
}

impl Settings {
    /// Flag, then environment, then config file, then defaults.
    pub fn load(cli_token: Option<&str>, dry_run: bool) -> Result<Self> {
        let file = match get_config_file_path() {
            Some(path) => load_file_settings(&path)?,
            None => FileSettings::default(),
        };
        let settings = Self::layer(file, |key| std::env::var(key).ok(), cli_token, dry_run);

        Ok(Self {
            token: resolve_token(settings.token)?,
            ..settings
        })
    }

    /// Merge the sources without running a token command.
    pub fn layer(
        file: FileSettings,
        env: impl Fn(&str) -> Option<String>,
        cli_token: Option<&str>,
        dry_run: bool,
    ) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, file_value: Option<String>, default: String| {
            env(key)
                .filter(|v| !v.is_empty())
                .or(file_value)
                .unwrap_or(default)
        };

        let token = cli_token
            .map(str::to_string)
            .filter(|t| !t.is_empty())
            .or_else(|| env(TOKEN_ENV).filter(|t| !t.is_empty()))
            .or(file.token);

        Self {
            token,
            dry_run,
            api_url: pick(API_URL_ENV, file.api_url, defaults.api_url),
            upload_url: pick(UPLOAD_URL_ENV, file.upload_url, defaults.upload_url),
            web_url: pick(WEB_URL_ENV, file.web_url, defaults.web_url),
        }
    }
}

pub fn get_config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let path = dirs::config_dir()?.join(APP_NAME).join(CONFIG_FILE_NAME);
    tracing::debug!("Config file path: {}", path.display());
    Some(path)
}

pub fn load_file_settings(path: &std::path::Path) -> Result<FileSettings> {
    if !path.exists() {
        return Ok(FileSettings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read config file at {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Could not parse config file {} as JSON", path.display()))
}

/// Run `!command` tokens through the shell; pass other tokens through.
pub fn resolve_token(token: Option<String>) -> Result<Option<String>> {
    let Some(token) = token else {
        return Ok(None);
    };
    let Some(command) = token.strip_prefix(TOKEN_COMMAND_PREFIX) else {
        return Ok(Some(token));
    };

    tracing::debug!("Running token command");
    let output = shell(command)
        .output()
        .with_context(|| format!("Could not run token command: {}", command))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "token command failed ({}): {}",
            output.status,
            stderr.lines().next().unwrap_or("").trim()
        ));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!token.is_empty()).then_some(token))
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.args(["-c", command]);
        cmd
    }
}
