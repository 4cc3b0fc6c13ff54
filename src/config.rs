//! Credential loader for the group-preferences bot.
use crate::ini::{Ini, IniError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Where operators are sent when the credential file is missing or broken.
pub const SETUP_GUIDE: &str = "https://github.com/AryanGHM/telegram-gp-bot";

pub const DEFAULT_PATH: &str = "credentials.ini";

const API_SECTION: &str = "API_CREDS";
const BOT_SECTION: &str = "BOT_CREDS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no credential configuration file found at {path}, visit {} for more information", SETUP_GUIDE)]
    NotFound { path: PathBuf },
    #[error("failed to read credential file {path}: {source}, visit {} for more information", SETUP_GUIDE)]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid credential configuration file: {0}, visit {} for more information", SETUP_GUIDE)]
    Parse(#[from] IniError),
    #[error("invalid credential configuration file: missing [{section}] {key}, visit {} for more information", SETUP_GUIDE)]
    Missing {
        section: &'static str,
        key: &'static str,
    },
    #[error("invalid credential configuration file: {0}, visit {} for more information", SETUP_GUIDE)]
    Invalid(&'static str),
}

/// Telegram credentials, loaded once at startup and passed to whoever needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    api_id: i32,
    api_hash: String,
    bot_token: String,
}

impl Credentials {
    pub fn api_id(&self) -> i32 {
        self.api_id
    }

    pub fn api_hash(&self) -> &str {
        &self.api_hash
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }
}

/// Load credentials from an INI file.
/// - If `path` is None, uses `credentials.ini` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Credentials, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_PATH));
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let creds = parse(&content)?;
    info!(path = %path.display(), api_id = creds.api_id, "loaded credentials");
    Ok(creds)
}

/// Parse and validate credential file content.
pub fn parse(content: &str) -> Result<Credentials, ConfigError> {
    let doc = Ini::parse(content)?;

    let api_id = required(&doc, API_SECTION, "API_ID")?
        .parse::<i32>()
        .map_err(|_| ConfigError::Invalid("API_CREDS.API_ID must be an integer"))?;
    let api_hash = required(&doc, API_SECTION, "API_HASH")?.to_string();
    let bot_token = required(&doc, BOT_SECTION, "BOT_TOKEN")?.to_string();

    Ok(Credentials {
        api_id,
        api_hash,
        bot_token,
    })
}

fn required<'a>(
    doc: &'a Ini,
    section: &'static str,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    doc.get(section, key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { section, key })
}

/// Returns a credential file template.
pub fn example() -> &'static str {
    r#"[API_CREDS]
API_ID = 123456
API_HASH = 0123456789abcdef0123456789abcdef

[BOT_CREDS]
BOT_TOKEN = 123456789:YOUR_TELEGRAM_BOT_TOKEN
"#
}
