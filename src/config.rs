use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::platform::telegram::DEFAULT_API_BASE;
use crate::token::CipherKey;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_telegram_config")]
    pub telegram: TelegramConfig,
    #[serde(default = "default_crypto_config")]
    pub crypto: CryptoConfig,
    #[serde(default = "default_dispatch_config")]
    pub dispatch: DispatchConfig,
    #[serde(default = "default_counter_config")]
    pub counter: CounterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// File holding the bot credential, read as text and trimmed.
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CryptoConfig {
    /// File holding the raw symmetric key bytes (16, 24, or 32).
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    /// `true` pins the IV to the zero block: the same chat always yields
    /// the same token and therefore a stable counter key, while identical
    /// identities produce identical ciphertexts. `false` draws a fresh IV
    /// per encode, and counting degrades to per-encode counting.
    #[serde(default = "default_deterministic_iv")]
    pub deterministic_iv: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Fixed notification text sent on every attempt.
    #[serde(default = "default_message")]
    pub message: String,
    /// Upper bound on per-request notification attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between consecutive attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CounterConfig {
    #[serde(default = "default_counter_path")]
    pub path: PathBuf,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("bot.token")
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_key_file() -> PathBuf {
    PathBuf::from("encryption.key")
}

fn default_deterministic_iv() -> bool {
    true
}

fn default_message() -> String {
    "Your Solo Shuffle is ready.".to_string()
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_counter_path() -> PathBuf {
    PathBuf::from("counter.json")
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind_addr: default_bind_addr(),
    }
}

fn default_telegram_config() -> TelegramConfig {
    TelegramConfig {
        token_file: default_token_file(),
        api_base: default_api_base(),
    }
}

fn default_crypto_config() -> CryptoConfig {
    CryptoConfig {
        key_file: default_key_file(),
        deterministic_iv: default_deterministic_iv(),
    }
}

fn default_dispatch_config() -> DispatchConfig {
    DispatchConfig {
        message: default_message(),
        max_retries: default_max_retries(),
        retry_delay_ms: default_retry_delay_ms(),
    }
}

fn default_counter_config() -> CounterConfig {
    CounterConfig {
        path: default_counter_path(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

impl TelegramConfig {
    /// Read and trim the bot credential. A missing or empty file is fatal;
    /// the service never starts with a placeholder credential.
    pub fn load_bot_token(&self) -> Result<String> {
        let raw = std::fs::read_to_string(&self.token_file).with_context(|| {
            format!("Failed to read bot token file: {}", self.token_file.display())
        })?;
        let token = raw.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("Bot token file is empty: {}", self.token_file.display());
        }
        Ok(token)
    }
}

impl CryptoConfig {
    /// Read the symmetric key as raw bytes. There is no fallback key; a
    /// missing file or a length other than 16/24/32 aborts startup.
    pub fn load_key(&self) -> Result<CipherKey> {
        let bytes = std::fs::read(&self.key_file)
            .with_context(|| format!("Failed to read key file: {}", self.key_file.display()))?;
        let key = CipherKey::from_bytes(&bytes)
            .with_context(|| format!("Invalid key in {}", self.key_file.display()))?;
        Ok(key)
    }
}
