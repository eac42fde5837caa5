//! Relayer configuration
//!
//! Read from environment variables, with a `.env` file loaded first when
//! present. Any parse or validation failure is fatal before the relay loop
//! starts.

use alloy::primitives::{Address, B256};
use alloy::sol_types::SolEvent;
use eyre::{eyre, Result, WrapErr};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::chain::Credential;
use crate::contracts::TokensLocked;
use crate::redact::Redacted;
use crate::relay::{InitialScanBlock, RelaySettings};
use crate::retry::RetryConfig;

/// Where the destination signing key comes from
#[derive(Clone)]
pub enum CredentialSource {
    Inline(Redacted<String>),
    File(PathBuf),
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Inline(_) => f.write_str("Inline(<redacted>)"),
            CredentialSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Cursor persistence backend
#[derive(Debug, Clone)]
pub enum CursorBackend {
    File { dir: PathBuf },
    /// Database URL may carry credentials
    Postgres { database_url: Redacted<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source_rpc_url: String,
    pub destination_rpc_url: String,
    pub source_contract: String,
    pub destination_contract: String,
    /// Event signature or bare event name
    pub event_signature: String,
    pub polling_interval_seconds: u64,
    pub max_blocks_per_scan: u64,
    pub initial_scan_block: InitialScanBlock,
    pub credential: CredentialSource,
    pub dry_run: bool,
    /// Blocks behind head that are treated as head
    pub confirmations: u64,
    pub gas_limit: u64,
    pub shrink_on_reject: bool,
    /// Cursor key; derived from the chain ids when unset
    pub pair_id: Option<String>,
    pub cursor_backend: CursorBackend,
    pub health_bind_address: String,
    pub health_port: u16,
    pub log_format: LogFormat,
}

fn default_event_signature() -> &'static str {
    TokensLocked::SIGNATURE
}

fn default_polling_interval_seconds() -> u64 {
    30
}

fn default_max_blocks_per_scan() -> u64 {
    100
}

fn default_gas_limit() -> u64 {
    2_000_000
}

fn default_health_port() -> u16 {
    9099
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let credential = match (
            optional("RELAYER_PRIVATE_KEY"),
            optional("RELAYER_PRIVATE_KEY_FILE"),
        ) {
            (Some(_), Some(_)) => {
                return Err(eyre!(
                    "Set only one of RELAYER_PRIVATE_KEY and RELAYER_PRIVATE_KEY_FILE"
                ))
            }
            (Some(key), None) => CredentialSource::Inline(Redacted(key)),
            (None, Some(path)) => CredentialSource::File(PathBuf::from(path)),
            (None, None) => {
                return Err(eyre!(
                    "RELAYER_PRIVATE_KEY or RELAYER_PRIVATE_KEY_FILE environment variable is required"
                ))
            }
        };

        let cursor_backend = match optional("CURSOR_STORE")
            .unwrap_or_else(|| "file".to_string())
            .to_lowercase()
            .as_str()
        {
            "file" => CursorBackend::File {
                dir: PathBuf::from(optional("CURSOR_DIR").unwrap_or_else(|| ".".to_string())),
            },
            "postgres" => CursorBackend::Postgres {
                database_url: Redacted(required("DATABASE_URL").wrap_err(
                    "DATABASE_URL is required when CURSOR_STORE=postgres",
                )?),
            },
            other => {
                return Err(eyre!(
                    "CURSOR_STORE must be \"file\" or \"postgres\", got {:?}",
                    other
                ))
            }
        };

        let log_format = match optional("LOG_FORMAT")
            .unwrap_or_else(|| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => return Err(eyre!("LOG_FORMAT must be \"text\" or \"json\", got {:?}", other)),
        };

        let config = Config {
            source_rpc_url: required("SOURCE_RPC_URL")?,
            destination_rpc_url: required("DESTINATION_RPC_URL")?,
            source_contract: required("SOURCE_CONTRACT")?,
            destination_contract: required("DESTINATION_CONTRACT")?,
            event_signature: optional("EVENT_SIGNATURE")
                .unwrap_or_else(|| default_event_signature().to_string()),
            polling_interval_seconds: parse_or(
                "POLLING_INTERVAL_SECONDS",
                default_polling_interval_seconds(),
            )?,
            max_blocks_per_scan: parse_or("MAX_BLOCKS_PER_SCAN", default_max_blocks_per_scan())?,
            initial_scan_block: parse_or("INITIAL_SCAN_BLOCK", InitialScanBlock::Latest)?,
            credential,
            dry_run: parse_bool_or("DRY_RUN", true)?,
            confirmations: parse_or("CONFIRMATIONS", 0)?,
            gas_limit: parse_or("GAS_LIMIT", default_gas_limit())?,
            shrink_on_reject: parse_bool_or("SHRINK_ON_REJECT", true)?,
            pair_id: optional("PAIR_ID"),
            cursor_backend,
            health_bind_address: optional("HEALTH_BIND_ADDRESS")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            health_port: parse_or("HEALTH_PORT", default_health_port())?,
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("SOURCE_RPC_URL", &self.source_rpc_url),
            ("DESTINATION_RPC_URL", &self.destination_rpc_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(eyre!("{} must be an http(s) URL", name));
            }
        }

        parse_address("SOURCE_CONTRACT", &self.source_contract)?;
        parse_address("DESTINATION_CONTRACT", &self.destination_contract)?;
        self.event_topic()?;

        if self.polling_interval_seconds == 0 {
            return Err(eyre!("POLLING_INTERVAL_SECONDS must be greater than 0"));
        }
        if self.max_blocks_per_scan == 0 {
            return Err(eyre!("MAX_BLOCKS_PER_SCAN must be greater than 0"));
        }
        if self.gas_limit == 0 {
            return Err(eyre!("GAS_LIMIT must be greater than 0"));
        }
        if let Some(id) = &self.pair_id {
            if id.trim().is_empty() {
                return Err(eyre!("PAIR_ID cannot be empty"));
            }
            if !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(eyre!(
                    "PAIR_ID may only contain letters, digits, '-' and '_', got {:?}",
                    id
                ));
            }
        }

        Ok(())
    }

    pub fn source_contract_address(&self) -> Result<Address> {
        parse_address("SOURCE_CONTRACT", &self.source_contract)
    }

    pub fn destination_contract_address(&self) -> Result<Address> {
        parse_address("DESTINATION_CONTRACT", &self.destination_contract)
    }

    /// topic0 of the watched event.
    ///
    /// Only `TokensLocked` is decodable, so any other signature is rejected
    /// here rather than producing logs that would all fail to decode.
    pub fn event_topic(&self) -> Result<B256> {
        let normalized: String = self
            .event_signature
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if normalized == "TokensLocked" || normalized == TokensLocked::SIGNATURE {
            Ok(TokensLocked::SIGNATURE_HASH)
        } else {
            Err(eyre!(
                "EVENT_SIGNATURE {:?} is not supported; expected {}",
                self.event_signature,
                TokensLocked::SIGNATURE
            ))
        }
    }

    /// Parse the signing credential. Errors never include key material.
    pub fn load_credential(&self) -> Result<Credential> {
        match &self.credential {
            CredentialSource::Inline(key) => {
                Credential::from_hex(key).wrap_err("RELAYER_PRIVATE_KEY is not a valid key")
            }
            CredentialSource::File(path) => Credential::from_file(path)
                .wrap_err_with(|| format!("RELAYER_PRIVATE_KEY_FILE {} is unusable", path.display())),
        }
    }

    pub fn relay_settings(&self) -> Result<RelaySettings> {
        Ok(RelaySettings {
            poll_interval: Duration::from_secs(self.polling_interval_seconds),
            max_blocks_per_scan: self.max_blocks_per_scan,
            confirmations: self.confirmations,
            initial_scan_block: self.initial_scan_block,
            shrink_on_reject: self.shrink_on_reject,
            event_signature: self.event_topic()?,
            retry: RetryConfig::default(),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| eyre!("{} environment variable is required", name))
}

fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| eyre!("{} has an invalid value {:?}: {}", name, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool_or(name: &str, default: bool) -> Result<bool> {
    match optional(name).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(eyre!("{} must be true or false, got {:?}", name, v)),
        },
    }
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    if value.len() != 42 || !value.starts_with("0x") {
        return Err(eyre!(
            "{} must be a valid hex address (42 chars with 0x prefix)",
            name
        ));
    }
    value
        .parse()
        .map_err(|e| eyre!("{} is not a valid address: {}", name, e))
}
