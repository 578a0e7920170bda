//! Daemon configuration
//!
//! Settings come from `PROMPTRELAY_*` environment variables (a `.env` file is
//! loaded first). Parsing is a pure function over a key lookup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use promptrelay_api_rpc::server::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};
use promptrelay_infra_browser::ChromeOptions;

const DEFAULT_PROFILE_ROOT: &str = "~/.promptrelay/profiles";
const DEFAULT_DIAGNOSTICS_DIR: &str = "~/.promptrelay/diagnostics";
const DEFAULT_CHROME_PATH: &str = "google-chrome";
const DEFAULT_DEVTOOLS_URL: &str = "http://127.0.0.1:9222";
const DEFAULT_BRIDGE_URL: &str = "ws://127.0.0.1:8765";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One dedicated browser per platform
    Persistent,
    /// The end-user's browser, driven through the relay
    Bridge,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(Backend::Persistent),
            "bridge" => Ok(Backend::Bridge),
            other => bail!("unknown backend '{}' (expected persistent or bridge)", other),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Persistent => f.write_str("persistent"),
            Backend::Bridge => f.write_str("bridge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub profile_root: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub chrome_path: PathBuf,
    pub headless: bool,
    pub devtools_url: String,
    pub bridge_url: String,
    pub bridge_token: Option<String>,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", key, other),
    }
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys take their defaults
    ///
    /// # Errors
    /// Unknown backend or log format, unparsable port/bool, or bridge mode without a token
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("PROMPTRELAY_BACKEND") {
            Some(value) => value.parse()?,
            None => Backend::Persistent,
        };

        let headless = match get("PROMPTRELAY_HEADLESS") {
            Some(value) => parse_bool("PROMPTRELAY_HEADLESS", &value)?,
            None => false,
        };

        let rpc_port = match get("PROMPTRELAY_RPC_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PROMPTRELAY_RPC_PORT must be a port, got '{}'", value))?,
            None => DEFAULT_RPC_PORT,
        };

        let log_format = match get("PROMPTRELAY_LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("PROMPTRELAY_LOG_FORMAT must be pretty or json, got '{}'", other),
        };

        let bridge_token = get("PROMPTRELAY_BRIDGE_TOKEN");
        if backend == Backend::Bridge && bridge_token.is_none() {
            bail!("PROMPTRELAY_BRIDGE_TOKEN is required when PROMPTRELAY_BACKEND=bridge");
        }

        Ok(Self {
            backend,
            profile_root: expand(
                &get("PROMPTRELAY_PROFILE_ROOT").unwrap_or_else(|| DEFAULT_PROFILE_ROOT.to_string()),
            ),
            diagnostics_dir: expand(
                &get("PROMPTRELAY_DIAGNOSTICS_DIR")
                    .unwrap_or_else(|| DEFAULT_DIAGNOSTICS_DIR.to_string()),
            ),
            chrome_path: expand(
                &get("PROMPTRELAY_CHROME_PATH").unwrap_or_else(|| DEFAULT_CHROME_PATH.to_string()),
            ),
            headless,
            devtools_url: get("PROMPTRELAY_DEVTOOLS_URL")
                .unwrap_or_else(|| DEFAULT_DEVTOOLS_URL.to_string()),
            bridge_url: get("PROMPTRELAY_BRIDGE_URL")
                .unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string()),
            bridge_token,
            rpc_host: get("PROMPTRELAY_RPC_HOST").unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port,
            log_format,
            log_dir: get("PROMPTRELAY_LOG_DIR").map(|dir| expand(&dir)),
        })
    }

    pub fn chrome_options(&self) -> ChromeOptions {
        ChromeOptions {
            executable: self.chrome_path.clone(),
            headless: self.headless,
            extra_args: Vec::new(),
        }
    }
}
