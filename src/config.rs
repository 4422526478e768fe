use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "rs_attachment_sync";
const ENV_PREFIX: &str = "RS_ATTACHMENT_SYNC_";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub username: String,
    /// Literal password, `-` to read it from stdin, or the name of an
    /// environment variable (all upper case). Unset means the OS keyring.
    pub password: Option<String>,
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub target_folder: String,
    /// JSON array of UIDs already handled.
    pub state_file: PathBuf,
    /// Attachments land in `<storage_root>/<sender>/`.
    pub storage_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            server: String::new(),
            port: 993,
            use_tls: true,
            target_folder: "INBOX".to_string(),
            state_file: PathBuf::from("data/processed.json"),
            storage_root: PathBuf::from("data"),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Override fields from `RS_ATTACHMENT_SYNC_*` variables found by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("USERNAME") {
            self.username = v;
        }
        if let Some(v) = var("PASSWORD") {
            self.password = Some(v);
        }
        if let Some(v) = var("SERVER") {
            self.server = v;
        }
        if let Some(v) = var("PORT") {
            self.port = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PREFIX}PORT is not a port number: {v}"))?;
        }
        if let Some(v) = var("USE_TLS") {
            self.use_tls = parse_bool(&v)
                .ok_or_else(|| anyhow!("{ENV_PREFIX}USE_TLS must be true or false, got {v}"))?;
        }
        if let Some(v) = var("FOLDER") {
            self.target_folder = v;
        }
        if let Some(v) = var("STATE_FILE") {
            self.state_file = PathBuf::from(v);
        }
        if let Some(v) = var("STORAGE_ROOT") {
            self.storage_root = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username is not set");
        }
        if self.server.trim().is_empty() {
            bail!("server is not set");
        }
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if self.target_folder.trim().is_empty() {
            bail!("target_folder is not set");
        }
        Ok(())
    }

    /// Fails early when the server name does not resolve.
    pub fn check_server_resolves(&self) -> Result<()> {
        let mut addrs = (self.server.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("cannot resolve server {}", self.server))?;
        if addrs.next().is_none() {
            bail!("server {} resolved to no addresses", self.server);
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join(APP_DIR))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load `explicit`, or the default config file. Environment variables win
/// over the file.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_from(path);
    }

    let path = config_path()?;
    if path.exists() {
        return load_from(&path);
    }

    // no file: the environment alone may be enough
    let mut cfg = Config::default();
    cfg.apply_env(env_lookup)?;
    if cfg.validate().is_ok() {
        return Ok(cfg);
    }

    // create a template config for users to edit
    let sample = Config {
        username: "you@example.com".to_string(),
        password: Some("IMAP_PASSWORD".to_string()),
        server: "imap.example.com".to_string(),
        ..Config::default()
    };
    fs::write(&path, toml::to_string_pretty(&sample)?)?;
    bail!(
        "Created template config at {} (edit it and run again)",
        path.display()
    )
}

fn load_from(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let mut cfg = Config::from_toml_str(&s)
        .with_context(|| format!("invalid config {}", path.display()))?;
    cfg.apply_env(env_lookup)?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
