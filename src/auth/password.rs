use anyhow::{Result, anyhow, bail};
use keyring::{Entry, Error as KeyringError};
use std::io::{self, BufRead};

use crate::config::Config;

const SERVICE: &str = "rs_attachment_sync";

/// Save the IMAP password into the OS keyring for the given username
pub fn save_password(username: &str, password: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, username);
    entry?
        .set_password(password)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the IMAP password from the keyring for the given username
pub fn load_password(username: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, username);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Password for `cfg.username`: the configured value (see
/// [`resolve_configured`]) or, when none is configured, the keyring entry.
pub fn resolve_password(cfg: &Config) -> Result<String> {
    match cfg.password.as_deref() {
        Some(value) => {
            let stdin = std::io::stdin();
            resolve_configured(
                value,
                |k| std::env::var(k).ok(),
                &mut stdin.lock(),
                |prompt| rpassword::prompt_password(prompt),
            )
        }
        None => load_password(&cfg.username)?.ok_or_else(|| {
            anyhow!(
                "no password configured for {} and none in the keyring (run set-password)",
                cfg.username
            )
        }),
    }
}

/// `*` asks on the terminal without echo, `-` reads one line from `stdin`,
/// an all upper-case value names an environment variable and is replaced by
/// it when set. Anything else is the password itself.
pub fn resolve_configured(
    value: &str,
    env: impl Fn(&str) -> Option<String>,
    stdin: &mut dyn BufRead,
    prompt: impl FnOnce(&str) -> io::Result<String>,
) -> Result<String> {
    if value == "*" {
        let pw = prompt("IMAP password: ")?;
        if pw.is_empty() {
            bail!("empty password entered");
        }
        return Ok(pw);
    }

    if value == "-" {
        let mut line = String::new();
        stdin.read_line(&mut line)?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            bail!("empty password on stdin");
        }
        return Ok(line.to_string());
    }

    // don't overwrite if variable does not exist (the password may just be upper case)
    if !value.is_empty()
        && value == value.to_uppercase()
        && let Some(v) = env(value)
    {
        return Ok(v);
    }
    Ok(value.to_string())
}
