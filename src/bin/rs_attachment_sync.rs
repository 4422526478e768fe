use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rs_attachment_sync::auth::password;
use rs_attachment_sync::config::load_config;
use rs_attachment_sync::mail::imap_client::ImapClient;
use rs_attachment_sync::storage::AttachmentWriter;
use rs_attachment_sync::store::json::JsonProcessedStore;
use rs_attachment_sync::store::repo::ProcessedRepository;
use rs_attachment_sync::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "rs_attachment_sync")]
#[command(about = "Download attachments of new IMAP messages", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/rs_attachment_sync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every unprocessed message and store its attachments
    Sync {
        /// Folder to scan instead of the configured one
        #[arg(long)]
        folder: Option<String>,
    },

    /// Store the IMAP password in the keyring
    SetPassword {
        /// Defaults to the configured username
        #[arg(long)]
        username: Option<String>,
    },

    /// Show how many messages are recorded as processed
    Status,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetPassword { username } => {
            let username = match username {
                Some(u) => u,
                None => {
                    load_config(cli.config.as_deref())
                        .map_err(|e| anyhow!("Configuration error: {e:#}"))?
                        .username
                }
            };
            eprintln!("Paste password for {username} (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            password::save_password(&username, secret.trim())?;
            println!("Saved password for {}", username);
            Ok(())
        }

        Command::Status => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e:#}"))?;
            let store = JsonProcessedStore::new(&cfg.state_file);
            let set = store.load()?;
            println!(
                "{}: {} processed message(s)",
                store.path().display(),
                set.len()
            );
            Ok(())
        }

        Command::Sync { folder } => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(|e| anyhow!("Configuration error: {e:#}"))?;
            cfg.check_server_resolves()?;
            let folder = folder.unwrap_or_else(|| cfg.target_folder.clone());
            let pw = password::resolve_password(&cfg)?;

            let store = JsonProcessedStore::new(&cfg.state_file);
            let writer = AttachmentWriter::new(&cfg.storage_root);
            let engine = SyncEngine::new(&store, &writer);

            let mut session = ImapClient::from_config(&cfg).connect(&pw)?;
            let summary = engine.run(session.as_mut(), &folder);
            if let Err(e) = session.logout() {
                log::warn!("logout failed: {e}");
            }
            let summary = summary?;

            println!(
                "{folder}: {} message(s), {} new, {} already processed, {} failed, {} attachment(s) saved",
                summary.total,
                summary.processed,
                summary.already_processed,
                summary.failed,
                summary.attachments_written
            );
            Ok(())
        }
    }
}
