#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI exporting an IMAP mailbox to disk (read-only)

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use mailbox_export::{
    ALL_FOLDERS, ExportSummary, FsSink, MailboxExporter, MailboxProvider, RetrievalConfig,
    RetrievalConfigBuilder, StartingPoint, TraversalOrder,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailbox-export")]
#[command(about = "Export every message of an IMAP mailbox to disk, read-only")]
/// Every setting can also come from `IMAP_*` environment variables or a
/// `.env` file; flags win over both.
struct Args {
    /// Mail provider preset [default: from IMAP_HOST/IMAP_PORT/IMAP_SECURE, else gmail]
    #[arg(long, value_enum)]
    provider: Option<Provider>,

    /// IMAP host (required for the custom provider)
    #[arg(long)]
    host: Option<String>,

    /// IMAP port
    #[arg(long)]
    port: Option<u16>,

    /// Connect over plain TCP instead of TLS
    #[arg(long)]
    insecure: bool,

    /// Folder to export, with its subfolders [default: IMAP_FOLDER, else INBOX]
    #[arg(long, conflicts_with = "all_folders")]
    folder: Option<String>,

    /// Export every folder of the mailbox
    #[arg(long)]
    all_folders: bool,

    /// Stop after this many messages
    #[arg(long)]
    max_messages: Option<u32>,

    /// First message number to export in every folder
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    start_at: u32,

    /// Visit folders in the legacy stack order instead of pre-order
    #[arg(long)]
    legacy_order: bool,

    /// Directory the messages are written to
    #[arg(long, default_value = "/tmp/emails")]
    output: PathBuf,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Gmail,
    ProtonBridge,
    Custom,
}

impl Args {
    /// The preset named on the command line, or the one the environment
    /// describes, with `--host`/`--port`/`--insecure` applied on top.
    fn provider(&self, from_env: MailboxProvider) -> anyhow::Result<MailboxProvider> {
        let mut provider = match self.provider {
            None => from_env,
            Some(Provider::Gmail) => MailboxProvider::gmail(),
            Some(Provider::ProtonBridge) => MailboxProvider::proton_bridge(),
            Some(Provider::Custom) => {
                let Some(host) = &self.host else {
                    bail!("--host is required with --provider custom");
                };
                MailboxProvider::custom(host.clone(), 993, true)
            }
        };
        if let Some(host) = &self.host {
            provider.host.clone_from(host);
        }
        if let Some(port) = self.port {
            provider.port = port;
        }
        if self.insecure {
            provider.secure = false;
        }
        Ok(provider)
    }

    fn config(&self) -> anyhow::Result<RetrievalConfig> {
        let builder =
            RetrievalConfigBuilder::from_env().context("Invalid IMAP_* environment")?;
        let provider = self.provider(builder.current_provider())?;

        let mut builder = builder
            .provider(provider)
            .starting_point(StartingPoint::constant(self.start_at))
            .traversal(if self.legacy_order {
                TraversalOrder::Stack
            } else {
                TraversalOrder::PreOrder
            });
        if self.all_folders {
            builder = builder.root_folder(ALL_FOLDERS);
        } else if let Some(folder) = &self.folder {
            builder = builder.root_folder(folder.as_str());
        }
        if let Some(max) = self.max_messages {
            builder = builder.max_messages(max);
        }
        if !builder.has_login() {
            builder = builder.login(prompt_login()?);
        }
        if !builder.has_password() {
            builder = builder.password(
                rpassword::prompt_password("Password: ").context("Failed to read password")?,
            );
        }
        Ok(builder.build()?)
    }
}

/// Read the login from stdin when `IMAP_USERNAME` is not set.
fn prompt_login() -> anyhow::Result<String> {
    eprint!("Login: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read login")?;
    Ok(line.trim().to_string())
}

fn print_summary(summary: &ExportSummary, output: &std::path::Path) {
    println!(
        "Exported {} message(s) to {} in {}s",
        summary.messages,
        output.display(),
        summary.elapsed_secs
    );
    if summary.failed_messages > 0 {
        println!("{} message(s) could not be written", summary.failed_messages);
    }
    if summary.unsupported_parts > 0 {
        println!("{} part(s) skipped as unsupported", summary.unsupported_parts);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.config()?;

    let summary = MailboxExporter::new(config)
        .export(FsSink::new(&args.output))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, &args.output);
    }

    if let Some(error) = &summary.error {
        bail!("Export stopped early: {error}");
    }
    Ok(())
}
