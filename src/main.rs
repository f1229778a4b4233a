use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use secmail_client_rs::constants::MAX_PAGE_SIZE;
use secmail_client_rs::{
    config, logging, Error, MailboxStore, Message, MessageSummary, RefreshOutcome, Route, Router,
};

#[derive(Parser, Debug)]
#[command(
    name = "secmail",
    version,
    about = "Create and read disposable secmail addresses",
    arg_required_else_help = true
)]
struct Cli {
    /// Server root URL (overrides the config file)
    #[arg(long, env = "SECMAIL_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new address
    Create,
    /// Show the active address and its expiry
    Status,
    /// List messages in the inbox
    Inbox {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
        size: Option<u32>,
    },
    /// Show a message
    Read {
        id: String,
        /// Print the HTML body instead of text
        #[arg(long)]
        html: bool,
    },
    /// Save an attachment to a file
    Attachment {
        message_id: String,
        attachment_id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the inbox, then poll until a new message arrives
    Watch {
        /// Seconds between polls (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Delete the active address
    Delete,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load_config(),
    };
    if let Some(url) = cli.base_url.clone() {
        cfg.base_url = url;
    }
    logging::init(&logging::level_for(cli.verbose, &cfg.log_level));

    let mut store = MailboxStore::from_config(&cfg).context("failed to set up client")?;
    let mut router = Router::new();
    let restored = store.load_stored_email().await;

    match cli.command {
        Commands::Create => {
            if restored {
                println!("Replacing {}", store.address());
            }
            let session = store.generate_email().await?;
            router.enter(Route::Inbox, &mut store);
            println!("Address: {}", session.address);
            println!("Expires: {}", local_time(session.expires_at));
        }
        Commands::Status => match store.session() {
            Some(session) => {
                let remaining = session.remaining();
                println!("Address: {}", session.address);
                println!("Expires: {}", local_time(session.expires_at));
                println!(
                    "Remaining: {}m {}s",
                    remaining.num_minutes(),
                    remaining.num_seconds() % 60
                );
            }
            None => println!("No active address. Run `secmail create` first."),
        },
        Commands::Inbox { page, size } => {
            if router.enter(Route::Inbox, &mut store) != Route::Inbox {
                bail!("no active address (expired or never created); run `secmail create`");
            }
            let size = size.unwrap_or(cfg.page_size);
            report_refresh(store.refresh_messages_page(page, size).await)?;
            print_messages(store.messages());
        }
        Commands::Read { id, html } => {
            require_session(&store)?;
            let message = store.select_message(&id).await.map_err(explain)?;
            print_message(message, html);
        }
        Commands::Attachment {
            message_id,
            attachment_id,
            output,
        } => {
            require_session(&store)?;
            store.select_message(&message_id).await.map_err(explain)?;
            let bytes = store
                .download_attachment(&attachment_id)
                .await
                .map_err(explain)?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved {} bytes to {}", bytes.len(), output.display());
        }
        Commands::Watch { interval, timeout } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.poll_interval());
            watch(&mut store, &mut router, interval, timeout.map(Duration::from_secs)).await?;
        }
        Commands::Delete => {
            if !store.has_session() {
                println!("No active address.");
                return Ok(());
            }
            let address = store.address().to_string();
            let result = store.delete_email().await;
            router.sync(&store);
            match result {
                Ok(()) => println!("Deleted {address}"),
                Err(e) => {
                    eprintln!("Forgot {address} locally, but the server did not confirm: {e}");
                }
            }
        }
    }

    Ok(())
}

async fn watch(
    store: &mut MailboxStore,
    router: &mut Router,
    interval: Duration,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let nav = router.navigate(Route::Inbox, store).await;
    if nav.route != Route::Inbox {
        bail!("no active address (expired or never created); run `secmail create`");
    }
    if nav.refresh == Some(RefreshOutcome::Failed) {
        eprintln!("Refresh failed, retrying next poll");
    }
    println!("Watching {} (Ctrl-C to stop)", store.address());
    print_messages(store.messages());

    let seen: HashSet<String> = store.messages().iter().map(|m| m.id.to_string()).collect();
    let start = Instant::now();
    loop {
        if timeout.is_some_and(|t| start.elapsed() >= t) {
            println!("Timed out after {}s", start.elapsed().as_secs());
            return Ok(());
        }

        tokio::time::sleep(interval).await;
        match store.refresh_messages().await {
            RefreshOutcome::Expired => {
                router.sync(store);
                println!("Address expired.");
                return Ok(());
            }
            RefreshOutcome::Failed => {
                eprintln!("Refresh failed, retrying next poll");
                continue;
            }
            RefreshOutcome::Updated(_) | RefreshOutcome::Skipped => {}
        }

        let fresh = new_arrivals(store.messages(), &seen);
        if !fresh.is_empty() {
            print_messages(&fresh);
            return Ok(());
        }
    }
}

/// Messages whose id is not in `seen`, in inbox order.
fn new_arrivals(messages: &[MessageSummary], seen: &HashSet<String>) -> Vec<MessageSummary> {
    messages
        .iter()
        .filter(|m| !seen.contains(m.id.as_str()))
        .cloned()
        .collect()
}

fn require_session(store: &MailboxStore) -> anyhow::Result<()> {
    if !store.has_session() {
        bail!("no active address; run `secmail create`");
    }
    Ok(())
}

fn report_refresh(outcome: RefreshOutcome) -> anyhow::Result<()> {
    match outcome {
        RefreshOutcome::Expired => bail!("address expired; run `secmail create`"),
        RefreshOutcome::Failed => bail!("failed to fetch messages"),
        RefreshOutcome::Updated(_) | RefreshOutcome::Skipped => Ok(()),
    }
}

fn explain(e: Error) -> anyhow::Error {
    if e.is_gone() {
        anyhow::anyhow!("{e}; the address was forgotten, run `secmail create`")
    } else {
        e.into()
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_messages(messages: &[MessageSummary]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }
    println!("Found {} message(s):", messages.len());
    for (idx, msg) in messages.iter().enumerate() {
        println!("{}. {}", idx + 1, msg.subject);
        println!("   ID: {}", msg.id);
        println!("   From: {}", msg.from);
        if let Some(at) = msg.received_at {
            println!("   Received: {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        }
    }
}

fn print_message(message: &Message, html: bool) {
    println!("From: {}", message.from);
    println!("Subject: {}", message.subject);
    if let Some(at) = message.received_at {
        println!("Received: {}", local_time(at));
    }
    println!();
    if html {
        println!("{}", message.html_content);
    } else {
        println!("{}", message.text());
    }
    if !message.attachments.is_empty() {
        println!();
        println!("Attachments:");
        for att in &message.attachments {
            match &att.content_type {
                Some(ct) => println!("   {} {} ({})", att.id, att.file_name, ct),
                None => println!("   {} {}", att.id, att.file_name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summaries(json: &str) -> Vec<MessageSummary> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn only_unseen_messages_are_new() {
        let start = summaries(r#"[{"id":"m1"},{"id":2}]"#);
        let seen: HashSet<String> = start.iter().map(|m| m.id.to_string()).collect();
        assert!(new_arrivals(&start, &seen).is_empty());

        let later = summaries(r#"[{"id":"m3","subject":"new"},{"id":"m1"},{"id":2}]"#);
        let fresh = new_arrivals(&later, &seen);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].subject, "new");
    }
}
