use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use walog_client::config::{default_drafts_path, DEFAULT_SERVER_URL};
use walog_client::{ApiClient, App};
use walog_core::{DraftOverlay, Session};

#[derive(Parser)]
#[command(name = "walog", version, about = "Browse and extend a logged message history")]
struct Cli {
    /// Base URL of the walog server.
    #[arg(long, env = "WALOG_URL", default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Your own user id, used as sender of new messages.
    #[arg(long, env = "WALOG_SELF_ID", default_value = "")]
    self_id: String,

    /// Drafts file. Defaults to the platform data directory.
    #[arg(long, env = "WALOG_DRAFTS")]
    drafts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List chatrooms, drafts first.
    Chatrooms,
    /// Show the history of a conversation.
    Open { chat: String },
    /// Send a text message. Without text the saved draft is sent.
    Send { chat: String, text: Option<String> },
    /// Upload files as one media message.
    SendFile {
        chat: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Show, set or clear the draft of a conversation.
    Draft {
        chat: String,
        text: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    /// Filter chatrooms by name or message text.
    Search { query: String },
    /// Filter the messages of one conversation.
    SearchChat { chat: String, term: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let drafts_path = match cli.drafts {
        Some(path) => path,
        None => default_drafts_path()?,
    };
    let drafts = DraftOverlay::load_from(&drafts_path)?;
    let session = Session::new(cli.self_id, drafts);
    let mut app = App::new(ApiClient::new(&cli.url)?, session, Some(drafts_path));

    let result = match cli.command {
        Command::Chatrooms => app.chatrooms(None).await,
        Command::Open { chat } => app.open(&chat, None).await,
        Command::Send { chat, text } => app.send(&chat, text.as_deref()).await,
        Command::SendFile {
            chat,
            paths,
            caption,
        } => app.send_files(&chat, &paths, caption.as_deref()).await,
        Command::Draft { chat, text, clear } => app.draft(&chat, text.as_deref(), clear),
        Command::Search { query } => app.chatrooms(Some(&query)).await,
        Command::SearchChat { chat, term } => app.open(&chat, Some(&term)).await,
    };

    match result {
        Ok(out) => {
            print!("{out}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
