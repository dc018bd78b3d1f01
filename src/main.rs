//! # Gazette CLI (`gazette`)
//!
//! Terminal front end for chatting with historical newspapers.
//!
//! ## Usage
//!
//! ```bash
//! gazette --config ./config/gazette.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gazette documents` | List the catalog |
//! | `gazette show <id>` | Print one newspaper in full |
//! | `gazette ask <id> <message>` | Ask a single question and print the reply |
//! | `gazette chat` | Interactive session |
//! | `gazette serve` | Run the local mock backend |
//!
//! ## Examples
//!
//! ```bash
//! # Work entirely offline against the built-in archive
//! gazette --offline ask 4 "Summarize"
//!
//! # Serve the archive, then talk to it over HTTP
//! gazette serve &
//! GAZETTE_BACKEND_URL=http://127.0.0.1:8000 gazette chat --document 4
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use gazette_chat::catalog::{create_catalog, CatalogStatus, DocumentCatalog};
use gazette_chat::composer::{self, Key, MessageComposer, SubmitGate};
use gazette_chat::config::{self, Config};
use gazette_chat::controller::{ControllerHandle, SessionController, Snapshot};
use gazette_chat::mock_server;
use gazette_chat::models::{Document, Sender};
use gazette_chat::render;
use gazette_chat::resolver::create_resolver;
use gazette_chat::selector;

/// Gazette: chat with historical newspapers.
///
/// Settings are read from a TOML file; a missing default file means
/// built-in defaults (backend on http://127.0.0.1:8000).
#[derive(Parser)]
#[command(
    name = "gazette",
    about = "Gazette: chat with historical newspapers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gazette.toml")]
    config: PathBuf,

    /// Use the built-in archive and the local resolver; no network.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the newspapers in the catalog.
    Documents,

    /// Fetch one newspaper's full details and print them.
    Show {
        /// Newspaper id.
        id: String,
    },

    /// Select a newspaper, ask one question, print the reply.
    Ask {
        /// Newspaper id.
        id: String,
        /// The question. Multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Interactive chat on stdin.
    ///
    /// End a line with `\` to continue the message on the next line.
    /// Commands: /list, /select <id>, /clear, /reload, /show, /quit.
    Chat {
        /// Newspaper to select at start.
        #[arg(long)]
        document: Option<String>,
    },

    /// Run the local mock backend on `[server].bind`.
    Serve,
}

fn init_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(match cli.command {
        Commands::Serve => "gazette_chat=info,tower_http=info",
        _ => "gazette_chat=warn",
    });

    let mut cfg = config::load_config_or_default(&cli.config)?;
    if cli.offline {
        cfg = cfg.offline();
    }

    match cli.command {
        Commands::Documents => run_documents(&cfg).await?,
        Commands::Show { id } => run_show(&cfg, &id).await?,
        Commands::Ask { id, message } => run_ask(&cfg, &id, &message.join(" ")).await?,
        Commands::Chat { document } => run_chat(&cfg, document).await?,
        Commands::Serve => mock_server::run_server(&cfg).await?,
    }

    Ok(())
}

fn print_catalog(status: &CatalogStatus, selected: Option<&str>) {
    let view = selector::render(status, selected);
    if let Some(error) = &view.error {
        println!("{}", error);
        return;
    }
    if view.items.is_empty() {
        println!("No newspapers available.");
        return;
    }
    for item in &view.items {
        let marker = if item.selected { "*" } else { " " };
        println!(
            "{} {:>4}  {}  ({})  {}  [{} articles]",
            marker,
            item.id,
            item.title,
            item.date,
            item.source.as_deref().unwrap_or("-"),
            item.article_count
        );
        if let Some(summary) = &item.summary {
            println!("        {}", summary);
        }
    }
}

async fn run_documents(cfg: &Config) -> Result<()> {
    let mut catalog = DocumentCatalog::new(create_catalog(cfg)?);
    let result = catalog.load().await;
    print_catalog(catalog.status(), None);
    result?;
    Ok(())
}

fn print_document(doc: &Document) {
    println!("{}", doc.title);
    println!("Date:   {}", doc.display_date);
    if let Some(source) = &doc.source {
        println!("Source: {}", source);
    }
    if let Some(summary) = &doc.summary {
        println!("\n{}", summary);
    }
    match &doc.content {
        Some(content) => println!("\n{}", content),
        None => {
            for s in &doc.sections {
                println!("\n## {}", s.title);
                if let Some(author) = &s.author {
                    println!("by {}", author);
                }
                println!("\n{}", s.body);
            }
        }
    }
}

async fn run_show(cfg: &Config, id: &str) -> Result<()> {
    let mut catalog = DocumentCatalog::new(create_catalog(cfg)?);
    catalog.load().await?;
    let Some(summary) = catalog.find(id).cloned() else {
        bail!("newspaper not found: {}", id);
    };
    let doc = catalog.source().details(&summary).await?;
    print_document(&doc);
    Ok(())
}

fn start_controller(cfg: &Config) -> Result<ControllerHandle> {
    let catalog = create_catalog(cfg)?;
    let resolver = create_resolver(cfg)?;
    Ok(SessionController::spawn(
        catalog,
        resolver,
        cfg.backend.timeout(),
    ))
}

async fn wait_for_catalog(handle: &ControllerHandle) -> Result<Snapshot> {
    let snap = handle.catalog_ready().await?;
    if let CatalogStatus::Failed(msg) = &snap.catalog {
        bail!("{}", msg);
    }
    Ok(snap)
}

fn selected_id(snap: &Snapshot) -> Option<&str> {
    snap.session.document.as_ref().map(|d| d.id.as_str())
}

async fn run_ask(cfg: &Config, id: &str, message: &str) -> Result<()> {
    let handle = start_controller(cfg)?;
    wait_for_catalog(&handle).await?;

    let snap = handle.select_and_wait(Some(id.to_string())).await?;
    if selected_id(&snap) != Some(id) {
        bail!(
            "{}",
            snap.session
                .error
                .unwrap_or_else(|| format!("could not select newspaper {}", id))
        );
    }

    let snap = handle.send_and_wait(message).await?;
    if let Some(rejection) = snap.last_rejection {
        bail!("{}", rejection);
    }
    if let Some(error) = snap.session.error {
        bail!("{}", error);
    }
    if let Some(reply) = snap
        .session
        .messages
        .last()
        .filter(|m| m.sender == Sender::Assistant)
    {
        println!("{}", reply.content);
    }
    handle.shutdown().await?;
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn run_chat(cfg: &Config, document: Option<String>) -> Result<()> {
    let handle = start_controller(cfg)?;
    let snap = handle.catalog_ready().await?;
    print_catalog(&snap.catalog, None);

    if let Some(id) = document {
        let snap = handle.select_and_wait(Some(id)).await?;
        println!("\n{}", render::render_view(&snap.session));
    } else {
        println!("\n{}", render::render_empty_state());
    }

    let mut input = MessageComposer::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();

    while let Some(line) = lines.next_line().await? {
        let snap = handle.snapshot();
        let gate = SubmitGate::from_view(&snap.session);

        if input.draft().is_empty() && line.trim_start().starts_with('/') {
            if !run_chat_command(&handle, line.trim()).await? {
                break;
            }
            prompt();
            continue;
        }

        if let Some(continued) = line.strip_suffix('\\') {
            input.insert(continued);
            input.key(Key::ShiftEnter, gate);
            continue;
        }

        input.insert(&line);
        let Some(text) = input.key(Key::Enter, gate) else {
            if !gate.has_document {
                println!("{}", composer::footer_hint(gate));
            }
            input.set_draft("");
            prompt();
            continue;
        };

        let snap = handle.send_and_wait(text).await?;
        if let Some(rejection) = snap.last_rejection {
            println!("! {}", rejection);
        } else if let Some(error) = &snap.session.error {
            println!("! {} (send again to retry)", error);
        } else if let Some(reply) = snap.session.messages.last() {
            println!("{}", render::render_row(reply));
        }
        prompt();
    }

    handle.shutdown().await?;
    Ok(())
}

/// Handle a `/command`. Returns `false` to quit.
async fn run_chat_command(handle: &ControllerHandle, line: &str) -> Result<bool> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match cmd {
        "/quit" | "/exit" => return Ok(false),
        "/list" => {
            let snap = handle.snapshot();
            print_catalog(&snap.catalog, selected_id(&snap));
        }
        "/select" => match arg {
            Some(id) => {
                let snap = handle.select_and_wait(Some(id.to_string())).await?;
                println!("{}", render::render_view(&snap.session));
            }
            None => println!("usage: /select <id>"),
        },
        "/clear" => {
            let snap = handle.select_and_wait(None).await?;
            println!("{}", render::render_view(&snap.session));
        }
        "/reload" => {
            let snap = handle.reload_and_wait().await?;
            print_catalog(&snap.catalog, selected_id(&snap));
        }
        "/show" => {
            println!("{}", render::render_view(&handle.snapshot().session));
        }
        other => println!("unknown command: {}", other),
    }
    Ok(true)
}
