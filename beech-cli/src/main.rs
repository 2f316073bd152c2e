// beech-cli/src/main.rs
mod client;
mod history;
mod models;
mod rendering;
mod server;

use anyhow::{anyhow, Context, Result};
use colored::*;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use uuid::Uuid;

use beech_core::config::AgentConfig;
use beech_core::models::transcript::{Role, TranscriptMessage};

use crate::client::ChatClient;
use crate::history::{Conversation, TranscriptStore};
use crate::models::cli::{Cli, Commands};
use crate::rendering::{print_formatted, tool_activity_lines};
use crate::server::AppState;

use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const CONFIG_FILENAME: &str = "Beech.toml";
const LOG_FILE_NAME: &str = "beech.log";

/// Walks up from the current directory looking for `Beech.toml`.
fn find_config_file() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Failed to get current directory")?;
    let mut current = current_dir.as_path();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.is_file() {
            return Ok(config_path);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => {
                return Err(anyhow!(
                    "Could not find '{}' in current directory or any parent directory.",
                    CONFIG_FILENAME
                ));
            }
        }
    }
}

fn load_config() -> Result<AgentConfig> {
    let config_path = find_config_file()?;
    info!("Found configuration file at: {:?}", config_path);
    let config_toml_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
    AgentConfig::from_toml_str(&config_toml_content)
        .context("Failed to parse or validate configuration content")
}

fn print_welcome_message(conversation_id: Uuid, server_url: &str) {
    println!("\n{}", "Beech - Google Ads Assistant".cyan().bold());
    println!("{}: {}", "Conversation ID".cyan(), conversation_id);
    println!("{}: {}", "Server".cyan(), server_url);
    println!(
        "{}\n{}",
        "Type 'exit', 'quit', or Ctrl-D to quit.".dimmed(),
        "Type 'new' to start a fresh conversation, 'clear' to empty this one.".dimmed()
    );
    println!();
}

fn thinking_spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "-"]),
    );
    pb.set_message("Thinking...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

async fn run_server(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config()?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let state = AppState::from_config(&config)?;
    println!(
        "{} http://{}:{}",
        "Beech chat server listening on".cyan(),
        host,
        port
    );
    server::serve(state, &host, port).await
}

/// Sends one message and records the exchange in `conversation`.
/// The transcript is only extended when the server answers.
async fn chat_turn(client: &ChatClient, conversation: &mut Conversation, input: &str) -> Result<()> {
    let pb = thinking_spinner()?;
    let result = client.send(input, &conversation.messages).await;
    pb.finish_and_clear();
    let reply = result?;

    let activity = tool_activity_lines(&reply.function_calls);
    if !activity.is_empty() {
        println!();
        for line in activity {
            println!("  {}", line);
        }
    }
    println!();
    if let Err(e) = print_formatted(&reply.message) {
        error!("Failed to render reply markdown: {}. Printing raw.", e);
        println!("{}", reply.message);
    }
    println!();

    conversation.push(TranscriptMessage::new(Role::User, input));
    conversation.push(
        TranscriptMessage::new(Role::Assistant, reply.message).with_function_calls(reply.function_calls),
    );
    Ok(())
}

/// Interactive chat against a running server.
async fn run_chat(server_url: Option<String>, resume: Option<Uuid>, store: &TranscriptStore) -> Result<()> {
    let server_url = match server_url {
        Some(url) => url,
        None => match load_config() {
            Ok(config) => format!("http://{}:{}", config.server.host, config.server.port),
            Err(e) => {
                debug!(error = %e, "No config for server URL, using the default.");
                "http://127.0.0.1:3000".to_string()
            }
        },
    };
    let client = ChatClient::new(reqwest::Client::new(), &server_url);

    let mut conversation = match resume {
        Some(id) => store
            .load(id)
            .with_context(|| format!("Could not load conversation {}", id))?,
        None => Conversation::new(),
    };
    info!(
        conversation_id = %conversation.id,
        transcripts = %store.dir().display(),
        "Starting chat session."
    );
    print_welcome_message(conversation.id, &server_url);

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl = DefaultEditor::with_config(rl_config)?;

    let history_file_path = dirs::cache_dir().map(|d| d.join("beech").join("cli_history.txt"));
    if let Some(path) = &history_file_path {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "Failed to create CLI history directory.");
            }
        }
        if rl.load_history(path).is_err() {
            debug!(path = %path.display(), "No previous CLI history found.");
        }
    }

    let prompt = format!("{} ", ">".green().bold());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim();
                match input.to_lowercase().as_str() {
                    "" => continue,
                    "exit" | "quit" => {
                        info!("Exit command entered, leaving chat.");
                        break;
                    }
                    "new" => {
                        save_conversation(store, &conversation);
                        conversation = Conversation::new();
                        println!("\n{}", "Starting a new conversation...".cyan());
                        print_welcome_message(conversation.id, &server_url);
                        continue;
                    }
                    "clear" => {
                        conversation.messages.clear();
                        save_conversation(store, &conversation);
                        println!("{}", "Conversation cleared.".cyan());
                        continue;
                    }
                    _ => {}
                }

                match chat_turn(&client, &mut conversation, input).await {
                    Ok(()) => save_conversation(store, &conversation),
                    Err(e) => {
                        error!("Chat turn failed: {:#}", e);
                        eprintln!("\n{}: {:#}\n", "Error".red(), e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => {
                info!("EOF detected, leaving chat.");
                break;
            }
            Err(err) => {
                error!("Readline error: {:?}", err);
                eprintln!("Error reading input: {}", err.to_string().red());
                break;
            }
        }
    }

    if let Some(path) = &history_file_path {
        if let Err(e) = rl.save_history(path) {
            warn!(path = %path.display(), error = %e, "Failed to save CLI history.");
        }
    }
    save_conversation(store, &conversation);
    println!("\n{}\n", "Conversation saved. Exiting.".cyan());
    Ok(())
}

/// Empty conversations are not worth a file.
fn save_conversation(store: &TranscriptStore, conversation: &Conversation) {
    if conversation.messages.is_empty() && store.load(conversation.id).is_err() {
        return;
    }
    match store.save(conversation) {
        Ok(()) => debug!(conversation_id = %conversation.id, "Saved conversation."),
        Err(e) => {
            error!(conversation_id = %conversation.id, "Failed to save conversation: {:#}", e);
            eprintln!("{}", "Error: Failed to save conversation.".red());
        }
    }
}

fn handle_list_conversations(store: &TranscriptStore, limit: usize) -> Result<()> {
    let conversations = store.list()?;
    if conversations.is_empty() {
        println!("No saved conversations found.");
        return Ok(());
    }

    println!("\n{}", "Recent Conversations:".bold());
    println!(
        "{:<36} {:<20} {}",
        "ID".underline(),
        "Last Updated".underline(),
        "Preview".underline()
    );
    for conversation in conversations.iter().take(limit) {
        let local_time = conversation.last_updated_at.with_timezone(&chrono::Local);
        println!(
            "{:<36} {:<20} {}",
            conversation.id.to_string(),
            local_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            conversation.preview().dimmed()
        );
    }
    println!("\n{}", "(Use 'beech view <ID>' to see details)".dimmed());
    Ok(())
}

fn handle_view_conversation(store: &TranscriptStore, id: Uuid, full: bool) -> Result<()> {
    let conversation = store.load(id)?;
    let created_local = conversation.created_at.with_timezone(&chrono::Local);
    let updated_local = conversation.last_updated_at.with_timezone(&chrono::Local);

    println!("\n{}", format!("Conversation ID: {}", conversation.id).bold());
    println!("Created:         {}", created_local.format("%Y-%m-%d %H:%M:%S"));
    println!("Last Updated:    {}", updated_local.format("%Y-%m-%d %H:%M:%S"));
    println!("Messages:        {}", conversation.messages.len());
    println!("{}", "--- Messages ---".bold());

    let mut truncated = false;
    for message in &conversation.messages {
        println!("\n[{}]", message.role.as_str().to_uppercase().cyan());
        if let Some(calls) = &message.function_calls {
            for line in tool_activity_lines(calls) {
                println!("  {}", line);
            }
        }
        let content = message.content.as_str();
        if full {
            if let Err(e) = print_formatted(content) {
                error!("Failed to render message markdown: {}. Printing raw.", e);
                println!("{}", content);
            }
        } else {
            let first_line: String = content.lines().next().unwrap_or("").chars().take(100).collect();
            if content.lines().count() > 1 || content.chars().count() > 100 {
                truncated = true;
                println!("{}...", first_line.trim());
            } else {
                println!("{}", first_line.trim());
            }
        }
    }
    println!("\n{}", "--- End ---".bold());
    if truncated {
        println!("{}", "(Pass --full to see complete message content)".dimmed());
    }
    Ok(())
}

fn handle_delete_conversation(store: &TranscriptStore, id: Uuid) -> Result<()> {
    if Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Are you sure you want to delete conversation {}?", id))
        .default(false)
        .interact()?
    {
        store.delete(id)?;
        println!("Conversation {} deleted.", id);
    } else {
        println!("Deletion cancelled.");
    }
    Ok(())
}

async fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Chat { server, resume } => {
            run_chat(server, resume, &TranscriptStore::default_location()?).await
        }
        Commands::List { limit } => {
            handle_list_conversations(&TranscriptStore::default_location()?, limit)
        }
        Commands::View { id, full } => {
            handle_view_conversation(&TranscriptStore::default_location()?, id, full)
        }
        Commands::Delete { id } => {
            handle_delete_conversation(&TranscriptStore::default_location()?, id)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    colored::control::set_override(true);

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = match dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .or_else(|| Some(env::temp_dir()))
        .map(|d| d.join("beech"))
    {
        Some(dir) => dir,
        None => {
            eprintln!("{}", "Error: Could not determine a suitable directory for log files.".red());
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("{} Failed to create log directory {}: {}", "Error:".red(), log_dir.display(), e);
        return ExitCode::FAILURE;
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let time_format_desc = match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(desc) => desc,
        Err(e) => {
            eprintln!("{} Failed to parse log time format: {}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let local_timer = LocalTime::new(time_format_desc);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer.clone());
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer)
        .with_target(false)
        .with_level(true);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("{} Failed to initialize logging: {}", "Error:".red(), e);
        return ExitCode::FAILURE;
    }
    colored::control::unset_override();

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    // --- End Logging Setup ---

    let result = run_command(cli.command).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let is_dialoguer_error = e.downcast_ref::<dialoguer::Error>().is_some();
            if !is_dialoguer_error {
                error!("Operation failed: {:#}", e);
                eprintln!("{} {:#}", "Error:".red(), e);
            }
            ExitCode::FAILURE
        }
    }
}
