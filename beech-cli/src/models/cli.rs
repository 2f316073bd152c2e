use clap::{ArgAction, Parser, Subcommand};
use uuid::Uuid;

/// Beech: a Google Ads assistant you can chat with.
/// Runs the chat server, or a terminal client that talks to it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the chat API (`POST /api/chat`).
    Serve {
        /// Host to bind to. Defaults to `server.host` from Beech.toml.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to. Defaults to `server.port` from Beech.toml.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat with a running server in the terminal.
    Chat {
        /// Base URL of the server, e.g. http://127.0.0.1:3000.
        #[arg(long)]
        server: Option<String>,
        /// Continue a saved conversation.
        #[arg(long)]
        resume: Option<Uuid>,
    },
    /// List saved conversations, newest first.
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show a saved conversation.
    View {
        id: Uuid,
        /// Print whole messages instead of one-line previews.
        #[arg(long)]
        full: bool,
    },
    /// Delete a saved conversation.
    Delete { id: Uuid },
}
