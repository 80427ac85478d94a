use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::history::DateRange;

#[derive(Parser)]
#[command(name = "solace", version, about = "Emotion-aware therapy chat server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API and WebSocket server
    Serve,

    /// Run a therapy session in the terminal
    Chat,

    /// Sign in (any non-empty credentials are accepted)
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Must repeat the password
        #[arg(long)]
        confirm_password: String,
    },

    /// Sign out and forget the stored identity
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List past sessions, or show one
    History {
        /// Keep sessions that include this emotion (repeatable)
        #[arg(short, long)]
        emotion: Vec<String>,

        /// week, month, year or all
        #[arg(short, long, default_value = "all")]
        range: DateRange,

        /// Print the full transcript of one session
        #[arg(long)]
        show: Option<Uuid>,

        /// Write the shown transcript to a .txt file instead
        #[arg(long, requires = "show")]
        export: Option<String>,
    },

    /// View or edit the profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// List crisis and emergency contacts
    Resources,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Print the saved profile
    Show,

    /// Change one field and save, e.g. `emergencyContact.phone 555-0100`
    Set {
        field: String,
        value: String,
    },
}
