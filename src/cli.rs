use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Store an issued session (principal id + access token)
    Login {
        /// Principal id the auth service issued
        #[clap(long)]
        principal: String,

        /// Access token the auth service issued
        #[clap(long)]
        token: String,
    },

    /// Forget the stored session
    Logout,

    /// Upload a photo; captioning/tagging/embedding happen in the background
    Add {
        /// Path to the image file
        file: PathBuf,
    },

    /// Create a note
    Note {
        /// Note body
        body: String,
    },

    /// Search the vault.
    /// `note:<text>` scopes to notes, "double quotes" match an exact phrase,
    /// anything else runs substring + fuzzy + semantic search.
    Search {
        query: String,

        /// Skip the semantic (embedding) leg
        #[clap(long, default_value = "false")]
        no_semantic: bool,
    },

    /// Delete a record
    Delete {
        id: String,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Pin a note to the top of the feed
    Pin { id: String },

    /// Unpin a note
    Unpin { id: String },

    /// Recompute the stored embedding for a photo
    Reembed { id: String },

    /// Run the reconciliation loop (realtime + polls) until interrupted
    Sync,
}
