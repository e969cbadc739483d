//! Command-line interface for anicat.

mod commands;

use clap::{Parser, Subcommand};

/// anicat - local anime library catalog
#[derive(Parser)]
#[command(name = "anicat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default search path
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index the library and fetch metadata for new series
    Scan {
        /// Library root (defaults to library.library_path)
        path: Option<String>,
        /// Skip metadata enrichment after the scan
        #[arg(long)]
        no_enrich: bool,
    },

    /// Fetch metadata for every series still missing it
    Enrich,

    /// List the catalog
    #[command(alias = "ls", alias = "l")]
    List,

    /// Search series by title or synopsis
    #[command(alias = "s")]
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Mark an episode file as watched
    Watched {
        /// Episode file path as stored in the catalog
        path: String,
        /// Mark as unwatched instead
        #[arg(long)]
        unset: bool,
    },

    /// Remove catalog entries whose files are gone
    Prune {
        /// Library root (defaults to library.library_path)
        path: Option<String>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
