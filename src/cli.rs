//! Command-line definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "gbp-fl", version, about = "Index and search the files inside Gentoo Build Publisher binary packages")]
pub struct Cli {
    /// Configuration file (default: the platform configuration directory).
    #[arg(short, long, global = true, env = "GBP_FL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index every package of a build
    Index {
        machine: String,
        build_id: String,
    },
    /// Remove every indexed file of a build
    Deindex {
        machine: String,
        build_id: String,
    },
    /// Search indexed files by basename (`bash`, `bash*`, `*ash`, `*ash*`) or path (`/bin/bash`)
    Search {
        /// Restrict the search to these machines
        #[arg(short, long = "machine")]
        machines: Vec<String>,
        key: String,
    },
    /// List the files of a package: <machine>/<build_id>/<category>/<package>-<version>-<build>
    Ls {
        /// Show size and timestamp too
        #[arg(short, long)]
        long: bool,
        pkgspec: String,
    },
    /// Show file counts per machine
    Stats,
    /// Compare the index with the builds on disk
    Check,
}
