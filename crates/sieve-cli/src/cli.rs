//! Argument definitions (spec.md §6 "CLI surface"): `test`, `dump`,
//! `compile`, `save`, `activate`, `deactivate`, `list`, `delete`,
//! `rename`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sieve", bin_name = "sieve")]
#[command(about = "Compile, test and manage Sieve mail-filtering scripts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options identifying a [`sieve_storage::Storage`] backend, shared by
/// every script-lifecycle subcommand (spec.md §6: "Storage
/// configuration is a set of named key/value options").
#[derive(Args, Clone, Debug)]
pub struct StorageArgs {
    /// Storage driver: file, data, dict (ldap if built with that feature).
    #[arg(long, default_value = "file")]
    pub driver: String,

    /// Storage name embedded in saved binary metadata.
    #[arg(long = "storage-name", default_value = "default")]
    pub storage_name: String,

    /// Driver-specific option as key=value; repeatable.
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a script and run it against a test message.
    Test {
        /// Path to the .sieve script.
        script: PathBuf,

        /// Path to an RFC 5322-ish test message (headers, blank line, body).
        #[arg(long = "message")]
        message: PathBuf,

        /// Envelope "from" address.
        #[arg(long = "envelope-from")]
        envelope_from: Option<String>,

        /// Envelope "to" address.
        #[arg(long = "envelope-to")]
        envelope_to: Option<String>,

        /// Print each opcode as it executes.
        #[arg(long)]
        trace: bool,
    },

    /// Compile a script and print its disassembled bytecode.
    Dump {
        /// Path to the .sieve script.
        script: PathBuf,
    },

    /// Compile a script and write the binary to a file.
    Compile {
        /// Path to the .sieve script.
        script: PathBuf,

        /// Output path for the compiled binary.
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },

    /// Save a script's source into a storage backend.
    Save {
        #[command(flatten)]
        storage: StorageArgs,

        /// Script name within the storage.
        name: String,

        /// Path to the .sieve source to save.
        script: PathBuf,
    },

    /// Make a stored script the storage's active script.
    Activate {
        #[command(flatten)]
        storage: StorageArgs,

        name: String,
    },

    /// Clear a storage's active-script pointer.
    Deactivate {
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// List every script name in a storage.
    List {
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Delete a stored script.
    Delete {
        #[command(flatten)]
        storage: StorageArgs,

        name: String,
    },

    /// Rename a stored script.
    Rename {
        #[command(flatten)]
        storage: StorageArgs,

        old_name: String,
        new_name: String,
    },
}
