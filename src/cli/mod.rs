//! CLI argument definitions for editgate.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::EditOp;

/// editgate - Approval-gated file editing for AI agents and humans.
///
/// Edits are planned against a file's version token, previewed, and only
/// written once approved with the exact phrase APPROVE.
#[derive(Parser, Debug)]
#[command(name = "eg")]
#[command(author, version, about = "Approval-gated file editing for AI agents and humans", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Read settings from this KDL file instead of ./.editgate.kdl
    #[arg(long = "config", global = true, env = "EG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Directory edits may touch (repeatable; defaults to the working directory)
    #[arg(long = "allowed-root", global = true)]
    pub allowed_roots: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// MCP server commands
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },

    /// Print the version token of a file
    VersionToken {
        /// File to fingerprint
        path: PathBuf,
    },

    /// Print numbered lines of a file along with its version token
    Read {
        /// File to read
        path: PathBuf,

        /// First line to show (1-based)
        #[arg(long)]
        start: Option<usize>,

        /// Last line to show (inclusive)
        #[arg(long)]
        end: Option<usize>,
    },

    /// Plan an edit, show its preview, and optionally apply it
    Edit {
        #[command(subcommand)]
        command: EditCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Options shared by every edit subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct EditArgs {
    /// File to edit
    pub path: PathBuf,

    /// Version token the file must still have (defaults to its current token)
    #[arg(long)]
    pub expect: Option<String>,

    /// Copy the file to a timestamped backup before writing
    #[arg(long)]
    pub backup: bool,

    /// Apply immediately; must be exactly APPROVE
    #[arg(long, value_name = "PHRASE")]
    pub confirm: Option<String>,
}

/// Edit subcommands
#[derive(Subcommand, Debug)]
pub enum EditCommands {
    /// Replace an inclusive line range with new content
    ReplaceLines {
        #[command(flatten)]
        args: EditArgs,

        /// First line to replace (1-based)
        #[arg(long)]
        start: usize,

        /// Last line to replace (inclusive)
        #[arg(long)]
        end: usize,

        /// Replacement text; lines separated by newlines
        #[arg(long)]
        content: String,
    },

    /// Insert content after a line (0 inserts before the first line)
    InsertAfter {
        #[command(flatten)]
        args: EditArgs,

        /// Line to insert after
        #[arg(long)]
        line: usize,

        /// Text to insert
        #[arg(long)]
        content: String,

        /// Insert the text exactly as given, without copying indentation
        #[arg(long)]
        no_indent: bool,
    },

    /// Delete an inclusive line range
    DeleteLines {
        #[command(flatten)]
        args: EditArgs,

        /// First line to delete (1-based)
        #[arg(long)]
        start: usize,

        /// Last line to delete (inclusive)
        #[arg(long)]
        end: usize,
    },

    /// Replace every occurrence of a pattern across the file
    ReplaceInFile {
        #[command(flatten)]
        args: EditArgs,

        /// Text (or regex with --regex) to search for
        #[arg(long)]
        pattern: String,

        /// Replacement; with --regex, $1 and ${name} refer to capture groups
        #[arg(long)]
        replacement: String,

        /// Match case-insensitively
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Treat the pattern as a regular expression
        #[arg(long)]
        regex: bool,
    },
}

impl EditCommands {
    /// Split into the shared options and the structural edit.
    pub fn into_parts(self) -> (EditArgs, EditOp) {
        match self {
            EditCommands::ReplaceLines {
                args,
                start,
                end,
                content,
            } => (
                args,
                EditOp::ReplaceLines {
                    start,
                    end,
                    content,
                },
            ),
            EditCommands::InsertAfter {
                args,
                line,
                content,
                no_indent,
            } => (
                args,
                EditOp::InsertAfter {
                    line,
                    content,
                    maintain_indentation: !no_indent,
                },
            ),
            EditCommands::DeleteLines { args, start, end } => {
                (args, EditOp::DeleteLines { start, end })
            }
            EditCommands::ReplaceInFile {
                args,
                pattern,
                replacement,
                ignore_case,
                regex,
            } => (
                args,
                EditOp::ReplaceInFile {
                    pattern,
                    replacement,
                    case_sensitive: !ignore_case,
                    use_regex: regex,
                },
            ),
        }
    }

    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            EditCommands::ReplaceLines { .. } => "edit replace-lines",
            EditCommands::InsertAfter { .. } => "edit insert-after",
            EditCommands::DeleteLines { .. } => "edit delete-lines",
            EditCommands::ReplaceInFile { .. } => "edit replace-in-file",
        }
    }
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show every setting with its value and where it came from
    Show,
}

/// MCP server subcommands
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Start stdio MCP server
    Serve,

    /// Output tool definitions
    Manifest,
}
