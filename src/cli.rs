//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resolve Reddit links into their content and downloadable media.
///
/// Each input (argument or stdin when none is given) is resolved and printed
/// as one JSON document per line.
#[derive(Parser, Debug)]
#[command(name = "reddit-resolver")]
#[command(author, version, about)]
pub struct Args {
    /// Text containing a Reddit link; reads stdin when omitted
    pub inputs: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Reddit application client id
    #[arg(long, env = "REDDIT_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Reddit application client secret
    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Reject NSFW posts
    #[arg(long, env = "REDDIT_DENY_NSFW")]
    pub deny_nsfw: bool,

    /// Path to a config file (default: $XDG_CONFIG_HOME/reddit-resolver/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
