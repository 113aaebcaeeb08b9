//! CLI entry point for the Reddit resolver.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use reddit_resolver::{EngineConfig, HttpTimeouts, RedditCredentials, ResolutionEngine};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::Args;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(
        inputs = args.inputs.len(),
        config = ?args.config,
        "CLI arguments parsed"
    );

    let file_config = app_config::load_config(args.config.as_deref())?;
    let config = build_engine_config(&args, &file_config)?;

    let inputs = if !args.inputs.is_empty() {
        args.inputs.clone()
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        vec![buffer]
    } else {
        info!("No input provided. Pass Reddit links as arguments or pipe them via stdin.");
        info!("Example: reddit-resolver https://redd.it/abc123");
        return Ok(ExitCode::SUCCESS);
    };

    let engine = match ResolutionEngine::new(config).await {
        Ok(engine) => engine,
        Err(error) => {
            if let Some(detail) = error.internal_detail() {
                warn!(detail, "Engine start-up failed");
            }
            return Err(anyhow::Error::new(error).context("Failed to start the resolution engine"));
        }
    };

    let mut failed = 0usize;
    for input in &inputs {
        match engine.resolve(input).await {
            Ok(result) => {
                let json = serde_json::to_string(&result).context("Failed to encode result")?;
                println!("{json}");
            }
            Err(error) => {
                failed += 1;
                eprintln!("{}", error.user_message());
            }
        }
    }
    engine.shutdown();

    if failed > 0 {
        warn!(failed, total = inputs.len(), "Some inputs could not be resolved");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Layers CLI flags over the config file over library defaults.
fn build_engine_config(args: &Args, file: &FileConfig) -> Result<EngineConfig> {
    let Some(client_id) = args.client_id.clone().or_else(|| file.client_id.clone()) else {
        bail!("Missing Reddit client id: pass --client-id, set REDDIT_CLIENT_ID or add `client_id` to the config file");
    };
    let Some(client_secret) = args
        .client_secret
        .clone()
        .or_else(|| file.client_secret.clone())
    else {
        bail!("Missing Reddit client secret: pass --client-secret, set REDDIT_CLIENT_SECRET or add `client_secret` to the config file");
    };
    if client_id.trim().is_empty() || client_secret.trim().is_empty() {
        bail!("Reddit credentials must not be empty");
    }

    let mut config = EngineConfig::new(RedditCredentials::new(client_id, client_secret));
    config.deny_nsfw = args.deny_nsfw || file.deny_nsfw.unwrap_or(false);

    let defaults = HttpTimeouts::default();
    config.timeouts = HttpTimeouts {
        connect: file
            .connect_timeout_secs
            .map_or(defaults.connect, Duration::from_secs),
        request: file
            .request_timeout_secs
            .map_or(defaults.request, Duration::from_secs),
    };
    if let Some(author) = &file.ua_author {
        config.ua_author.clone_from(author);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["reddit-resolver"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("args should parse")
    }

    #[test]
    fn test_cli_credentials_override_file() {
        let file = FileConfig {
            client_id: Some("file-id".to_string()),
            client_secret: Some("file-secret".to_string()),
            ..FileConfig::default()
        };
        let config = build_engine_config(&args(&["--client-id", "cli-id"]), &file)
            .expect("config should build");
        assert_eq!(config.credentials.client_id(), "cli-id");
    }

    #[test]
    fn test_file_values_apply_when_flags_absent() {
        let file = FileConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            deny_nsfw: Some(true),
            connect_timeout_secs: Some(3),
            request_timeout_secs: None,
            ua_author: Some("someone".to_string()),
        };
        let config = build_engine_config(
            &Args {
                client_id: None,
                client_secret: None,
                deny_nsfw: false,
                ..args(&[])
            },
            &file,
        )
        .expect("config should build");
        assert!(config.deny_nsfw);
        assert_eq!(config.timeouts.connect, Duration::from_secs(3));
        assert_eq!(config.timeouts.request, HttpTimeouts::default().request);
        assert_eq!(config.ua_author, "someone");
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = build_engine_config(
            &Args {
                client_id: None,
                client_secret: None,
                ..args(&[])
            },
            &FileConfig::default(),
        )
        .expect_err("missing credentials expected");
        assert!(err.to_string().contains("client id"));
    }
}
