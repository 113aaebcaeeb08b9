//! Shared HTTP client construction policy.
//!
//! Every outbound client (Reddit OAuth/API, redirect probing, media hosts) is
//! built here so timeout, user-agent, compression and proxy handling stay
//! consistent.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use crate::error::FetchError;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Client-side timeouts applied to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Total request timeout, including reading the body.
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Builds an HTTP client using the shared policy.
///
/// `client_name` is only used for logging and error details.
///
/// # Errors
///
/// Returns an internal [`FetchError`] when client construction fails.
pub fn build_http_client(
    client_name: &str,
    user_agent: impl Into<String>,
    timeouts: HttpTimeouts,
) -> Result<Client, FetchError> {
    let user_agent = user_agent.into();

    match try_build_client(&user_agent, timeouts, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; env proxies still apply on the fallback path.
            warn!(
                client = client_name,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            try_build_client(&user_agent, timeouts, true).map_err(|failure| match failure {
                BuildClientFailure::Panic => FetchError::internal(format!(
                    "{client_name}: HTTP client construction panicked"
                )),
                BuildClientFailure::Build(error) => FetchError::internal(format!(
                    "{client_name}: HTTP client construction failed: {error}"
                )),
            })
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::internal(format!(
            "{client_name}: HTTP client construction failed: {error}"
        ))),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    timeouts: HttpTimeouts,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent, timeouts);
        if disable_system_proxy_lookup {
            builder = with_env_proxies(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String, timeouts: HttpTimeouts) -> ClientBuilder {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .user_agent(user_agent)
        .gzip(true)
}

/// Proxy variables read on the fallback path, most specific first.
const HTTPS_PROXY_VARS: [&str; 4] = ["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"];
const HTTP_PROXY_VARS: [&str; 4] = ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"];

fn with_env_proxies(builder: ClientBuilder) -> ClientBuilder {
    let https = first_env_value(&HTTPS_PROXY_VARS).and_then(|url| Proxy::https(url).ok());
    let http = first_env_value(&HTTP_PROXY_VARS).and_then(|url| Proxy::http(url).ok());
    [https, http]
        .into_iter()
        .flatten()
        .fold(builder, ClientBuilder::proxy)
}

fn first_env_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
