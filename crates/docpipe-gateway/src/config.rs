//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use docpipe_core::{FilterMode, HandlerConfig, DEFAULT_LIMIT};

/// Docpipe HTTP/JSON Gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "docpipe-gateway")]
#[command(about = "HTTP/JSON Gateway for docpipe collection queries")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// JSON file of `{collection: [documents]}` to load into the store.
    /// The demo data set is used when omitted.
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// JSON file holding an array of entity definitions.
    /// The demo schema is used when omitted.
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Per-query timeout (ms) against the store. 0 disables it.
    #[arg(long, default_value_t = 30_000)]
    pub query_timeout_ms: u64,

    /// Timeout (ms) for the middleware chain.
    #[arg(long, default_value_t = 5_000)]
    pub middleware_timeout_ms: u64,

    /// Page size used when a request has no `limit`.
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub default_limit: u64,

    /// Escape filter values instead of treating them as regular expressions.
    #[arg(long)]
    pub literal_filters: bool,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Seed data file.
    pub data_path: Option<PathBuf>,
    /// Entity definition file.
    pub schema_path: Option<PathBuf>,
    /// Per-query timeout. None disables it.
    pub query_timeout: Option<Duration>,
    /// Middleware chain timeout.
    pub middleware_timeout: Duration,
    /// Default page size.
    pub default_limit: u64,
    /// Filter value interpretation.
    pub filter_mode: FilterMode,
}

impl GatewayConfig {
    /// Handler configuration derived from the gateway settings.
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig::new()
            .default_limit(self.default_limit)
            .middleware_timeout(self.middleware_timeout)
            .query_timeout(self.query_timeout)
            .filter_mode(self.filter_mode)
    }
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        let query_timeout = Some(args.query_timeout_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let filter_mode = if args.literal_filters {
            FilterMode::Literal
        } else {
            FilterMode::Regex
        };

        Self {
            listen_addr: args.listen.clone(),
            data_path: args.data.clone(),
            schema_path: args.schema.clone(),
            query_timeout,
            middleware_timeout: Duration::from_millis(args.middleware_timeout_ms),
            default_limit: args.default_limit,
            filter_mode,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_path: None,
            schema_path: None,
            query_timeout: Some(Duration::from_secs(30)),
            middleware_timeout: Duration::from_secs(5),
            default_limit: DEFAULT_LIMIT,
            filter_mode: FilterMode::Regex,
        }
    }
}
