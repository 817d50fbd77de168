//! Handler configuration.

use std::time::Duration;

/// Default page size when no `limit` is given.
pub const DEFAULT_LIMIT: u64 = 5;

/// How free-text and field filter values are turned into patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Use the value verbatim as a case-insensitive regular expression.
    #[default]
    Regex,
    /// Escape the value so it matches as a case-insensitive substring.
    Literal,
}

impl FilterMode {
    /// Turn a request value into a `$regex` pattern.
    pub fn pattern(&self, value: &str) -> String {
        match self {
            FilterMode::Regex => value.to_string(),
            FilterMode::Literal => regex::escape(value),
        }
    }
}

/// Configuration for the fluent handler.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Page size used when `limit` is absent or unparsable.
    pub default_limit: u64,
    /// Upper bound for running the middleware chain.
    pub middleware_timeout: Duration,
    /// Upper bound for one execution against the store. None disables the timeout.
    pub query_timeout: Option<Duration>,
    /// Filter value interpretation.
    pub filter_mode: FilterMode,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            middleware_timeout: Duration::from_secs(5),
            query_timeout: Some(Duration::from_secs(30)),
            filter_mode: FilterMode::Regex,
        }
    }
}

impl HandlerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size.
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the middleware timeout.
    pub fn middleware_timeout(mut self, timeout: Duration) -> Self {
        self.middleware_timeout = timeout;
        self
    }

    /// Set the query timeout.
    pub fn query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the filter mode.
    pub fn filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }
}
