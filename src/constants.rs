/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8787;

/// Default maximum prompt length (characters)
pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 1000;

/// Default maximum relayed response length (characters)
pub const DEFAULT_MAX_RESPONSE_LENGTH: usize = 5000;

/// Default upstream connect/read timeout (5 min, long generations stream slowly)
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 300;

/// Upstream connect timeout
pub const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Methods advertised on preflight responses
pub const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Request headers advertised on preflight responses
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Content type of the relayed stream
pub const RELAY_CONTENT_TYPE: &str = "application/json";
