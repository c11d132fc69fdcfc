use issuefleet_core::command::DEFAULT_COMMAND_TIMEOUT_SECS;
use issuefleet_core::node_pool::{
    offline_timeout, DEFAULT_HEARTBEAT_PERIOD_SECS, DEFAULT_OFFLINE_TIMEOUT_MULTIPLIER,
};
use issuefleet_core::registration_key::DEFAULT_NODE_AGENT_PORT;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Interval between node heartbeats, and between offline sweeps.
    pub heartbeat_period_secs: u64,
    /// A node is offline after `heartbeat_period_secs * offline_timeout_multiplier`.
    pub offline_timeout_multiplier: u32,
    /// Port the node agent listens on.
    pub node_agent_port: u16,
    /// Default timeout for commands run on a node.
    pub node_command_timeout_secs: u64,
    /// Initial registration key, used only when none has been issued yet.
    pub registration_key: Option<String>,
    /// Server URL embedded in the node agent `docker run` command.
    pub public_server_url: String,
    /// Node agent container image.
    pub node_agent_image: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                         |
    /// |------------------------------|---------------------------------|
    /// | `HOST`                       | `0.0.0.0`                       |
    /// | `PORT`                       | `8000`                          |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`         |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                            |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                            |
    /// | `HEARTBEAT_PERIOD_SECS`      | `30`                            |
    /// | `OFFLINE_TIMEOUT_MULTIPLIER` | `3`                             |
    /// | `NODE_AGENT_PORT`            | `8007`                          |
    /// | `NODE_COMMAND_TIMEOUT_SECS`  | `300`                           |
    /// | `REGISTRATION_KEY`           | unset                           |
    /// | `PUBLIC_SERVER_URL`          | `http://localhost:8000`         |
    /// | `NODE_AGENT_IMAGE`           | `issuefleet/node-agent:latest`  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let heartbeat_period_secs: u64 = std::env::var("HEARTBEAT_PERIOD_SECS")
            .ok()
            .map(|v| v.parse().expect("HEARTBEAT_PERIOD_SECS must be a valid u64"))
            .unwrap_or(DEFAULT_HEARTBEAT_PERIOD_SECS);
        assert!(heartbeat_period_secs > 0, "HEARTBEAT_PERIOD_SECS must be positive");

        let offline_timeout_multiplier: u32 = std::env::var("OFFLINE_TIMEOUT_MULTIPLIER")
            .ok()
            .map(|v| v.parse().expect("OFFLINE_TIMEOUT_MULTIPLIER must be a valid u32"))
            .unwrap_or(DEFAULT_OFFLINE_TIMEOUT_MULTIPLIER);

        let node_agent_port: u16 = std::env::var("NODE_AGENT_PORT")
            .ok()
            .map(|v| v.parse().expect("NODE_AGENT_PORT must be a valid u16"))
            .unwrap_or(DEFAULT_NODE_AGENT_PORT);

        let node_command_timeout_secs: u64 = std::env::var("NODE_COMMAND_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse().expect("NODE_COMMAND_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);

        let registration_key = std::env::var("REGISTRATION_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let public_server_url = std::env::var("PUBLIC_SERVER_URL")
            .unwrap_or_else(|_| "http://localhost:8000".into());

        let node_agent_image = std::env::var("NODE_AGENT_IMAGE")
            .unwrap_or_else(|_| "issuefleet/node-agent:latest".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            heartbeat_period_secs,
            offline_timeout_multiplier,
            node_agent_port,
            node_command_timeout_secs,
            registration_key,
            public_server_url,
            node_agent_image,
        }
    }

    /// Silence after which a node counts as offline.
    pub fn offline_timeout(&self) -> chrono::Duration {
        offline_timeout(self.heartbeat_period_secs, self.offline_timeout_multiplier)
    }
}
