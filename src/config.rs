use clap::Parser;
use std::path::{Path, PathBuf};

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay")]
#[command(about = "Chat relay to the DeepSeek API with a per-client daily quota")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // Chat requests allowed per client per UTC day
    #[arg(long, env = "DAILY_MESSAGE_LIMIT", default_value_t = 10)]
    pub daily_limit: u32,

    // Upstream credential, checked per request rather than at startup
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    // Upstream model name; deepseek-chat is the cheap non-reasoning one
    #[arg(short, long, env = "DEEPSEEK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    // Upstream chat-completion endpoint
    #[arg(long, env = "DEEPSEEK_API_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    // Upstream request timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 120)]
    pub upstream_timeout: u64,

    // How often stale usage records are evicted, in seconds
    #[arg(
        long,
        env = "SWEEP_INTERVAL_SECS",
        default_value_t = 3600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval: u64,

    // Reject chat requests once a client's daily quota is used up
    #[arg(long, env = "ENFORCE_RATE_LIMIT", default_value_t = false)]
    pub enforce_rate_limit: bool,
}

/// Loads `KEY=value` pairs from an env file into the process environment so
/// the `env` fallbacks of [`Args`] see them. Without a path, `.env` is searched
/// from the working directory upward. Variables that are already set win.
/// Returns the file that was read, if any.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}
