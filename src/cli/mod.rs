use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the chat proxy service.
    Serve(ServeArgs),
    /// Chat with a running proxy from the terminal.
    Chat(ChatArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8787")]
    pub server_addr: String,

    // --- Upstream LLM Provider Args ---
    /// Type of LLM provider for chat completion (anthropic, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "anthropic")]
    pub chat_llm_type: String,

    /// Base URL for the chat LLM provider API (e.g., https://api.anthropic.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the chat LLM provider. Never sent to clients.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., claude-haiku-4-5-20251001, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Output-length ceiling passed to the upstream model.
    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value = "200")]
    pub max_output_tokens: u32,

    /// Seconds to wait on the upstream model before giving up.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    // --- Request Limits ---
    /// Longest accepted `message`, in characters.
    #[arg(long, env = "MAX_MESSAGE_CHARS", default_value = "2000")]
    pub max_message_chars: usize,

    /// Most recent history entries forwarded upstream, whatever the client sends.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "10")]
    pub history_limit: usize,

    /// Length of one rate-limit window in seconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    pub rate_limit_window_secs: u64,

    /// Requests accepted per client within one window.
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value = "10")]
    pub rate_limit_max_requests: u32,

    /// How often expired rate-limit entries are swept, in seconds.
    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value = "60")]
    pub rate_limit_sweep_secs: u64,

    // --- CORS / Client Identity ---
    /// Production origins echoed back in Access-Control-Allow-Origin. The first one is the fallback.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "https://boneyardtees.com,https://www.boneyardtees.com,https://boneyard-tees-site.pages.dev"
    )]
    pub allowed_origins: Vec<String>,

    /// Header carrying the client address reported by the edge (e.g., CF-Connecting-IP).
    /// Falls back to the peer socket address when unset or missing.
    #[arg(long, env = "CLIENT_IP_HEADER")]
    pub client_ip_header: Option<String>,

    /// Optional text file replacing the built-in persona prompt.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- TLS ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// URL of the chat proxy.
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://127.0.0.1:8787")]
    pub endpoint: String,

    /// Seconds to wait for the proxy before showing a timeout notice.
    #[arg(long, env = "CHAT_CLIENT_TIMEOUT_SECS", default_value = "45")]
    pub timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults_match_reference_deployment() {
        let args = Args::try_parse_from(["merica-chat", "serve"]).unwrap();
        let Command::Serve(serve) = args.command else {
            panic!("expected serve subcommand");
        };
        assert_eq!(serve.max_message_chars, 2000);
        assert_eq!(serve.history_limit, 10);
        assert_eq!(serve.rate_limit_window_secs, 60);
        assert_eq!(serve.rate_limit_max_requests, 10);
        assert_eq!(serve.allowed_origins.len(), 3);
        assert_eq!(serve.allowed_origins[0], "https://boneyardtees.com");
    }

    #[test]
    fn allowed_origins_split_on_commas() {
        let args = Args::try_parse_from([
            "merica-chat",
            "serve",
            "--allowed-origins",
            "https://a.example,https://b.example",
        ]).unwrap();
        let Command::Serve(serve) = args.command else {
            panic!("expected serve subcommand");
        };
        assert_eq!(serve.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }
}
