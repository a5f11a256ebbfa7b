pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod models;
pub mod server;

use cli::{ Args, Command, ServeArgs };
use config::prompt::load_system_prompt;
use config::ProxySettings;
use llm::chat::new_client;
use llm::{ LlmConfig, LlmType };
use log::info;
use server::api::AppState;
use server::Server;
use std::error::Error;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => run_proxy(serve).await,
        Command::Chat(chat) => client::terminal::run(chat).await,
    }
}

async fn run_proxy(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("(provider default)"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("(provider default)"));
    info!("Chat API Key Set: {}", !args.chat_api_key.trim().is_empty());
    info!("Max Message Chars: {}", args.max_message_chars);
    info!("History Limit: {}", args.history_limit);
    info!(
        "Rate Limit: {} requests / {}s",
        args.rate_limit_max_requests,
        args.rate_limit_window_secs
    );
    info!("Allowed Origins: {}", args.allowed_origins.join(", "));
    info!("Client IP Header: {}", args.client_ip_header.as_deref().unwrap_or("(peer address)"));
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(built-in)"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let settings = ProxySettings::from_args(&args)?;
    let llm_config = LlmConfig {
        llm_type: args.chat_llm_type.parse::<LlmType>()?,
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        timeout: Duration::from_secs(args.upstream_timeout_secs),
    };
    let chat = new_client(&llm_config)?;
    info!("Upstream model: {} at {}", chat.get_model(), chat.get_base_url());

    let system_prompt = load_system_prompt(args.prompts_path.as_deref())?;
    let state = AppState::new(chat, settings, system_prompt)?;

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, state, args);
    server.run().await?;

    Ok(())
}
