//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, builds a chat session from the
//! config file and flags, and dispatches to the requested command.

pub mod chat;
pub mod model_list;
pub mod say;
pub mod settings;

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::chat::run_chat;
use crate::cli::model_list::list_models;
use crate::cli::say::run_say;
use crate::cli::settings::{apply_set, apply_unset};
use crate::core::chat_stream::ChatStreamService;
use crate::core::config::{Config, ParameterOverrides};
use crate::core::session::ChatSession;
use crate::core::transport::{
    AwsCredentialSettings, BedrockTransport, CompletionTransport, HttpTransport,
};
use crate::utils::logging::LoggingState;

/// Tracing filter directives, e.g. `BEDROCK_CHAT_LOG=bedrock_chat=debug`.
pub const LOG_ENV_VAR: &str = "BEDROCK_CHAT_LOG";
/// HTTP gateway used instead of the Bedrock SDK when set.
pub const ENDPOINT_ENV_VAR: &str = "BEDROCK_CHAT_ENDPOINT";
/// Bearer token sent to the HTTP gateway.
pub const TOKEN_ENV_VAR: &str = "BEDROCK_CHAT_TOKEN";

#[derive(Parser)]
#[command(name = "bedrock-chat")]
#[command(about = "A streaming terminal chat client for Claude models on Amazon Bedrock")]
#[command(
    long_about = "bedrock-chat keeps a multi-turn conversation with a Claude model hosted on \
Amazon Bedrock and prints each reply as it streams in.\n\n\
Credentials:\n\
  Pass --access-key and --secret-key, or rely on the standard AWS provider chain\n\
  (AWS_ACCESS_KEY_ID, AWS_PROFILE, instance metadata, ...).\n\n\
Environment Variables:\n\
  AWS_REGION             Region of the Bedrock runtime (or pass --region)\n\
  BEDROCK_CHAT_ENDPOINT  Use an HTTP gateway instead of the Bedrock SDK\n\
  BEDROCK_CHAT_TOKEN     Bearer token for the HTTP gateway\n\
  BEDROCK_CHAT_LOG       Diagnostic log filter (default: warn)\n\n\
Commands inside the chat:\n\
  /image <path>     Attach an image to the next message\n\
  /images           List attached images\n\
  /clear            Start a new conversation\n\
  /retry            Re-send the last unanswered message\n\
  /params           Show generation parameters\n\
  /log [file]       Enable logging to a file, or toggle it\n\
  /help             Show this list\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model display name, built-in id or raw Bedrock model id
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// System prompt sent with every request
    #[arg(short = 's', long, global = true, value_name = "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens to generate (10-4096)
    #[arg(long, global = true, value_name = "N")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0-1)
    #[arg(long, global = true, value_name = "T")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff (0-1)
    #[arg(long, global = true, value_name = "P")]
    pub top_p: Option<f32>,

    /// Top-k sampling cutoff (0-500)
    #[arg(long, global = true, value_name = "K")]
    pub top_k: Option<u32>,

    /// AWS region of the Bedrock runtime
    #[arg(short = 'r', long, global = true)]
    pub region: Option<String>,

    /// AWS access key id
    #[arg(long, global = true, value_name = "KEY")]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, global = true, value_name = "KEY")]
    pub secret_key: Option<String>,

    /// HTTP gateway to use instead of the Bedrock SDK
    #[arg(short = 'e', long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Send one message and print the streamed reply
    Say {
        /// Image to attach (png, jpeg, gif or webp); may be repeated
        #[arg(short = 'i', long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
        /// The message to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the built-in models
    Models,
    /// Set configuration values, or show them when no key is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key (can be multiple words for system-prompt)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

impl Args {
    pub fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            model: self.model.clone(),
            system_prompt: self.system.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
        }
    }

    pub fn aws_settings(&self, config: &Config) -> AwsCredentialSettings {
        AwsCredentialSettings {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone().or_else(|| config.region.clone()),
        }
    }
}

/// Picks the HTTP gateway: the flag, then the environment, then the config
/// file. `None` means the Bedrock SDK is used.
pub fn resolve_endpoint(
    flag: Option<&str>,
    env_value: Option<String>,
    config: &Config,
) -> Option<String> {
    flag.map(str::to_string)
        .or(env_value)
        .or_else(|| config.endpoint.clone())
        .map(|endpoint| endpoint.trim().to_string())
        .filter(|endpoint| !endpoint.is_empty())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Builds the session for `chat` and `say`: parameters from config and
/// flags, a transport, and the transcript log.
pub async fn build_session(args: &Args, config: &Config) -> Result<ChatSession, Box<dyn Error>> {
    let params = config.generation_parameters(&args.overrides())?;

    let transport: Arc<dyn CompletionTransport> = match resolve_endpoint(
        args.endpoint.as_deref(),
        env::var(ENDPOINT_ENV_VAR).ok(),
        config,
    ) {
        Some(endpoint) => {
            info!(%endpoint, "using HTTP gateway");
            Arc::new(HttpTransport::new(endpoint, env::var(TOKEN_ENV_VAR).ok()))
        }
        None => Arc::new(BedrockTransport::connect(&args.aws_settings(config)).await?),
    };

    let logging = LoggingState::new(args.log.clone())?;
    let session = ChatSession::new(ChatStreamService::new(transport), params)?;
    Ok(session.with_logging(logging))
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main());
    // A pending stdin read would otherwise hold the runtime open until Enter.
    runtime.shutdown_background();
    result
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let mut args = Args::parse();
    let command = args.command.take().unwrap_or(Commands::Chat);

    match command {
        Commands::Models => {
            let config = Config::load()?;
            list_models(&config, &args.overrides());
            Ok(())
        }
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            match key {
                Some(key) if !value.is_empty() => {
                    let message = apply_set(&mut config, &key, &value)?;
                    let path = config.save()?;
                    info!(path = %path.display(), "config saved");
                    println!("✅ {message}");
                }
                Some(key) => {
                    eprintln!("⚠️  Missing value for '{key}'. Example: bedrock-chat set top-k 100");
                    std::process::exit(1);
                }
                None => config.print_all(),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            let message = apply_unset(&mut config, &key)?;
            config.save()?;
            println!("✅ {message}");
            Ok(())
        }
        Commands::Say { images, prompt } => {
            let config = Config::load()?;
            run_say(&args, &config, images, prompt).await
        }
        Commands::Chat => {
            let config = Config::load()?;
            let session = match build_session(&args, &config).await {
                Ok(session) => session,
                Err(err) => {
                    eprintln!("❌ {err}");
                    std::process::exit(1);
                }
            };
            run_chat(session).await
        }
    }
}
