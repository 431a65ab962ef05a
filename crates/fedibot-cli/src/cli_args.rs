use clap::{ArgAction, Parser};
use fedibot_ai::DEFAULT_GOOGLE_API_BASE;
use fedibot_pipeline::{DEFAULT_PERSONA_NAME, DEFAULT_THREAD_DEPTH};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_temperature(value: &str) -> Result<f32, String> {
    let parsed = value
        .parse::<f32>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || !(0.0..=2.0).contains(&parsed) {
        return Err("value must be a finite number in range 0..=2".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "fedibot",
    about = "Mastodon mention bot that replies with Gemini",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        env = "MASTODON_SERVER",
        help = "Mastodon server origin, for example https://fuzzies.wtf"
    )]
    pub mastodon_server: String,

    #[arg(
        long,
        env = "MASTODON_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Access token of the bot account"
    )]
    pub mastodon_access_token: String,

    #[arg(
        long,
        env = "MASTODON_USERNAME",
        help = "Bot handle; looked up through verify_credentials when omitted"
    )]
    pub mastodon_username: Option<String>,

    #[arg(
        long = "dm-allowlist",
        env = "FEDIBOT_DM_ALLOWLIST",
        value_delimiter = ',',
        help = "Accounts allowed to talk to the bot through direct messages"
    )]
    pub dm_allowlist: Vec<String>,

    #[arg(
        long,
        env = "GEMINI_API_KEY",
        hide_env_values = true,
        help = "API key for the Gemini generateContent endpoint"
    )]
    pub gemini_api_key: String,

    #[arg(
        long,
        env = "FEDIBOT_GEMINI_API_BASE",
        default_value = DEFAULT_GOOGLE_API_BASE,
        help = "Base URL for the Gemini API"
    )]
    pub gemini_api_base: String,

    #[arg(long, env = "FEDIBOT_MODEL", default_value = "gemini-1.5-flash")]
    pub model: String,

    #[arg(long, env = "FEDIBOT_PERSONA_NAME", default_value = DEFAULT_PERSONA_NAME)]
    pub persona_name: String,

    #[arg(
        long,
        env = "FEDIBOT_SYSTEM_PROMPT",
        help = "Persona instructions placed at the start of every prompt"
    )]
    pub system_prompt: Option<String>,

    #[arg(
        long,
        env = "FEDIBOT_FALLBACK_REPLY",
        help = "Reply posted when the model call fails"
    )]
    pub fallback_reply: Option<String>,

    #[arg(
        long,
        env = "FEDIBOT_PREFIX_FALLBACK",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Mention the thread participants in the fallback reply as well"
    )]
    pub prefix_fallback: bool,

    #[arg(
        long,
        env = "FEDIBOT_THREAD_DEPTH",
        default_value_t = DEFAULT_THREAD_DEPTH,
        value_parser = parse_positive_usize,
        help = "Maximum number of statuses collected when walking a thread"
    )]
    pub thread_depth: usize,

    #[arg(
        long,
        env = "FEDIBOT_TEMPERATURE",
        default_value_t = 0.7,
        value_parser = parse_temperature
    )]
    pub temperature: f32,

    #[arg(
        long,
        env = "FEDIBOT_TOP_K",
        default_value_t = 1,
        value_parser = parse_positive_u32
    )]
    pub top_k: u32,

    #[arg(
        long,
        env = "FEDIBOT_REQUEST_TIMEOUT_MS",
        default_value_t = 15_000,
        value_parser = parse_positive_u64,
        help = "Timeout for Mastodon lookups and media downloads"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        env = "FEDIBOT_COMPLETION_TIMEOUT_MS",
        default_value_t = 60_000,
        value_parser = parse_positive_u64,
        help = "Timeout for one Gemini completion"
    )]
    pub completion_timeout_ms: u64,
}
