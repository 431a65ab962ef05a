use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use fedibot_ai::{GoogleClient, GoogleConfig, SafetySetting};
use fedibot_mastodon::{MastodonClient, MastodonClientConfig, MastodonStream};
use fedibot_pipeline::{
    run_event_loop, EventLoopReport, GeminiCompletion, MentionHandler, MentionHandlerConfig, Persona,
    DEFAULT_FALLBACK_REPLY, DEFAULT_SYSTEM_PROMPT,
};

use crate::cli_args::Cli;

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let mastodon = Arc::new(
        MastodonClient::new(MastodonClientConfig {
            server: cli.mastodon_server.clone(),
            access_token: cli.mastodon_access_token.clone(),
            request_timeout_ms: cli.request_timeout_ms,
        })
        .context("invalid mastodon configuration")?,
    );
    let bot_handle = resolve_bot_handle(&mastodon, cli.mastodon_username.as_deref()).await?;
    let local_domain = mastodon.local_domain().to_string();

    let google = GoogleClient::new(GoogleConfig {
        api_base: cli.gemini_api_base.clone(),
        api_key: cli.gemini_api_key.clone(),
        request_timeout_ms: cli.completion_timeout_ms,
        safety_settings: SafetySetting::permissive(),
    })
    .context("invalid gemini configuration")?;
    let completion = GeminiCompletion::new(Arc::new(google), cli.model.clone())
        .with_temperature(cli.temperature)
        .with_top_k(cli.top_k);

    let config = build_handler_config(&cli, bot_handle, local_domain);
    tracing::info!(
        bot = %config.bot_handle,
        domain = %config.local_domain,
        model = %completion.model(),
        thread_depth = config.thread_depth,
        "starting mention bot"
    );
    let handler = MentionHandler::new(
        config,
        mastodon.clone(),
        mastodon.clone(),
        mastodon.clone(),
        Arc::new(completion),
    );

    let mut stream = MastodonStream::connect(&mastodon)
        .await
        .context("failed to connect to the mastodon streaming api")?;
    let report = run_event_loop(&mut stream, &handler, shutdown_signal()).await;
    tracing::info!(
        replies = report.replies,
        fallback_replies = report.fallback_replies,
        stream_errors = report.stream_errors,
        "mention bot stopped"
    );
    ensure_requested_shutdown(&report)
}

/// Only a requested shutdown counts as a clean exit.
fn ensure_requested_shutdown(report: &EventLoopReport) -> Result<()> {
    if report.shutdown_requested {
        return Ok(());
    }
    bail!(
        "notification stream ended unexpectedly after {} events ({} stream errors)",
        report.events,
        report.stream_errors
    )
}

async fn resolve_bot_handle(mastodon: &MastodonClient, configured: Option<&str>) -> Result<String> {
    if let Some(handle) = configured.map(str::trim).filter(|handle| !handle.is_empty()) {
        return Ok(handle.trim_start_matches('@').to_string());
    }
    let account = mastodon
        .verify_credentials()
        .await
        .context("failed to verify mastodon credentials")?;
    if account.acct.trim().is_empty() {
        bail!("verify_credentials returned an account without a handle");
    }
    tracing::info!(acct = %account.acct, "resolved bot handle from credentials");
    Ok(account.acct)
}

pub(crate) fn build_handler_config(
    cli: &Cli,
    bot_handle: String,
    local_domain: String,
) -> MentionHandlerConfig {
    let mut config = MentionHandlerConfig::new(bot_handle, local_domain);
    config.dm_allowlist = cli
        .dm_allowlist
        .iter()
        .map(|handle| handle.trim().to_string())
        .filter(|handle| !handle.is_empty())
        .collect();
    config.persona = Persona {
        name: cli.persona_name.clone(),
        system_prompt: cli
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
    };
    config.fallback_reply = cli
        .fallback_reply
        .clone()
        .unwrap_or_else(|| DEFAULT_FALLBACK_REPLY.to_string());
    config.prefix_fallback = cli.prefix_fallback;
    config.thread_depth = cli.thread_depth;
    config.request_timeout = Duration::from_millis(cli.request_timeout_ms);
    config.completion_timeout = Duration::from_millis(cli.completion_timeout_ms);
    config
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for ctrl-c; running until the stream ends");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use fedibot_pipeline::{EventLoopReport, DEFAULT_FALLBACK_REPLY, DEFAULT_SYSTEM_PROMPT};

    use super::{build_handler_config, ensure_requested_shutdown};
    use crate::cli_args::Cli;

    #[test]
    fn handler_config_uses_built_in_persona_by_default() {
        let cli = Cli::try_parse_from([
            "fedibot",
            "--mastodon-server",
            "https://fuzzies.wtf",
            "--mastodon-access-token",
            "token",
            "--gemini-api-key",
            "key",
            "--dm-allowlist",
            " alice , ,bob",
            "--request-timeout-ms",
            "250",
        ])
        .expect("flags should parse");

        let config = build_handler_config(&cli, "macr0".to_string(), "fuzzies.wtf".to_string());

        assert_eq!(config.bot_handle, "macr0");
        assert_eq!(config.local_domain, "fuzzies.wtf");
        assert_eq!(config.dm_allowlist, vec!["alice", "bob"]);
        assert_eq!(config.persona.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.fallback_reply, DEFAULT_FALLBACK_REPLY);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.thread_depth, 20);
    }

    #[test]
    fn handler_config_prefers_explicit_prompt_and_fallback() {
        let cli = Cli::try_parse_from([
            "fedibot",
            "--mastodon-server",
            "https://fuzzies.wtf",
            "--mastodon-access-token",
            "token",
            "--gemini-api-key",
            "key",
            "--persona-name",
            "Botty",
            "--system-prompt",
            "be nice.",
            "--fallback-reply",
            "brb",
        ])
        .expect("flags should parse");

        let config = build_handler_config(&cli, "botty".to_string(), "example.org".to_string());

        assert_eq!(config.persona.name, "Botty");
        assert_eq!(config.persona.system_prompt, "be nice.");
        assert_eq!(config.fallback_reply, "brb");
        assert!(!config.prefix_fallback);
    }

    #[test]
    fn stream_loss_is_reported_as_failure() {
        let dropped = EventLoopReport {
            events: 3,
            stream_errors: 1,
            ..EventLoopReport::default()
        };
        let error = ensure_requested_shutdown(&dropped).expect_err("stream loss should fail");
        assert!(error.to_string().contains("1 stream errors"));

        let closed = EventLoopReport {
            events: 2,
            ..EventLoopReport::default()
        };
        assert!(ensure_requested_shutdown(&closed).is_err());

        let stopped = EventLoopReport {
            shutdown_requested: true,
            ..EventLoopReport::default()
        };
        assert!(ensure_requested_shutdown(&stopped).is_ok());
    }
}
