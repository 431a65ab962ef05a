use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use fedibot_ai::{GoogleClient, GoogleConfig, SafetySetting};
use fedibot_mastodon::{MastodonClient, MastodonClientConfig, Notification, StreamEvent};
use fedibot_pipeline::{
    run_event_loop, GeminiCompletion, MentionHandler, MentionHandlerConfig, MentionOutcome,
    NotificationStream, Persona,
};
use httpmock::prelude::*;
use serde_json::{json, Value};

fn mastodon_for(server: &MockServer) -> Arc<MastodonClient> {
    Arc::new(
        MastodonClient::new(MastodonClientConfig {
            server: server.base_url(),
            access_token: "bot-token".to_string(),
            request_timeout_ms: 5_000,
        })
        .expect("mastodon client should be created"),
    )
}

fn handler_for(server: &MockServer) -> MentionHandler {
    let mastodon = mastodon_for(server);
    let google = GoogleClient::new(GoogleConfig {
        api_base: format!("{}/v1beta", server.base_url()),
        api_key: "gemini-key".to_string(),
        request_timeout_ms: 5_000,
        safety_settings: SafetySetting::permissive(),
    })
    .expect("google client should be created");
    let completion = GeminiCompletion::new(Arc::new(google), "gemini-1.5-flash");

    let mut config = MentionHandlerConfig::new("macr0", mastodon.local_domain());
    config.persona = Persona {
        name: "Macr0".to_string(),
        system_prompt: "you are macr0.".to_string(),
    };
    config.fallback_reply = "brain offline, try later".to_string();

    MentionHandler::new(
        config,
        mastodon.clone(),
        mastodon.clone(),
        mastodon,
        Arc::new(completion),
    )
}

fn account(username: &str) -> Value {
    json!({"id": format!("acct-{username}"), "username": username, "acct": username})
}

fn root_status(server: &MockServer) -> Value {
    json!({
        "id": "99",
        "account": account("alice"),
        "content": "<p>my new desk setup</p>",
        "visibility": "public",
        "in_reply_to_id": null,
        "media_attachments": [{
            "id": "m1",
            "type": "image",
            "url": format!("{}/media/desk.png", server.base_url()),
            "description": "a messy desk"
        }],
        "mentions": [],
        "spoiler_text": ""
    })
}

fn mention_notification() -> Notification {
    serde_json::from_value(json!({
        "id": "n-1",
        "type": "mention",
        "account": account("bob"),
        "status": {
            "id": 100,
            "account": account("bob"),
            "content": "<p><span class=\"h-card\"><a href=\"https://x/@macr0\" class=\"u-url mention\">@<span>macr0</span></a></span> thoughts?</p>",
            "visibility": "public",
            "in_reply_to_id": 99,
            "media_attachments": [],
            "mentions": [{"id": "7", "username": "macr0", "acct": "macr0", "url": "https://x/@macr0"}],
            "spoiler_text": ""
        }
    }))
    .expect("notification fixture should decode")
}

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn mention_with_image_thread_is_answered_end_to_end() {
    let server = MockServer::start();
    let parent = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/statuses/99")
            .header("authorization", "Bearer bot-token");
        then.status(200).json_body(root_status(&server));
    });
    let media = server.mock(|when, then| {
        when.method(GET).path("/media/desk.png");
        then.status(200).body("png-bytes");
    });
    let gemini = server.mock(|when, then| {
        when.method(POST)
            .path("/v1beta/models/gemini-1.5-flash:generateContent")
            .query_param("key", "gemini-key")
            .body_includes("There are 1 images in this conversation. Refer to them as needed. ")
            .body_includes("alice: my new desk setup")
            .body_includes("cG5nLWJ5dGVz")
            .body_includes("Image alt text: a messy desk")
            .body_includes("bob: @macr0 thoughts?")
            .body_includes("BLOCK_NONE");
        then.status(200)
            .json_body(gemini_reply("@bob nice desk 🔥 .very clean"));
    });
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/statuses")
            .header("authorization", "Bearer bot-token")
            .json_body(json!({
                "status": "@bob@127.0.0.1 nice desk. very clean",
                "in_reply_to_id": "100",
                "visibility": "unlisted"
            }));
        then.status(200).json_body(json!({
            "id": "101",
            "account": account("macr0"),
            "content": "<p>nice desk. very clean</p>",
            "visibility": "unlisted",
            "in_reply_to_id": "100"
        }));
    });

    let outcome = handler_for(&server)
        .handle_notification(&mention_notification())
        .await;

    parent.assert();
    media.assert();
    gemini.assert();
    post.assert();
    match outcome {
        MentionOutcome::Replied {
            reply_id,
            used_fallback,
            ..
        } => {
            assert_eq!(reply_id.as_str(), "101");
            assert!(!used_fallback);
        }
        other => panic!("expected a reply, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_media_download_is_described_instead_of_inlined() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/statuses/99");
        then.status(200).json_body(root_status(&server));
    });
    server.mock(|when, then| {
        when.method(GET).path("/media/desk.png");
        then.status(404);
    });
    let gemini = server.mock(|when, then| {
        when.method(POST)
            .path("/v1beta/models/gemini-1.5-flash:generateContent")
            .body_includes(
                "Image 1: [User uploaded image with alt text: a messy desk that cannot be viewed]",
            );
        then.status(200).json_body(gemini_reply("cant see it lol"));
    });
    let post = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/statuses")
            .body_includes("cant see it lol");
        then.status(200).json_body(json!({
            "id": "102",
            "account": account("macr0"),
            "visibility": "unlisted"
        }));
    });

    let outcome = handler_for(&server)
        .handle_notification(&mention_notification())
        .await;

    gemini.assert();
    post.assert();
    assert!(matches!(
        outcome,
        MentionOutcome::Replied {
            used_fallback: false,
            ..
        }
    ));
}

#[tokio::test]
async fn gemini_outage_posts_fallback_reply() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/statuses/99");
        then.status(200).json_body(root_status(&server));
    });
    server.mock(|when, then| {
        when.method(GET).path("/media/desk.png");
        then.status(200).body("png-bytes");
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1beta/models/gemini-1.5-flash:generateContent");
        then.status(503).body("overloaded");
    });
    let post = server.mock(|when, then| {
        when.method(POST).path("/api/v1/statuses").json_body(json!({
            "status": "brain offline, try later",
            "in_reply_to_id": "100",
            "visibility": "unlisted"
        }));
        then.status(200).json_body(json!({
            "id": "103",
            "account": account("macr0"),
            "visibility": "unlisted"
        }));
    });

    let outcome = handler_for(&server)
        .handle_notification(&mention_notification())
        .await;

    post.assert();
    assert!(matches!(
        outcome,
        MentionOutcome::Replied {
            used_fallback: true,
            ..
        }
    ));
}

struct ScriptedStream(VecDeque<StreamEvent>);

#[async_trait]
impl NotificationStream for ScriptedStream {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        self.0.pop_front()
    }
}

#[tokio::test]
async fn event_loop_skips_direct_messages_from_strangers() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST).path("/api/v1/statuses");
        then.status(200).json_body(json!({
            "id": "104",
            "account": account("macr0"),
            "visibility": "direct"
        }));
    });
    let mut direct = mention_notification();
    if let Some(status) = direct.status.as_mut() {
        status.visibility = fedibot_mastodon::Visibility::Direct;
    }
    let frame = json!({
        "event": "delete",
        "payload": "100"
    })
    .to_string();
    let delete = fedibot_mastodon::parse_stream_frame(&frame).expect("delete frame should decode");
    let mut stream = ScriptedStream(VecDeque::from(vec![
        StreamEvent::Notification(direct),
        delete,
    ]));

    let report = run_event_loop(
        &mut stream,
        &handler_for(&server),
        std::future::pending(),
    )
    .await;

    assert_eq!(report.events, 2);
    assert_eq!(report.ignored, 1);
    assert_eq!(report.replies, 0);
    post.assert_calls(0);
}
