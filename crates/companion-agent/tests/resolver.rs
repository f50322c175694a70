//! Provider resolver against stubbed HTTP backends.

use std::time::Duration;

use companion_agent::{
    PromptMessage, ProviderConfig, ProviderKind, ProviderResolver, ResolverSettings,
    build_context, fallback_message,
};
use companion_store::{Gender, Mode, UserProfile};
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ═══════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════

const OWNER: &str = "https://t.me/companion_owner";

fn settings() -> ResolverSettings {
    ResolverSettings {
        owner_contact: OWNER.into(),
        warmup_padding: Duration::ZERO,
        ..ResolverSettings::default()
    }
}

fn chat_provider(name: &str, server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Groq, "test-key")
        .with_name(name)
        .with_endpoint(server.uri())
        .with_timeout(Duration::from_secs(5))
}

fn chat_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

fn prompt(user_text: &str) -> Vec<PromptMessage> {
    vec![
        PromptMessage::system("You are a caring companion."),
        PromptMessage::user(user_text),
    ]
}

// ═══════════════════════════════════════════════════════════════════════
//  Fallback order
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn second_provider_answers_and_third_is_never_called() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let third = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&first)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(chat_reply("Main yahin hoon, bolo!"))
        .expect(1)
        .mount(&second)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("should not be used"))
        .expect(0)
        .mount(&third)
        .await;

    let resolver = ProviderResolver::new(
        vec![
            chat_provider("first", &first),
            chat_provider("second", &second),
            chat_provider("third", &third),
        ],
        settings(),
    )
    .unwrap();

    let resolution = resolver.resolve_detailed(&prompt("hello"), 0.7).await;
    assert_eq!(resolution.text, "Main yahin hoon, bolo!");
    assert_eq!(resolution.provider.as_deref(), Some("second"));
    assert_eq!(resolution.failures.len(), 1);
    assert_eq!(resolver.affinity().get(), Some(1));
}

#[tokio::test]
async fn all_failures_return_fallback_with_owner_contact() {
    let down = MockServer::start().await;
    let garbled = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&down)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&garbled)
        .await;

    let resolver = ProviderResolver::new(
        vec![chat_provider("down", &down), chat_provider("garbled", &garbled)],
        settings(),
    )
    .unwrap();

    let text = resolver.resolve(&prompt("hello"), 0.7).await;
    assert_eq!(text, fallback_message(OWNER));
    assert!(text.contains(OWNER));
    assert_eq!(resolver.affinity().get(), None);
}

#[tokio::test]
async fn echoed_reply_is_rejected() {
    let parrot = MockServer::start().await;
    let honest = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(chat_reply("kya haal hai"))
        .expect(1)
        .mount(&parrot)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("Sab badhiya, tum batao?"))
        .expect(1)
        .mount(&honest)
        .await;

    let resolver = ProviderResolver::new(
        vec![chat_provider("parrot", &parrot), chat_provider("honest", &honest)],
        settings(),
    )
    .unwrap();

    let text = resolver.resolve(&prompt("kya haal hai"), 0.7).await;
    assert_eq!(text, "Sab badhiya, tum batao?");
}

#[tokio::test]
async fn too_short_reply_falls_through() {
    let terse = MockServer::start().await;
    let chatty = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(chat_reply("ok"))
        .mount(&terse)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("Theek hai, phir milte hain!"))
        .mount(&chatty)
        .await;

    let resolver = ProviderResolver::new(
        vec![chat_provider("terse", &terse), chat_provider("chatty", &chatty)],
        settings(),
    )
    .unwrap();

    assert_eq!(
        resolver.resolve(&prompt("bye"), 0.7).await,
        "Theek hai, phir milte hain!"
    );
}

#[tokio::test]
async fn slow_provider_times_out_and_next_answers() {
    let slow = MockServer::start().await;
    let fast = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(chat_reply("too late").set_delay(Duration::from_secs(3)))
        .mount(&slow)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("Just in time!"))
        .mount(&fast)
        .await;

    let resolver = ProviderResolver::new(
        vec![
            chat_provider("slow", &slow).with_timeout(Duration::from_millis(200)),
            chat_provider("fast", &fast),
        ],
        settings(),
    )
    .unwrap();

    let resolution = resolver.resolve_detailed(&prompt("hi there"), 0.7).await;
    assert_eq!(resolution.text, "Just in time!");
    assert!(resolution.failures[0].to_string().contains("timed out"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Warm-up
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn warming_model_is_retried_once_on_same_provider() {
    let hf = MockServer::start().await;
    let next = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/org/chat-model"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "Model org/chat-model is currently loading",
            "estimated_time": 3.0
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&hf)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/org/chat-model"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "generated_text": "Arre, good morning!" }])),
        )
        .expect(1)
        .mount(&hf)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("not needed"))
        .expect(0)
        .mount(&next)
        .await;

    let resolver = ProviderResolver::new(
        vec![
            ProviderConfig::new(ProviderKind::HuggingFace, "hf-key")
                .with_endpoint(hf.uri())
                .with_model("org/chat-model")
                .with_timeout(Duration::from_secs(5)),
            chat_provider("next", &next),
        ],
        settings(),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let text = resolver.resolve(&prompt("good morning"), 0.7).await;
    assert_eq!(text, "Arre, good morning!");
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn long_warm_up_moves_on_without_waiting() {
    let hf = MockServer::start().await;
    let next = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "estimated_time": 120.0 })),
        )
        .expect(1)
        .mount(&hf)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("Main hoon na!"))
        .expect(1)
        .mount(&next)
        .await;

    let resolver = ProviderResolver::new(
        vec![
            ProviderConfig::new(ProviderKind::HuggingFace, "hf-key").with_endpoint(hf.uri()),
            chat_provider("next", &next),
        ],
        settings(),
    )
    .unwrap();

    let started = std::time::Instant::now();
    assert_eq!(resolver.resolve(&prompt("hello"), 0.7).await, "Main hoon na!");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn still_loading_after_the_wait_moves_on() {
    let hf = MockServer::start().await;
    let next = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "estimated_time": 1.0 })),
        )
        .expect(2)
        .mount(&hf)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("Chalo, main hoon na!"))
        .expect(1)
        .mount(&next)
        .await;

    let resolver = ProviderResolver::new(
        vec![
            ProviderConfig::new(ProviderKind::HuggingFace, "hf-key")
                .with_endpoint(hf.uri())
                .with_timeout(Duration::from_secs(5)),
            chat_provider("next", &next),
        ],
        settings(),
    )
    .unwrap();

    let resolution = resolver.resolve_detailed(&prompt("hello"), 0.7).await;
    assert_eq!(resolution.text, "Chalo, main hoon na!");
    assert_eq!(resolution.provider.as_deref(), Some("next"));
    assert_eq!(resolution.failures.len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Request shapes
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn gemini_uses_query_key_and_candidates_path() {
    let gemini = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({ "generationConfig": { "maxOutputTokens": 800 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Namaste! Kaise ho?" }] } }]
        })))
        .expect(1)
        .mount(&gemini)
        .await;

    let resolver = ProviderResolver::new(
        vec![ProviderConfig::new(ProviderKind::Gemini, "g-key").with_endpoint(gemini.uri())],
        settings(),
    )
    .unwrap();

    assert_eq!(resolver.resolve(&prompt("hi"), 0.7).await, "Namaste! Kaise ho?");
}

#[tokio::test]
async fn affinity_tries_last_winner_first() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;

    // Primary fails once, then would succeed; backup always answers.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&primary)
        .await;
    Mock::given(method("POST"))
        .respond_with(chat_reply("Backup here, yaar."))
        .expect(2)
        .mount(&backup)
        .await;

    let resolver = ProviderResolver::new(
        vec![chat_provider("primary", &primary), chat_provider("backup", &backup)],
        settings(),
    )
    .unwrap();

    assert_eq!(resolver.resolve(&prompt("one"), 0.7).await, "Backup here, yaar.");
    // Second request goes straight to the remembered provider.
    assert_eq!(resolver.resolve(&prompt("two"), 0.7).await, "Backup here, yaar.");
}

// ═══════════════════════════════════════════════════════════════════════
//  End to end
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn motivating_partner_reply_round_trip() {
    let server = MockServer::start().await;

    let profile = UserProfile {
        gender: Gender::Female,
        mode: Mode::Motivating,
        ..UserProfile::new(11, "Priya")
    };
    let context = build_context(&profile, &[], "I'm tired");
    assert_eq!(context.len(), 2);
    assert!(context[0].content.contains("his"));
    assert!(context[0].content.contains("motivating"));
    assert_eq!(context[1], PromptMessage::user("I'm tired"));

    Mock::given(method("POST"))
        .and(body_string_contains(r#""content":"I'm tired""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Chalo, thoda rest le lo, phir wapas lag jao!" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = ProviderResolver::new(vec![chat_provider("stub", &server)], settings()).unwrap();
    assert_eq!(
        resolver.resolve(&context, 0.7).await,
        "Chalo, thoda rest le lo, phir wapas lag jao!"
    );
}
