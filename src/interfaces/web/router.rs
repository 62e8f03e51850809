use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware::{self, Next},
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;

use super::handlers::{channels, generate, health_endpoint, webhook};
use super::{AppState, auth, sse_logs_endpoint};

/// Allow the public origin plus the API's own localhost origins.
fn build_cors(base_url: &str, api_port: u16) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();
    if let Ok(url) = url::Url::parse(base_url)
        && let Ok(origin) = url.origin().ascii_serialization().parse::<HeaderValue>()
    {
        origins.push(origin);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    // Public routes that bypass auth (platforms authenticate via signatures)
    let public_routes = Router::new()
        .route("/api/health", get(health_endpoint))
        .route(
            "/api/openclaw/webhook/{channel_id}",
            get(webhook::webhook_verify_endpoint).post(webhook::webhook_receive_endpoint),
        )
        .layer(middleware::from_fn(security_headers))
        .with_state(state.clone());

    let authed_routes = Router::new()
        .route("/api/openclaw/generate", post(generate::generate_endpoint))
        .route("/api/openclaw/status/{id}", get(generate::status_endpoint))
        .route(
            "/api/openclaw/generations",
            get(generate::list_generations_endpoint),
        )
        .route(
            "/api/openclaw/generations/{id}/code",
            get(generate::generated_code_endpoint),
        )
        .route("/api/openclaw/templates", get(generate::templates_endpoint))
        .route(
            "/api/openclaw/channel-types",
            get(channels::channel_types_endpoint),
        )
        .route(
            "/api/openclaw/channels",
            get(channels::list_channels_endpoint).post(channels::create_channel_endpoint),
        )
        .route(
            "/api/openclaw/channels/{id}",
            get(channels::get_channel_endpoint)
                .patch(channels::update_channel_endpoint)
                .delete(channels::delete_channel_endpoint),
        )
        .route(
            "/api/openclaw/channels/{id}/messages",
            get(channels::channel_messages_endpoint),
        )
        .route(
            "/api/openclaw/channels/{id}/apps",
            get(channels::list_channel_apps_endpoint).post(channels::link_app_endpoint),
        )
        .route(
            "/api/openclaw/channels/{id}/apps/{app_id}",
            patch(channels::toggle_app_endpoint).delete(channels::unlink_app_endpoint),
        )
        .route("/api/logs", get(sse_logs_endpoint))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::enforce_rate_limit,
        ))
        .layer(middleware::from_fn(security_headers))
        .layer(build_cors(&state.base_url, state.api_port))
        .with_state(state.clone());

    public_routes.merge(authed_routes)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::signature::hmac_sha256_hex;
    use crate::core::channels::{ChannelStatus, ChannelType, CreateChannel};
    use crate::core::generation::GenerationStatus;
    use crate::core::generation::StatusUpdate;
    use crate::interfaces::web::testing::{Harness, test_state, test_state_with_limit};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    const PROMPT: &str = "Build a medication tracker for elderly patients";

    async fn json_request(
        app: Router,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: &str,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
        (status, json)
    }

    async fn raw_request(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn create_channel(harness: &Harness, channel_type: ChannelType, config: Value) -> Value {
        let (status, body) = json_request(
            build_api_router(harness.state.clone()),
            Method::POST,
            "/api/openclaw/channels",
            Some(json!({ "type": channel_type, "name": "Front desk", "config": config })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    fn webhook_post(channel_id: &str, body: &str, headers: &[(&str, String)]) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/openclaw/webhook/{}", channel_id))
            .header("content-type", "application/json");
        for (k, v) in headers {
            builder = builder.header(*k, v);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_is_public_and_has_security_headers() {
        let harness = test_state().await;
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let resp = build_api_router(harness.state)
            .oneshot(req)
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn api_requires_token() {
        let harness = test_state().await;
        let (status, _) = json_request(
            build_api_router(harness.state),
            Method::GET,
            "/api/openclaw/generations",
            None,
            "fbk_wrong",
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn generate_returns_pending_job_and_enqueues_it() {
        let mut harness = test_state().await;
        let (status, body) = json_request(
            build_api_router(harness.state.clone()),
            Method::POST,
            "/api/openclaw/generate",
            Some(json!({ "prompt": PROMPT })),
            &harness.token,
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "PENDING");
        assert!(
            body["fhirResources"]
                .as_array()
                .unwrap()
                .contains(&json!("MedicationRequest"))
        );
        let id = body["id"].as_str().unwrap().to_string();
        assert_eq!(harness.receiver.try_recv().unwrap(), id);
        // The handler returns before any model call.
        assert!(harness.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_validation_lists_details() {
        let harness = test_state().await;
        let (status, body) = json_request(
            build_api_router(harness.state),
            Method::POST,
            "/api/openclaw/generate",
            Some(json!({ "prompt": "too short" })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert!(!body["details"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let harness = test_state().await;
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/openclaw/generate")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", harness.token))
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = raw_request(build_api_router(harness.state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid request body"));
    }

    #[tokio::test]
    async fn status_is_owner_scoped() {
        let harness = test_state().await;
        let (_, created) = json_request(
            build_api_router(harness.state.clone()),
            Method::POST,
            "/api/openclaw/generate",
            Some(json!({ "prompt": PROMPT })),
            &harness.token,
        )
        .await;
        let path = format!("/api/openclaw/status/{}", created["id"].as_str().unwrap());

        let (status, body) = json_request(
            build_api_router(harness.state.clone()),
            Method::GET,
            &path,
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PENDING");
        assert!(body.get("errorMessage").is_none());

        let (status, _) = json_request(
            build_api_router(harness.state),
            Method::GET,
            &path,
            None,
            &harness.other_token,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_job_reports_error_and_has_no_code() {
        let harness = test_state().await;
        let service = harness.state.orchestrator.service().clone();
        let id = service
            .create_generation(PROMPT, "user-1", None)
            .await
            .unwrap()
            .id;
        service
            .update_status(&id, GenerationStatus::Failed, StatusUpdate::failed("model timed out"))
            .await
            .unwrap();

        let (status, body) = json_request(
            build_api_router(harness.state.clone()),
            Method::GET,
            &format!("/api/openclaw/status/{}", id),
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "FAILED");
        assert_eq!(body["errorMessage"], "model timed out");

        let (status, _) = json_request(
            build_api_router(harness.state.clone()),
            Method::GET,
            &format!("/api/openclaw/generations/{}/code", id),
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = json_request(
            build_api_router(harness.state),
            Method::GET,
            "/api/openclaw/generations",
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generations"][0]["id"], id.as_str());
        assert_eq!(body["generations"][0]["prompt"], PROMPT);
    }

    #[tokio::test]
    async fn channel_create_returns_secret_once_and_never_credentials() {
        let harness = test_state().await;
        let created = create_channel(
            &harness,
            ChannelType::Telegram,
            json!({ "botToken": "123:secret-bot-token" }),
        )
        .await;

        let id = created["id"].as_str().unwrap();
        assert_eq!(created["status"], "CONFIGURING");
        assert_eq!(
            created["webhookUrl"],
            format!("https://fhirbuilders.test/api/openclaw/webhook/{}", id)
        );
        let secret = created["webhookSecret"].as_str().unwrap();
        assert_eq!(secret.len(), 64);
        assert!(!created.to_string().contains("secret-bot-token"));

        let (status, fetched) = json_request(
            build_api_router(harness.state),
            Method::GET,
            &format!("/api/openclaw/channels/{}", id),
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(fetched.get("webhookSecret").is_none());
        assert!(fetched.get("credentials").is_none());
    }

    #[tokio::test]
    async fn channel_create_rejects_missing_fields() {
        let harness = test_state().await;
        let (status, body) = json_request(
            build_api_router(harness.state),
            Method::POST,
            "/api/openclaw/channels",
            Some(json!({ "type": "SLACK", "name": "Ops", "config": { "botToken": "x" } })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let details = body["details"].as_array().unwrap();
        assert!(details.contains(&json!("signingSecret is required for Slack")));
        assert!(details.contains(&json!("channelId is required for Slack")));
    }

    #[tokio::test]
    async fn channel_routes_are_owner_scoped() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::WebChat, json!({})).await;
        let path = format!("/api/openclaw/channels/{}", created["id"].as_str().unwrap());

        for method in [Method::GET, Method::DELETE] {
            let (status, _) = json_request(
                build_api_router(harness.state.clone()),
                method,
                &path,
                None,
                &harness.other_token,
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        let (status, body) = json_request(
            build_api_router(harness.state.clone()),
            Method::PATCH,
            &path,
            Some(json!({ "name": "Lobby", "status": "DISCONNECTED" })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Lobby");
        assert_eq!(body["status"], "DISCONNECTED");

        let (status, _) = json_request(
            build_api_router(harness.state),
            Method::DELETE,
            &path,
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn app_links_require_owned_app() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::WebChat, json!({})).await;
        let channel_id = created["id"].as_str().unwrap();
        let app_id = harness
            .state
            .orchestrator
            .service()
            .create_generation(PROMPT, "user-1", None)
            .await
            .unwrap()
            .id;
        let apps = format!("/api/openclaw/channels/{}/apps", channel_id);

        let (status, _) = json_request(
            build_api_router(harness.state.clone()),
            Method::POST,
            &apps,
            Some(json!({ "appId": "someone-elses" })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, link) = json_request(
            build_api_router(harness.state.clone()),
            Method::POST,
            &apps,
            Some(json!({ "appId": app_id })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(link["enabled"], true);

        let (status, body) = json_request(
            build_api_router(harness.state.clone()),
            Method::PATCH,
            &format!("{}/{}", apps, app_id),
            Some(json!({ "enabled": false })),
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);

        let (_, links) = json_request(
            build_api_router(harness.state.clone()),
            Method::GET,
            &apps,
            None,
            &harness.token,
        )
        .await;
        assert_eq!(links[0]["enabled"], false);

        let (status, _) = json_request(
            build_api_router(harness.state),
            Method::DELETE,
            &format!("{}/{}", apps, app_id),
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn channel_types_lists_all_platforms() {
        let harness = test_state().await;
        let (status, body) = json_request(
            build_api_router(harness.state),
            Method::GET,
            "/api/openclaw/channel-types",
            None,
            &harness.token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let types = body.as_array().unwrap();
        assert_eq!(types.len(), 8);
        assert_eq!(types[3]["type"], "TEAMS");
        assert_eq!(types[3]["name"], "Microsoft Teams");
    }

    #[tokio::test]
    async fn webhook_with_valid_signature_stores_message_and_activates_channel() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::WebChat, json!({})).await;
        let id = created["id"].as_str().unwrap();
        let secret = created["webhookSecret"].as_str().unwrap();
        let body = r#"{"message":"Can I refill my prescription?","sessionId":"s-42","messageId":"m-1"}"#;
        let signature = hmac_sha256_hex(secret, body.as_bytes()).unwrap();

        let (status, response) = raw_request(
            build_api_router(harness.state.clone()),
            webhook_post(id, body, &[("x-signature", signature)]),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", response);
        let response: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(response["success"], true);
        assert!(response["messageId"].is_string());

        let channel = harness.state.channels.get("user-1", id).await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Active);
        let messages = harness
            .state
            .channels
            .messages("user-1", id, 10)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Can I refill my prescription?");
        assert_eq!(messages[0].external_id, "m-1");
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected_and_recorded() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::Discord, json!({
            "botToken": "b", "applicationId": "a", "publicKey": "p"
        }))
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, body) = raw_request(
            build_api_router(harness.state.clone()),
            webhook_post(id, r#"{"content":"hi"}"#, &[("x-signature", "00".repeat(32))]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "error": "Invalid signature" }));

        let channel = harness.state.channels.get("user-1", id).await.unwrap();
        assert!(channel.last_error.is_some());
        assert_eq!(channel.status, ChannelStatus::Configuring);
        assert!(harness.state.channels.messages("user-1", id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_rejects_disconnected_channel_and_unknown_ids() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::WebChat, json!({})).await;
        let id = created["id"].as_str().unwrap();
        harness
            .state
            .channels
            .update(
                "user-1",
                id,
                crate::core::channels::UpdateChannel {
                    status: Some(ChannelStatus::Disconnected),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let (status, _) = raw_request(
            build_api_router(harness.state.clone()),
            webhook_post(id, "{}", &[]),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = raw_request(
            build_api_router(harness.state),
            webhook_post("missing", "{}", &[]),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn telegram_empty_message_is_ignored() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::Telegram, json!({ "botToken": "1:a" })).await;
        let id = created["id"].as_str().unwrap();
        let secret = created["webhookSecret"].as_str().unwrap().to_string();

        let (status, body) = raw_request(
            build_api_router(harness.state),
            webhook_post(
                id,
                r#"{"message":{"chat":{"id":7}}}"#,
                &[("x-telegram-bot-api-secret-token", secret)],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({ "success": true, "ignored": true })
        );
    }

    #[tokio::test]
    async fn slack_url_verification_echoes_challenge() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::Slack, json!({
            "botToken": "xoxb", "signingSecret": "slack-signing", "channelId": "C1"
        }))
        .await;
        let id = created["id"].as_str().unwrap();
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string();
        let signature = format!(
            "v0={}",
            hmac_sha256_hex("slack-signing", format!("v0:{}:{}", ts, body).as_bytes()).unwrap()
        );

        let (status, response) = raw_request(
            build_api_router(harness.state),
            webhook_post(
                id,
                body,
                &[
                    ("x-slack-request-timestamp", ts),
                    ("x-slack-signature", signature),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_str::<Value>(&response).unwrap(),
            json!({ "challenge": "abc123" })
        );
    }

    #[tokio::test]
    async fn slack_webhook_with_bad_signature_is_rejected() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::Slack, json!({
            "botToken": "xoxb", "signingSecret": "slack-signing", "channelId": "C1"
        }))
        .await;
        let id = created["id"].as_str().unwrap();
        let body = r#"{"type":"event_callback","event":{"type":"message","text":"hello","user":"U1","channel":"C1","ts":"1.2"}}"#;
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .to_string();

        let (status, response) = raw_request(
            build_api_router(harness.state.clone()),
            webhook_post(
                id,
                body,
                &[
                    ("x-slack-request-timestamp", ts),
                    ("x-slack-signature", "v0=deadbeef".to_string()),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            serde_json::from_str::<Value>(&response).unwrap(),
            json!({ "error": "Invalid signature" })
        );
        assert!(harness.state.channels.messages("user-1", id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn whatsapp_get_verification() {
        let harness = test_state().await;
        let created = create_channel(&harness, ChannelType::Whatsapp, json!({
            "phoneNumberId": "p", "accessToken": "a", "verifyToken": "let-me-in"
        }))
        .await;
        let id = created["id"].as_str().unwrap();
        let get = |query: &str| {
            Request::builder()
                .uri(format!("/api/openclaw/webhook/{}?{}", id, query))
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = raw_request(
            build_api_router(harness.state.clone()),
            get("hub.mode=subscribe&hub.verify_token=let-me-in&hub.challenge=42"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "42");

        let (status, _) = raw_request(
            build_api_router(harness.state),
            get("hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=42"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn get_verification_is_platform_specific() {
        let harness = test_state().await;
        let telegram = create_channel(&harness, ChannelType::Telegram, json!({ "botToken": "1:a" })).await;
        let web_chat = create_channel(&harness, ChannelType::WebChat, json!({})).await;
        let get = |id: &str| {
            Request::builder()
                .uri(format!("/api/openclaw/webhook/{}", id))
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = raw_request(
            build_api_router(harness.state.clone()),
            get(telegram["id"].as_str().unwrap()),
        )
        .await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));

        let (status, _) = raw_request(
            build_api_router(harness.state),
            get(web_chat["id"].as_str().unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn log_stream_is_operator_only() {
        let harness = test_state().await;
        let logs = |token: &str| {
            Request::builder()
                .uri("/api/logs")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = raw_request(
            build_api_router(harness.state.clone()),
            logs(&harness.token),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.contains("data:"));

        let resp = build_api_router(harness.state.clone())
            .oneshot(logs(&harness.operator_token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let resp = build_api_router(harness.state)
            .oneshot(Request::builder().uri("/api/logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rate_limit_returns_429_after_max_requests() {
        let harness = test_state_with_limit(2).await;
        let app = build_api_router(harness.state);
        for _ in 0..2 {
            let (status, _) = json_request(
                app.clone(),
                Method::GET,
                "/api/openclaw/channel-types",
                None,
                &harness.token,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let req = Request::builder()
            .uri("/api/openclaw/channel-types")
            .header("authorization", format!("Bearer {}", harness.token))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn create_channel_via_manager_matches_api_shape() {
        let harness = test_state().await;
        let created = harness
            .state
            .channels
            .create(
                "user-1",
                CreateChannel {
                    channel_type: ChannelType::Sms,
                    name: "Text line".to_string(),
                    config: json!({ "accountSid": "AC1", "authToken": "t", "phoneNumber": "+1555" }),
                },
            )
            .await
            .unwrap();
        let value = serde_json::to_value(&created).unwrap();
        assert_eq!(value["type"], "SMS");
        assert!(value["webhookSecret"].is_string());
        assert!(value.get("credentials").is_none());
    }
}
