//! The OpenAI-compatible client against a local stand-in server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use akira::completion::{
    create_service, ChatMessage, CompletionError, CompletionRequest, CompletionService,
};
use akira::config::CompletionConfig;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<String>>>,
}

/// Start a server whose `/v1/chat/completions` answers with `respond`.
async fn spawn_server<F>(respond: F) -> (String, Recorded)
where
    F: Fn(&Value) -> Response + Clone + Send + Sync + 'static,
{
    let recorded = Recorded::default();
    let handler = {
        let respond = respond.clone();
        move |State(recorded): State<Recorded>, headers: HeaderMap, Json(body): Json<Value>| {
            let respond = respond.clone();
            async move {
                if let Some(auth) = headers.get("authorization") {
                    recorded
                        .auth
                        .lock()
                        .unwrap()
                        .push(auth.to_str().unwrap().to_string());
                }
                let response = respond(&body);
                recorded.bodies.lock().unwrap().push(body);
                response
            }
        }
    };

    let app = axum::Router::new()
        .route("/v1/chat/completions", post(handler))
        .with_state(recorded.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/v1"), recorded)
}

fn config(base_url: &str) -> CompletionConfig {
    CompletionConfig {
        base_url: base_url.to_string(),
        api_key: Some("sk-test".into()),
        timeout_secs: 1,
        ..CompletionConfig::default()
    }
}

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::system("Eres Akira."),
        ChatMessage::user("hola"),
    ])
    .with_temperature(0.6)
}

fn completion_json(content: &str) -> Response {
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
    .into_response()
}

#[tokio::test]
async fn successful_completion_is_trimmed() {
    let (base_url, recorded) = spawn_server(|_| completion_json("  ¡Hola! 🐶 \n")).await;
    let service = create_service(&config(&base_url)).unwrap();

    let text = service.complete(request()).await.unwrap();

    assert_eq!(text, "¡Hola! 🐶");
    assert_eq!(recorded.auth.lock().unwrap()[0], "Bearer sk-test");

    let body = recorded.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert!((body["temperature"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hola");
}

#[tokio::test]
async fn multimodal_parts_are_serialized_as_typed_parts() {
    use akira::completion::{ContentPart, ImageUrl};

    let (base_url, recorded) = spawn_server(|_| completion_json("una foto")).await;
    let service = create_service(&config(&base_url)).unwrap();

    let request = CompletionRequest::new(vec![ChatMessage::user_parts(vec![
        ContentPart::Text {
            text: "Objetivo: analiza".into(),
        },
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "data:image/png;base64,AAAA".into(),
            },
        },
    ])]);
    service.complete(request).await.unwrap();

    let body = recorded.bodies.lock().unwrap()[0].clone();
    let parts = &body["messages"][0]["content"];
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[1]["type"], "image_url");
    assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    assert!(body.get("temperature").is_none());
}

#[tokio::test]
async fn unauthorized_is_classified() {
    let (base_url, _) =
        spawn_server(|_| (StatusCode::UNAUTHORIZED, "invalid api key").into_response()).await;
    let service = create_service(&config(&base_url)).unwrap();

    let err = service.complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Unauthorized { status: 401 }));
}

#[tokio::test]
async fn rate_limit_keeps_the_body() {
    let (base_url, _) = spawn_server(|_| {
        (StatusCode::TOO_MANY_REQUESTS, "insufficient_quota").into_response()
    })
    .await;
    let service = create_service(&config(&base_url)).unwrap();

    match service.complete(request()).await.unwrap_err() {
        CompletionError::RateLimited { body } => assert_eq!(body, "insufficient_quota"),
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_are_an_error() {
    let (base_url, _) = spawn_server(|_| Json(json!({"choices": []})).into_response()).await;
    let service = create_service(&config(&base_url)).unwrap();

    let err = service.complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Empty));
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let (base_url, _) = spawn_server(|_| "<html>gateway</html>".into_response()).await;
    let service = create_service(&config(&base_url)).unwrap();

    let err = service.complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Malformed(_)));
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            completion_json("tarde")
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let service = create_service(&config(&format!("http://{addr}/v1"))).unwrap();
    let err = service.complete(request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Timeout(d) if d == Duration::from_secs(1)));
}

#[test]
fn unknown_provider_is_rejected() {
    let config = CompletionConfig {
        provider: "llama".into(),
        ..CompletionConfig::default()
    };
    let err = create_service(&config).err().unwrap();
    assert!(err.to_string().contains("unknown completion provider"));
}
