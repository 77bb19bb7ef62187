mod helpers;

use std::sync::Arc;
use std::time::Duration;

use akira::akira::{Akira, AkiraSettings};
use akira::media::extract::BuiltinExtractor;
use akira::store::{StateStore, UserKey};
use akira::webhook::{router, ChannelSettings, WebhookState, BANNER, WEBHOOK_ALIVE};
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::get;
use helpers::{analyzer, temp_store, FixedOcr, ScriptedCompletion};
use tower::ServiceExt;

const FORM: &str = "application/x-www-form-urlencoded";

fn channel(max_reply_chars: usize) -> ChannelSettings {
    ChannelSettings {
        max_reply_chars,
        account_sid: Some("AC123".into()),
        auth_token: Some("secreto".into()),
        download_timeout: Duration::from_secs(5),
    }
}

fn app(akira: Akira, max_reply_chars: usize) -> axum::Router {
    let state = WebhookState::new(Arc::new(akira), channel(max_reply_chars));
    router(Arc::new(state), "/whatsapp")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post(form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/whatsapp")
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from(form.to_string()))
        .unwrap()
}

#[tokio::test]
async fn liveness_routes() {
    let (store, _tmp) = temp_store();
    let akira = helpers::akira_with(store, Arc::new(ScriptedCompletion::new()), AkiraSettings::default());
    let app = app(akira, 1400);

    for (uri, expected) in [("/", BANNER), ("/healthz", "OK"), ("/whatsapp", WEBHOOK_ALIVE)] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_eq!(body_text(response).await, expected);
    }
}

#[tokio::test]
async fn text_message_is_answered_with_twiml() {
    let (store, _tmp) = temp_store();
    let akira = helpers::akira_with(
        store.clone(),
        Arc::new(ScriptedCompletion::new()),
        AkiraSettings::default(),
    );

    let response = app(akira, 1400)
        .oneshot(post("From=whatsapp%3A%2B34600000001&Body=me+llamo+Ana&NumMedia=0&SmsSid=SM1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/xml"
    );
    let body = body_text(response).await;
    assert!(body.starts_with("<?xml"));
    assert!(body.contains("<Message>¡Mucho gusto, Ana! 🐶💙 Lo guardo.</Message>"));

    let state = store.load(&UserKey::sanitize("+34600000001"));
    assert_eq!(state.memory.user_name.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn control_characters_from_the_sender_stay_valid_xml() {
    let (store, _tmp) = temp_store();
    let akira = helpers::akira_with(store, Arc::new(ScriptedCompletion::new()), AkiraSettings::default());

    let response = app(akira, 1400)
        .oneshot(post("From=%2B1&Body=me+llamo+Ana%01"))
        .await
        .unwrap();

    let body = body_text(response).await;
    assert!(body.contains("<Message>¡Mucho gusto, Ana\u{FFFD}! 🐶💙 Lo guardo.</Message>"));
    assert!(!body.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')));
}

#[tokio::test]
async fn long_replies_are_split_into_numbered_messages() {
    let (store, _tmp) = temp_store();
    let completion = Arc::new(ScriptedCompletion::new().then_ok("x".repeat(3000)));
    let akira = helpers::akira_with(store, completion, AkiraSettings::default());

    let response = app(akira, 1400)
        .oneshot(post("From=%2B1&Body=cu%C3%A9ntame+una+historia"))
        .await
        .unwrap();

    let body = body_text(response).await;
    assert_eq!(body.matches("<Message>").count(), 3);
    assert!(body.contains("<Message>(1/3)\n"));
    assert!(body.contains("<Message>(3/3)\n"));
}

#[tokio::test]
async fn malformed_form_still_gets_200_and_an_apology() {
    let (store, _tmp) = temp_store();
    let akira = helpers::akira_with(store, Arc::new(ScriptedCompletion::new()), AkiraSettings::default());

    let request = Request::builder()
        .method("POST")
        .uri("/whatsapp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app(akira, 1400).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Ups, tuve un problema procesando tu mensaje 🤕\nDetalle: "));
}

#[tokio::test]
async fn media_without_url_gets_an_apology() {
    let (store, _tmp) = temp_store();
    let completion = Arc::new(ScriptedCompletion::new());
    let akira = helpers::akira_with(store, completion.clone(), AkiraSettings::default());

    let response = app(akira, 1400)
        .oneshot(post("From=%2B1&Body=&NumMedia=1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("MediaUrl0"));
    assert_eq!(completion.call_count(), 0);
}

#[tokio::test]
async fn garbled_media_count_is_treated_as_text() {
    let (store, _tmp) = temp_store();
    let completion = Arc::new(ScriptedCompletion::new().then_ok("hola 🐶"));
    let akira = helpers::akira_with(store, completion, AkiraSettings::default());

    let response = app(akira, 1400)
        .oneshot(post("From=%2B1&Body=hola&NumMedia=abc"))
        .await
        .unwrap();

    assert!(body_text(response).await.contains("<Message>hola 🐶</Message>"));
}

/// Serves a text attachment that requires the configured basic-auth credentials.
async fn spawn_media_server() -> String {
    async fn attachment(headers: HeaderMap) -> (StatusCode, &'static str) {
        // base64("AC123:secreto")
        let expected = "Basic QUMxMjM6c2VjcmV0bw==";
        match headers.get(header::AUTHORIZATION) {
            Some(value) if value == expected => (StatusCode::OK, "La célula es la unidad básica de la vida."),
            _ => (StatusCode::UNAUTHORIZED, "unauthorized"),
        }
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let media = axum::Router::new().route("/media/1", get(attachment));
    tokio::spawn(async move {
        axum::serve(listener, media).await.unwrap();
    });
    format!("http://{addr}/media/1")
}

#[tokio::test]
async fn document_attachment_is_downloaded_and_explained() {
    let url = spawn_media_server().await;
    let (store, _tmp) = temp_store();
    let completion = Arc::new(ScriptedCompletion::new().then_ok("Explicación paso a paso."));
    let media = analyzer(completion.clone(), BuiltinExtractor, FixedOcr(None));
    let akira = Akira::new(store, completion.clone(), media, AkiraSettings::default());

    let form = format!(
        "From=%2B1&Body=Expl%C3%ADcame+esto&NumMedia=1&MediaUrl0={}&MediaContentType0=text%2Fplain",
        url.replace(':', "%3A").replace('/', "%2F")
    );
    let response = app(akira, 1400).oneshot(post(&form)).await.unwrap();

    let body = body_text(response).await;
    assert!(body.contains("<Message>Explicación paso a paso.</Message>"), "{body}");

    let request = &completion.requests()[0];
    let user = request.messages[1].text().unwrap();
    assert!(user.starts_with("Instrucción: explica paso a paso"));
    assert!(user.contains("La célula es la unidad básica de la vida."));
}

#[tokio::test]
async fn rejected_download_gets_an_apology() {
    let url = spawn_media_server().await;
    let (store, _tmp) = temp_store();
    let completion = Arc::new(ScriptedCompletion::new());
    let akira = helpers::akira_with(store, completion.clone(), AkiraSettings::default());
    let state = WebhookState::new(
        Arc::new(akira),
        ChannelSettings {
            account_sid: None,
            auth_token: None,
            ..channel(1400)
        },
    );

    let form = format!(
        "From=%2B1&NumMedia=1&MediaUrl0={}&MediaContentType0=application%2Fpdf",
        url.replace(':', "%3A").replace('/', "%2F")
    );
    let response = router(Arc::new(state), "/whatsapp")
        .oneshot(post(&form))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("media download rejected"), "{body}");
    assert_eq!(completion.call_count(), 0);
}
