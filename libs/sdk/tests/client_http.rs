use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use engage_sdk::{
    ApiError, BloomreachClient, Credentials, CustomerEvent, CustomerIds, EmailRecipient,
    EngagementApi, EventTimestamp, SmsContent, SmsRecipient, TransactionalEmail,
    TransactionalSms, build_auth_header,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Captured {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone, Default)]
struct MockPlatform {
    captured: Arc<Mutex<Vec<Captured>>>,
    replies: Arc<Mutex<HashMap<String, (StatusCode, String)>>>,
}

impl MockPlatform {
    fn reply(&self, path: &str, status: StatusCode, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    fn captured(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

async fn capture(
    State(mock): State<MockPlatform>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let path = uri.path().to_string();
    mock.captured.lock().unwrap().push(Captured {
        method,
        path: path.clone(),
        headers,
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });
    mock.replies
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, "no reply scripted".into()))
}

// Skips when binding to localhost is not permitted in the current environment.
async fn start_mock() -> Option<(MockPlatform, SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("skipping engagement api http test: {err}");
            return None;
        }
    };
    let mock = MockPlatform::default();
    let app = Router::new().fallback(capture).with_state(mock.clone());
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            eprintln!("engagement api mock server error: {err}");
        }
    });
    Some((mock, addr, server))
}

fn client_for(addr: SocketAddr) -> BloomreachClient {
    BloomreachClient::new(
        reqwest::Client::new(),
        Credentials::new("key-1", "secret-1"),
        Some(format!("http://{addr}")),
    )
    .unwrap()
}

fn registered(id: &str) -> CustomerIds {
    let mut ids = CustomerIds::new();
    ids.insert("registered".into(), id.into());
    ids
}

fn assert_standard_headers(captured: &Captured) {
    assert_eq!(captured.method, Method::POST);
    assert_eq!(
        captured.headers["authorization"],
        build_auth_header("key-1", "secret-1").as_str()
    );
    assert_eq!(captured.headers["accept"], "application/json");
    assert_eq!(captured.headers["content-type"], "application/json");
}

#[tokio::test]
async fn email_send_posts_to_sync_endpoint() {
    let Some((mock, addr, server)) = start_mock().await else {
        return;
    };
    mock.reply(
        "/email/v2/projects/P/sync",
        StatusCode::OK,
        r#"{"message_id":"msg-42"}"#,
    );

    let email = TransactionalEmail {
        integration_id: "int-1".into(),
        template_id: "tmpl_1".into(),
        campaign_name: "Order Campaign".into(),
        recipient: EmailRecipient {
            email: "a@b.com".into(),
            customer_ids: registered("a@b.com"),
            language: None,
        },
        params: Some(json!({"n": "1"}).as_object().unwrap().clone()),
        ..TransactionalEmail::default()
    };
    let message_id = client_for(addr)
        .send_transactional_email("P", &email)
        .await
        .unwrap();
    assert_eq!(message_id, "msg-42");

    let captured = mock.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].path, "/email/v2/projects/P/sync");
    assert_standard_headers(&captured[0]);
    assert_eq!(
        captured[0].body,
        json!({
            "integration_id": "int-1",
            "email_content": {"template_id": "tmpl_1", "params": {"n": "1"}},
            "campaign_name": "Order Campaign",
            "recipient": {"email": "a@b.com", "customer_ids": {"registered": "a@b.com"}}
        })
    );

    server.abort();
}

#[tokio::test]
async fn sms_send_omits_unset_fields() {
    let Some((mock, addr, server)) = start_mock().await else {
        return;
    };
    mock.reply(
        "/sms/v1/projects/P/sync",
        StatusCode::OK,
        r#"{"message_id":"sms-1"}"#,
    );

    let sms = TransactionalSms {
        campaign_name: "Shipping".into(),
        content: SmsContent::template("sms_tmpl", None),
        recipient: SmsRecipient {
            phone: Some("+1234567890".into()),
            customer_ids: CustomerIds::new(),
            language: Some("en".into()),
        },
        integration_id: Some("sms-int".into()),
        settings: None,
    };
    let message_id = client_for(addr)
        .send_transactional_sms("P", &sms)
        .await
        .unwrap();
    assert_eq!(message_id, "sms-1");

    let captured = mock.captured();
    assert_standard_headers(&captured[0]);
    assert_eq!(
        captured[0].body,
        json!({
            "integration_id": "sms-int",
            "content": {"template_id": "sms_tmpl"},
            "campaign_name": "Shipping",
            "recipient": {"phone": "+1234567890", "customer_ids": {}, "language": "en"}
        })
    );

    server.abort();
}

#[tokio::test]
async fn add_event_reports_success_and_rejection() {
    let Some((mock, addr, server)) = start_mock().await else {
        return;
    };
    let client = client_for(addr);
    let path = "/track/v2/projects/P/customers/events";
    mock.reply(path, StatusCode::OK, r#"{"success":true}"#);

    let mut ids = CustomerIds::new();
    ids.insert("id".into(), "u1".into());
    let event = CustomerEvent {
        customer_ids: ids,
        event_type: "order_placed".into(),
        properties: Some(json!({"total": 99.5}).as_object().unwrap().clone()),
        timestamp: Some(EventTimestamp::Text("Tue, 20 Oct 2026 10:00:00 GMT".into())),
    };
    assert!(client.add_event("P", &event).await.unwrap());

    mock.reply(path, StatusCode::OK, r#"{"success":false,"errors":"bad"}"#);
    let err = client.add_event("P", &event).await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected { .. }));
    assert!(err.to_string().contains("bad"), "unexpected error: {err}");

    let captured = mock.captured();
    assert_eq!(captured.len(), 2);
    assert_standard_headers(&captured[0]);
    assert_eq!(
        captured[0].body,
        json!({
            "customer_ids": {"id": "u1"},
            "event_type": "order_placed",
            "properties": {"total": 99.5},
            "timestamp": "Tue, 20 Oct 2026 10:00:00 GMT"
        })
    );

    server.abort();
}

#[tokio::test]
async fn non_json_and_error_statuses_fail() {
    let Some((mock, addr, server)) = start_mock().await else {
        return;
    };
    let client = client_for(addr);
    mock.reply("/email/v2/projects/P/sync", StatusCode::OK, "<html>oops</html>");
    mock.reply(
        "/sms/v1/projects/P/sync",
        StatusCode::UNAUTHORIZED,
        r#"{"errors":["invalid credentials"]}"#,
    );

    let err = client
        .send_transactional_email("P", &TransactionalEmail::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }), "unexpected error: {err}");

    let err = client
        .send_transactional_sms("P", &TransactionalSms::default())
        .await
        .unwrap_err();
    match err {
        ApiError::Remote { status, body, .. } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains("invalid credentials"));
        }
        other => panic!("unexpected error: {other}"),
    }

    server.abort();
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("skipping transport error test: {err}");
            return;
        }
    };
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr)
        .add_event("P", &CustomerEvent::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport { .. }), "unexpected error: {err}");
}
