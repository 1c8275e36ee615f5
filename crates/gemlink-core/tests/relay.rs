//! Integration tests for the relay against a mock Generative Language API.
//!
//! Verifies URL construction, verbatim payload forwarding, failure
//! classification, per-request correlation under concurrency, and the
//! NDJSON transport.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use gemlink_core::protocol::RelayMessage;
use gemlink_core::{
    CorrelationId, Credential, Outcome, Relay, RelayClient, RelayConfig, RequestEnvelope,
    StaticCredential, stdio,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn relay_for(server: &MockServer) -> Relay {
    Relay::new(RelayConfig {
        base_url: format!("{}/v1beta", server.uri()),
        timeout: Some(Duration::from_secs(10)),
    })
    .expect("build relay")
}

fn envelope(id: &str, payload: Value) -> RequestEnvelope {
    RequestEnvelope {
        correlation_id: CorrelationId::from(id),
        credential: Credential::new("test-key"),
        target: "gemini-2.5-flash".to_string(),
        payload,
    }
}

#[tokio::test]
async fn test_success_body_is_returned_unmodified() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let reply = json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Hello!"}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2}
    });
    let payload = json!({
        "contents": [{"role": "user", "parts": [{"text": "Hi"}]}],
        "generationConfig": {"temperature": 0.2}
    });

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let response = relay_for(&server).execute(envelope("req-1", payload)).await;

    assert_eq!(response.correlation_id.as_str(), "req-1");
    assert_eq!(response.outcome, Outcome::Success { body: reply });
}

#[tokio::test]
async fn test_429_reports_remote_error_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string(r#"{"error":{"message":"quota exceeded"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = relay_for(&server).execute(envelope("req-429", json!({}))).await;

    assert_eq!(response.correlation_id.as_str(), "req-429");
    assert_eq!(
        response.outcome,
        Outcome::Failure {
            message: "HTTP 429: quota exceeded".to_string()
        }
    );
}

#[tokio::test]
async fn test_503_with_unparsable_body_uses_status_text() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>upstream down</html>"))
        .mount(&server)
        .await;

    let response = relay_for(&server).execute(envelope("req-503", json!({}))).await;

    let Outcome::Failure { message } = response.outcome else {
        panic!("expected failure");
    };
    assert!(message.starts_with("HTTP 503"), "message: {message}");
    assert!(message.contains("Service Unavailable"), "message: {message}");
}

#[tokio::test]
async fn test_unparsable_success_body_is_a_failure() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let response = relay_for(&server).execute(envelope("req-bad", json!({}))).await;

    let Outcome::Failure { message } = response.outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("Failed to parse response body"));
}

#[tokio::test]
async fn test_connection_refused_is_a_failure_without_leaking_key() {
    // Bind then drop to get a port with nothing listening.
    let Ok(listener) = std::net::TcpListener::bind("127.0.0.1:0") else {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    };
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let relay = Relay::new(RelayConfig {
        base_url: format!("http://{addr}/v1beta"),
        timeout: Some(Duration::from_secs(5)),
    })
    .unwrap();
    let mut request = envelope("req-refused", json!({}));
    request.credential = Credential::new("super-secret-key");

    let response = relay.execute(request).await;

    assert_eq!(response.correlation_id.as_str(), "req-refused");
    let Outcome::Failure { message } = response.outcome else {
        panic!("connection refused must never succeed");
    };
    assert!(!message.is_empty());
    assert!(!message.contains("super-secret-key"), "message: {message}");
}

#[tokio::test]
async fn test_spawned_relay_ignores_unknown_message_types() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut handle = relay_for(&server).spawn();
    handle.inbox.send(json!({"type": "PING"})).unwrap();
    handle
        .inbox
        .send(json!({"type": "GEMINI_REQUEST", "data": {"model": "no-id"}}))
        .unwrap();
    handle
        .inbox
        .send(json!({
            "type": "GEMINI_REQUEST",
            "data": {
                "apiKey": "test-key",
                "model": "gemini-2.5-flash",
                "requestBody": {"contents": []},
                "requestId": "only-one"
            }
        }))
        .unwrap();
    drop(handle.inbox);

    let mut responses = Vec::new();
    while let Some(message) = handle.outbox.recv().await {
        responses.push(message);
    }
    handle.task.await.unwrap();

    assert_eq!(
        responses,
        vec![RelayMessage::Success {
            request_id: CorrelationId::from("only-one"),
            data: json!({"candidates": []}),
        }]
    );
}

#[tokio::test]
async fn test_concurrent_requests_are_correlated_without_cross_talk() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;

    // Echo the request's marker back, with a delay that finishes later
    // requests first.
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            let n = body["n"].as_u64().unwrap();
            let delay = Duration::from_millis(200u64.saturating_sub(n * 20));
            if n % 3 == 0 {
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": {"message": format!("boom {n}")}}))
                    .set_delay(delay)
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(json!({"echo": n}))
                    .set_delay(delay)
            }
        })
        .expect(8)
        .mount(&server)
        .await;

    let client = RelayClient::connect(
        relay_for(&server).spawn(),
        Arc::new(StaticCredential::new(Credential::new("test-key"))),
    );

    let pending: Vec<_> = (0..8u64)
        .map(|n| {
            let pending = client
                .submit("gemini-2.5-flash", json!({ "n": n }))
                .unwrap();
            (n, pending)
        })
        .collect();
    let ids: HashSet<CorrelationId> = pending
        .iter()
        .map(|(_, p)| p.correlation_id().clone())
        .collect();
    assert_eq!(ids.len(), 8);

    let results = join_all(pending.into_iter().map(|(n, pending)| async move {
        let id = pending.correlation_id().clone();
        (n, id, pending.await.unwrap())
    }))
    .await;

    for (n, id, response) in results {
        assert_eq!(response.correlation_id, id);
        match response.outcome {
            Outcome::Success { body } => {
                assert_ne!(n % 3, 0);
                assert_eq!(body, json!({ "echo": n }));
            }
            Outcome::Failure { message } => {
                assert_eq!(n % 3, 0);
                assert_eq!(message, format!("HTTP 500: boom {n}"));
            }
        }
    }

    assert_eq!(client.in_flight(), 0);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_abandoned_request_still_runs_and_is_discarded() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"candidates": []}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = RelayClient::connect(
        relay_for(&server).spawn(),
        Arc::new(StaticCredential::new(Credential::new("test-key"))),
    );

    let abandoned = client.submit("gemini-2.5-flash", json!({})).unwrap();
    drop(abandoned);
    let kept = client
        .request("gemini-2.5-flash", json!({}))
        .await
        .unwrap();
    assert!(kept.outcome.is_success());

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_payload_and_body_keep_their_key_order() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    let reply = r#"{"zeta":{"y":1,"x":2},"alpha":[{"b":1,"a":2}]}"#;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(reply, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let sent = r#"{"zeta":1,"alpha":{"b":true,"a":null},"contents":[]}"#;
    let payload: Value = serde_json::from_str(sent).unwrap();
    let response = relay_for(&server).execute(envelope("ordered", payload)).await;

    let received = server.received_requests().await.unwrap();
    assert_eq!(String::from_utf8_lossy(&received[0].body), sent);

    let Outcome::Success { body } = response.outcome else {
        panic!("expected success");
    };
    assert_eq!(serde_json::to_string(&body).unwrap(), reply);
}

#[tokio::test]
async fn test_stdio_relay_survives_undecodable_bytes() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"candidates": []}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = json!({
        "type": "GEMINI_REQUEST",
        "data": {
            "apiKey": "test-key",
            "model": "gemini-2.5-flash",
            "requestBody": {"contents": []},
            "requestId": "slow"
        }
    });
    let mut input = serde_json::to_vec(&request).unwrap();
    input.extend_from_slice(b"\n\xff\xfe garbage\n");

    let mut output = Vec::new();
    stdio::serve_ndjson(relay_for(&server), &input[..], &mut output)
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![json!({"type": "SUCCESS", "requestId": "slow", "data": {"candidates": []}})]
    );
}

#[tokio::test]
async fn test_spawned_relay_answers_malformed_request_by_id() {
    let relay = Relay::new(RelayConfig::default()).expect("build relay");
    let mut handle = relay.spawn();
    handle
        .inbox
        .send(json!({
            "type": "GEMINI_REQUEST",
            "data": {"model": "gemini-2.5-flash", "requestBody": {}, "requestId": 7}
        }))
        .unwrap();
    drop(handle.inbox);

    let message = handle.outbox.recv().await.expect("one response");
    assert!(handle.outbox.recv().await.is_none());
    handle.task.await.unwrap();

    let RelayMessage::Error { request_id, error } = message else {
        panic!("expected an ERROR, got {message:?}");
    };
    assert_eq!(request_id.as_str(), "7");
    assert!(error.starts_with("Invalid GEMINI_REQUEST:"), "error: {error}");
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_rejected_body_is_logged_at_debug_without_key() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED"}}"#,
        ))
        .mount(&server)
        .await;

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("gemlink_core=debug"))
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let response = relay_for(&server).execute(envelope("req-403", json!({}))).await;

    assert_eq!(
        response.outcome,
        Outcome::Failure {
            message: "HTTP 403: denied".to_string()
        }
    );
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("rejected response body"), "logs: {output}");
    assert!(output.contains("PERMISSION_DENIED"), "logs: {output}");
    assert!(!output.contains("test-key"), "logs: {output}");
}
