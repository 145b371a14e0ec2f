//! HTTP client tests against an in-process fake backend.
//!
//! Each test starts a `tiny_http` server on an ephemeral port with a
//! handler closure, points an `HttpBackend` at it, and checks both what the
//! client sent and how it interpreted the reply.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server};

use dpdash::api::{ApiError, Backend, ConfigUpdate, HttpBackend, StreamEvent};
use dpdash::config::schema::BackendConfig;
use dpdash::rules::editor::{RuleEditor, SaveOutcome};

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    body: String,
}

struct Reply {
    status: u16,
    body: String,
    content_type: &'static str,
}

fn json(status: u16, body: &str) -> Reply {
    Reply {
        status,
        body: body.to_string(),
        content_type: "application/json",
    }
}

struct FakeBackend {
    backend: HttpBackend,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeBackend {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve<F>(handler: F) -> FakeBackend
where
    F: Fn(&str, &str, &str) -> Reply + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let method = request.method().to_string();
            let url = request.url().to_string();

            let reply = handler(&method, &url, &body);
            log.lock().unwrap().push(Recorded { method, url, body });

            let header = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
                .unwrap();
            let response = Response::from_string(reply.body)
                .with_status_code(reply.status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });

    let config = BackendConfig {
        url: format!("http://127.0.0.1:{port}"),
        request_timeout_ms: 5_000,
    };
    FakeBackend {
        backend: HttpBackend::from_config(&config),
        requests,
    }
}

// ---------------------------------------------------------------------------
// Config, stats, languages
// ---------------------------------------------------------------------------

#[test]
fn fetch_config_reads_all_sections() {
    let fake = serve(|_, _, _| {
        json(
            200,
            r#"{"basic":{"disable":"false","mode":"Enhanced","timestamp":"1700000000"},
                "protected_paths":["/etc/passwd","/boot"],
                "command_rules":["rm -rf / > echo denied"]}"#,
        )
    });

    let config = fake.backend.fetch_config().unwrap();
    assert_eq!(config.basic.mode(), Some("Enhanced"));
    assert_eq!(config.protected_paths, vec!["/etc/passwd", "/boot"]);
    assert_eq!(config.command_rules, vec!["rm -rf / > echo denied"]);

    let requests = fake.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/api/config");
}

#[test]
fn stats_with_empty_remaining_time() {
    let fake = serve(|_, _, _| json(200, r#"{"protection_count":17,"remaining_time":""}"#));
    let stats = fake.backend.fetch_stats().unwrap();
    assert_eq!(stats.protection_count, 17);
    assert_eq!(stats.remaining_time.as_deref(), Some(""));
}

#[test]
fn languages_list() {
    let fake = serve(|_, _, _| {
        json(
            200,
            r#"[{"code":"en_US","name":"English"},{"code":"zh_CN","name":"简体中文"}]"#,
        )
    });
    let langs = fake.backend.fetch_languages().unwrap();
    assert_eq!(langs.len(), 2);
    assert_eq!(langs[1].code, "zh_CN");
}

#[test]
fn update_sends_only_present_sections() {
    let fake = serve(|_, _, _| json(200, r#"{"message":"Configuration updated successfully"}"#));
    let update = ConfigUpdate {
        protected_paths: Some(vec!["/etc".into()]),
        command_rules: Some(vec![]),
        ..Default::default()
    };

    let ack = fake.backend.update_config(&update).unwrap();
    assert_eq!(ack.message.as_deref(), Some("Configuration updated successfully"));

    let requests = fake.requests();
    assert_eq!(requests[0].method, "POST");
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"protected_paths":["/etc"],"command_rules":[]})
    );
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_text_is_passed_through_verbatim() {
    let fake = serve(|_, _, _| json(500, r#"{"error":"disk full"}"#));
    let err = fake
        .backend
        .update_config(&ConfigUpdate::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "disk full");
}

#[test]
fn non_json_error_uses_fallback() {
    let fake = serve(|_, _, _| Reply {
        status: 502,
        body: "<html>Bad Gateway</html>".into(),
        content_type: "text/html",
    });
    let err = fake.backend.reload().unwrap_err();
    assert_eq!(err.to_string(), "Failed to reload service");
    assert!(matches!(err, ApiError::Status { code: 502, .. }));
}

#[test]
fn command_failure_carries_details() {
    let fake = serve(|_, _, _| {
        json(
            500,
            r#"{"error":"Command execution failed","details":"exit status 127"}"#,
        )
    });
    let err = fake.backend.execute("nosuchcmd").unwrap_err();
    assert_eq!(err.to_string(), "Command execution failed");
    assert_eq!(err.details(), Some("exit status 127"));
}

#[test]
fn unreachable_backend_is_transport_error() {
    let config = BackendConfig {
        // Port 9 (discard) is closed on test hosts.
        url: "http://127.0.0.1:9".into(),
        request_timeout_ms: 1_000,
    };
    let backend = HttpBackend::from_config(&config);
    let err = backend.fetch_stats().unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[test]
fn malformed_success_body_is_decode_error() {
    let fake = serve(|_, _, _| json(200, r#"{"protection_count":"many"}"#));
    let err = fake.backend.fetch_stats().unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[test]
fn execute_posts_command_and_returns_output() {
    let fake = serve(|_, _, body| {
        let req: serde_json::Value = serde_json::from_str(body).unwrap();
        let cmd = req["command"].as_str().unwrap_or("");
        json(200, &serde_json::json!({ "output": format!("ran {cmd}\n") }).to_string())
    });

    let out = fake.backend.execute("uptime").unwrap();
    assert_eq!(out.output, "ran uptime\n");

    let requests = fake.requests();
    assert_eq!(requests[0].url, "/api/command");
}

#[test]
fn reload_and_restart_hit_their_endpoints() {
    let fake = serve(|_, url, _| match url {
        "/api/reload" => json(200, r#"{"message":"Configuration reloaded successfully","output":""}"#),
        _ => json(200, r#"{"message":"Service restarted successfully","output":"ok"}"#),
    });

    let ack = fake.backend.reload().unwrap();
    assert_eq!(ack.message.as_deref(), Some("Configuration reloaded successfully"));
    let ack = fake.backend.restart().unwrap();
    assert_eq!(ack.output.as_deref(), Some("ok"));

    let urls: Vec<String> = fake.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls, vec!["/api/reload", "/api/restart"]);
}

// ---------------------------------------------------------------------------
// Log stream
// ---------------------------------------------------------------------------

#[test]
fn log_stream_yields_lines_errors_then_closed() {
    let fake = serve(|_, _, _| Reply {
        status: 200,
        body: "event:log\ndata:first line\n\nevent:error\ndata:Failed to open log file\n\nevent:log\ndata:second line\n\n".into(),
        content_type: "text/event-stream",
    });

    let events: Vec<StreamEvent> = fake.backend.open_log_stream().unwrap().collect();
    assert_eq!(
        events,
        vec![
            StreamEvent::Line("first line".into()),
            StreamEvent::ServerError("Failed to open log file".into()),
            StreamEvent::Line("second line".into()),
            StreamEvent::Closed(None),
        ]
    );
}

#[test]
fn log_stream_open_failure_is_status_error() {
    let fake = serve(|_, _, _| json(500, r#"{"error":"streaming unsupported"}"#));
    let err = fake.backend.open_log_stream().err().unwrap();
    assert_eq!(err.to_string(), "streaming unsupported");
}

// ---------------------------------------------------------------------------
// Editor round trip over HTTP
// ---------------------------------------------------------------------------

#[test]
fn editor_save_failure_keeps_rows_and_reports_text() {
    let fake = serve(|method, _, _| match method {
        "GET" => json(
            200,
            r#"{"basic":{},"protected_paths":["/etc"],"command_rules":[]}"#,
        ),
        _ => json(500, r#"{"error":"disk full"}"#),
    });

    let mut editor = RuleEditor::new();
    editor.load(&fake.backend);
    let before = editor.paths.export();

    let outcome = editor.save(&fake.backend);
    assert_eq!(outcome, SaveOutcome::Failed("disk full".into()));
    assert_eq!(editor.paths.export(), before);
    assert_eq!(editor.save_error(), Some("disk full"));
}

#[test]
fn editor_save_success_reloads_from_backend() {
    let stored = Arc::new(Mutex::new(
        r#"{"basic":{},"protected_paths":[],"command_rules":[]}"#.to_string(),
    ));
    let state = Arc::clone(&stored);
    let fake = serve(move |method, _, body| match method {
        "GET" => json(200, &state.lock().unwrap()),
        _ => {
            // Persist what was posted, normalized the way a backend might.
            let update: serde_json::Value = serde_json::from_str(body).unwrap();
            let paths: Vec<String> = update["protected_paths"]
                .as_array()
                .unwrap()
                .iter()
                .map(|p| p.as_str().unwrap().to_uppercase())
                .collect();
            *state.lock().unwrap() = serde_json::json!({
                "basic": {},
                "protected_paths": paths,
                "command_rules": update["command_rules"],
            })
            .to_string();
            json(200, r#"{"message":"Configuration updated successfully"}"#)
        }
    });

    let mut editor = RuleEditor::new();
    editor.load(&fake.backend);
    editor
        .paths
        .set_draft_field(dpdash::rules::DraftField::Path, "/etc/shadow");
    editor.paths.confirm_draft();

    assert_eq!(editor.save(&fake.backend), SaveOutcome::Saved);
    assert_eq!(editor.paths.export(), vec!["/ETC/SHADOW"]);
    assert!(editor.paths.rows().last().unwrap().is_draft());
}
