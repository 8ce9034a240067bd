//! End-to-end webhook tests against a programmable mock RAGFlow backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wechat_rag_bridge::answer::PROCESSING_NOTICE;
use wechat_rag_bridge::wechat::signature;

mod common;

const ANSWER_JSON: &str = r#"{"code":0,"data":{"answer":"The answer is 42.","session_id":"sess-1"}}"#;
const SESSION_JSON: &str = r#"{"code":0,"data":{"id":"sess-1"}}"#;
const RETRIEVAL_JSON: &str = r#"{"code":0,"data":[]}"#;

/// Counters observed by a standard well-behaved mock backend.
struct BackendCounters {
    sessions: Arc<AtomicU32>,
    completions: Arc<AtomicU32>,
}

/// Start a mock backend that answers instantly after `completion_delay`.
async fn start_backend(completion_delay: Duration) -> (std::net::SocketAddr, BackendCounters) {
    let sessions = Arc::new(AtomicU32::new(0));
    let completions = Arc::new(AtomicU32::new(0));
    let (s, c) = (sessions.clone(), completions.clone());

    let addr = common::start_mock_ragflow(move |req| {
        let (s, c) = (s.clone(), c.clone());
        async move {
            if req.path.contains("/sessions") {
                s.fetch_add(1, Ordering::SeqCst);
                (200, SESSION_JSON.to_string())
            } else if req.path.contains("/completions") {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(completion_delay).await;
                (200, ANSWER_JSON.to_string())
            } else {
                (200, RETRIEVAL_JSON.to_string())
            }
        }
    })
    .await;

    (
        addr,
        BackendCounters {
            sessions,
            completions,
        },
    )
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client")
}

#[tokio::test]
async fn fast_backend_is_answered_synchronously() {
    let (backend, _counters) = start_backend(Duration::ZERO).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    let reply = common::send_text(&client, bridge, "user-a", "msg-1", "what is the answer?").await;
    assert_eq!(common::reply_content(&reply), "The answer is 42.");
    assert!(reply.contains("<ToUserName><![CDATA[user-a]]></ToUserName>"));
    assert!(reply.contains("<FromUserName><![CDATA[gh_bridge]]></FromUserName>"));

    shutdown.trigger();
}

#[tokio::test]
async fn slow_backend_gets_notice_then_status_finds_the_answer() {
    let (backend, counters) = start_backend(Duration::from_secs(2)).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    // Local deadline is 1s; the 2s completion loses the race.
    let reply = common::send_text(&client, bridge, "user-a", "msg-1", "slow question").await;
    assert_eq!(common::reply_content(&reply), PROCESSING_NOTICE);

    // The detached continuation finishes and lands in the store.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let status = common::send_text(&client, bridge, "user-a", "msg-2", "/status").await;
    let status_content = common::reply_content(&status);
    assert!(status_content.contains("The answer is 42."), "{status_content}");

    // A redelivery of the original id sees the final answer too.
    let redelivered = common::send_text(&client, bridge, "user-a", "msg-1", "slow question").await;
    assert_eq!(common::reply_content(&redelivered), "The answer is 42.");
    assert_eq!(counters.completions.load(Ordering::SeqCst), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn redelivery_never_starts_duplicate_backend_work() {
    let (backend, counters) = start_backend(Duration::from_secs(2)).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    let first = common::send_text(&client, bridge, "user-a", "msg-1", "question").await;
    assert_eq!(common::reply_content(&first), PROCESSING_NOTICE);

    // Immediate redelivery with the same message id: pending notice,
    // and no second completion call.
    let second = common::send_text(&client, bridge, "user-a", "msg-1", "question").await;
    assert_eq!(common::reply_content(&second), PROCESSING_NOTICE);
    assert_eq!(counters.completions.load(Ordering::SeqCst), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn session_is_created_once_and_reused() {
    let (backend, counters) = start_backend(Duration::ZERO).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    common::send_text(&client, bridge, "user-a", "msg-1", "first question").await;
    common::send_text(&client, bridge, "user-a", "msg-2", "second question").await;

    assert_eq!(counters.sessions.load(Ordering::SeqCst), 1);
    assert_eq!(counters.completions.load(Ordering::SeqCst), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn reset_forces_a_fresh_session() {
    let (backend, counters) = start_backend(Duration::ZERO).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    common::send_text(&client, bridge, "user-a", "msg-1", "first question").await;
    let reset = common::send_text(&client, bridge, "user-a", "msg-2", "/reset").await;
    assert!(common::reply_content(&reset).contains("reset"));
    common::send_text(&client, bridge, "user-a", "msg-3", "second question").await;

    assert_eq!(counters.sessions.load(Ordering::SeqCst), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn method_flips_to_get_after_405() {
    let addr = common::start_mock_ragflow(|req| async move {
        if req.path.contains("/sessions") {
            (200, SESSION_JSON.to_string())
        } else if req.path.contains("/completions") {
            if req.method == "POST" {
                (405, "{}".to_string())
            } else {
                (200, ANSWER_JSON.to_string())
            }
        } else {
            (200, RETRIEVAL_JSON.to_string())
        }
    })
    .await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(addr)).await;
    let client = http_client();

    let reply = common::send_text(&client, bridge, "user-a", "msg-1", "question").await;
    assert_eq!(common::reply_content(&reply), "The answer is 42.");

    shutdown.trigger();
}

#[tokio::test]
async fn session_creation_failure_becomes_an_apology() {
    let addr = common::start_mock_ragflow(|req| async move {
        if req.path.contains("/sessions") {
            (200, r#"{"code":102,"message":"no authorization"}"#.to_string())
        } else {
            (200, RETRIEVAL_JSON.to_string())
        }
    })
    .await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(addr)).await;
    let client = http_client();

    let reply = common::send_text(&client, bridge, "user-a", "msg-1", "question").await;
    let content = common::reply_content(&reply);
    assert!(content.starts_with("Sorry"), "{content}");
    assert!(content.contains("no authorization"), "{content}");

    shutdown.trigger();
}

#[tokio::test]
async fn status_before_readiness_reports_the_pending_question() {
    let (backend, _counters) = start_backend(Duration::from_secs(5)).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    common::send_text(&client, bridge, "user-a", "msg-1", "a hard question").await;
    let status = common::send_text(&client, bridge, "user-a", "msg-2", "/status").await;
    let content = common::reply_content(&status);
    assert!(content.contains("a hard question"), "{content}");
    assert!(content.contains("still being processed"), "{content}");

    shutdown.trigger();
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let (backend, _counters) = start_backend(Duration::ZERO).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    let response = client
        .post(format!(
            "http://{bridge}/wechat?signature=bogus&timestamp=1700000000&nonce=n"
        ))
        .body("<xml></xml>")
        .send()
        .await
        .expect("bridge unreachable");
    assert_eq!(response.status(), 403);

    shutdown.trigger();
}

#[tokio::test]
async fn handshake_echoes_echostr() {
    let (backend, _counters) = start_backend(Duration::ZERO).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    let timestamp = "1700000000";
    let nonce = "n-42";
    let sig = signature::compute(common::TOKEN, timestamp, nonce);

    let ok = client
        .get(format!(
            "http://{bridge}/wechat?signature={sig}&timestamp={timestamp}&nonce={nonce}&echostr=ping-pong"
        ))
        .send()
        .await
        .expect("bridge unreachable");
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.text().await.unwrap(), "ping-pong");

    let bad = client
        .get(format!(
            "http://{bridge}/wechat?signature=wrong&timestamp={timestamp}&nonce={nonce}&echostr=ping-pong"
        ))
        .send()
        .await
        .expect("bridge unreachable");
    assert_eq!(bad.status(), 403);

    shutdown.trigger();
}

#[tokio::test]
async fn non_text_messages_get_a_fixed_reply() {
    let (backend, counters) = start_backend(Duration::ZERO).await;
    let (bridge, shutdown) = common::spawn_bridge(common::test_config(backend)).await;
    let client = http_client();

    let timestamp = "1700000000";
    let nonce = "n-1";
    let sig = signature::compute(common::TOKEN, timestamp, nonce);
    let xml = "<xml>\
        <ToUserName><![CDATA[gh_bridge]]></ToUserName>\
        <FromUserName><![CDATA[user-a]]></FromUserName>\
        <CreateTime>1700000000</CreateTime>\
        <MsgType><![CDATA[image]]></MsgType>\
        <MsgId>msg-img</MsgId>\
        </xml>";

    let reply = client
        .post(format!(
            "http://{bridge}/wechat?signature={sig}&timestamp={timestamp}&nonce={nonce}"
        ))
        .body(xml)
        .send()
        .await
        .expect("bridge unreachable")
        .text()
        .await
        .unwrap();

    assert!(common::reply_content(&reply).contains("text messages"));
    assert_eq!(counters.completions.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}
