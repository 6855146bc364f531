//! Judgement adapter tests against a canned-response HTTP stub.

use canvass_types::Judgement;
use canvass_voice::{JudgeConfig, JudgeService};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned chat-completion reply per queued string, one connection
/// each, then stops accepting. `Connection: close` keeps reqwest from
/// pipelining onto a finished socket.
async fn spawn_chat_stub(replies: Vec<ChatStubReply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for reply in replies {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };

            // Drain the request: headers, then content-length bytes of body.
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let body_start = loop {
                let n = stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_header_end(&buf) {
                    break Some(pos);
                }
            };
            if let Some(body_start) = body_start {
                let headers = String::from_utf8_lossy(&buf[..body_start]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < body_start + content_length {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
            }

            let (status, body) = match reply {
                ChatStubReply::Content(content) => (
                    "200 OK",
                    format!(
                        r#"{{"choices":[{{"message":{{"role":"assistant","content":"{}"}}}}]}}"#,
                        content
                    ),
                ),
                ChatStubReply::ServerError => {
                    ("500 Internal Server Error", r#"{"error":"boom"}"#.to_string())
                }
            };

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    format!("http://{}", addr)
}

enum ChatStubReply {
    Content(&'static str),
    ServerError,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn judge_for(base_url: String) -> JudgeService {
    JudgeService::new(JudgeConfig {
        api_base_url: base_url,
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn valid_verdict_accepts_the_original_answer() {
    let base = spawn_chat_stub(vec![ChatStubReply::Content("Valid")]).await;
    let judge = judge_for(base);

    let judgement = judge
        .evaluate_answer("Where are you traveling to?", "Paris in the spring")
        .await
        .unwrap();

    assert_eq!(
        judgement,
        Judgement::Accepted {
            value: "Paris in the spring".to_string()
        }
    );
}

#[tokio::test]
async fn invalid_verdict_generates_a_follow_up() {
    let base = spawn_chat_stub(vec![
        ChatStubReply::Content("Invalid"),
        ChatStubReply::Content("Could you name the city you are traveling to?"),
    ])
    .await;
    let judge = judge_for(base);

    let judgement = judge
        .evaluate_answer("Where are you traveling to?", "hmm somewhere nice")
        .await
        .unwrap();

    assert_eq!(
        judgement,
        Judgement::FollowUp {
            question: "Could you name the city you are traveling to?".to_string()
        }
    );
}

#[tokio::test]
async fn server_error_is_a_judgement_error() {
    let base = spawn_chat_stub(vec![ChatStubReply::ServerError]).await;
    let judge = judge_for(base);

    let err = judge
        .evaluate_answer("Where are you traveling to?", "Paris")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}
