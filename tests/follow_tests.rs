//! Live follow sessions over a real socket.

use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tailserve::{AppState, Config};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(10);

/// Follows through a shell that records its pid, then execs into `tail -f`.
fn recording_config() -> Config {
    Config {
        follow_program: "sh".to_string(),
        follow_args: vec![
            "-c".to_string(),
            "echo $$ > \"$0.pid\"; exec tail -f \"$0\"".to_string(),
        ],
        ..Config::default()
    }
}

async fn start_server(root: &Path) -> std::net::SocketAddr {
    start_server_with_config(root, recording_config()).await
}

async fn start_server_with_config(root: &Path, config: Config) -> std::net::SocketAddr {
    let app = tailserve::app(AppState::with_config(root.to_path_buf(), config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn open_follow(addr: std::net::SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    // Read the response head byte by byte so no frame bytes are swallowed
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let mut byte = [0u8; 1];
        let n = timeout(WAIT, stream.read(&mut byte)).await.unwrap().unwrap();
        assert_eq!(n, 1, "connection closed during handshake");
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {}", head);
    assert!(head.contains("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    stream
}

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(header[0], 0x82);
    assert_eq!(header[1] & 0x80, 0, "server frames are never masked");
    let len = match header[1] {
        126 => stream.read_u16().await.unwrap() as usize,
        127 => stream.read_u64().await.unwrap() as usize,
        n => n as usize,
    };
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    payload
}

/// Collect frame payloads until `needle` shows up.
async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut received = String::new();
    timeout(WAIT, async {
        while !received.contains(needle) {
            received.push_str(&String::from_utf8_lossy(&read_frame(stream).await));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never received {:?}, got {:?}", needle, received));
    received
}

async fn wait_for_pid(pid_file: &Path) -> String {
    timeout(WAIT, async {
        loop {
            if let Ok(pid) = std::fs::read_to_string(pid_file) {
                let pid = pid.trim().to_string();
                if !pid.is_empty() {
                    return pid;
                }
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap()
}

fn is_alive(pid: &str) -> bool {
    Command::new("kill")
        .args(["-0", pid])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn append(path: &Path, line: &str) {
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(line.as_bytes()).unwrap();
}

#[tokio::test]
async fn test_follow_streams_appended_lines() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let log = root.join("app.log");
    std::fs::write(&log, "first line\n").unwrap();
    let addr = start_server(&root).await;

    let mut stream = open_follow(addr, "/app.log").await;
    read_until(&mut stream, "first line").await;

    append(&log, "second line\n");
    read_until(&mut stream, "second line").await;
}

#[tokio::test]
async fn test_client_disconnect_kills_process() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("app.log"), "hello\n").unwrap();
    let addr = start_server(&root).await;

    let mut stream = open_follow(addr, "/app.log").await;
    let pid = wait_for_pid(&root.join("app.log.pid")).await;
    read_until(&mut stream, "hello").await;
    assert!(is_alive(&pid));

    drop(stream);

    timeout(WAIT, async {
        while is_alive(&pid) {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("follow process outlived its connection");
}

#[tokio::test]
async fn test_process_death_closes_connection() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("app.log"), "hello\n").unwrap();
    let addr = start_server(&root).await;

    let mut stream = open_follow(addr, "/app.log").await;
    let pid = wait_for_pid(&root.join("app.log.pid")).await;
    read_until(&mut stream, "hello").await;

    let killed = Command::new("kill").args(["-9", &pid]).status().unwrap();
    assert!(killed.success());

    // EOF or a reset both mean the server let go of the connection
    let mut rest = Vec::new();
    let _ = timeout(WAIT, stream.read_to_end(&mut rest))
        .await
        .expect("connection outlived its follow process");
}

#[tokio::test]
async fn test_spawn_failure_closes_connection_without_frames() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("a.log"), "never streamed\n").unwrap();
    let config = Config {
        follow_program: "/nonexistent/follow-program".to_string(),
        ..Config::default()
    };
    let addr = start_server_with_config(&root, config).await;

    let mut stream = open_follow(addr, "/a.log").await;

    let mut rest = Vec::new();
    let _ = timeout(WAIT, stream.read_to_end(&mut rest))
        .await
        .expect("connection stayed open after the follow process failed to start");
    assert!(rest.is_empty(), "unexpected bytes: {:?}", rest);
}
