use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::ws::frame::encode_binary_frame;

/// Bytes read from the follow process per frame at most
const CHUNK_SIZE: usize = 64 * 1024;

/// How long output left in the pipe of an exited process is still collected
const EXIT_DRAIN: Duration = Duration::from_secs(1);

/// How a [`TailSession`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The follow process went away; the connection was shut down.
    ProcessExited,
    /// The peer went away; the follow process was killed.
    ConnectionClosed,
}

/// Spawn the configured follow command for `path`, e.g. `tail -f <path>`.
pub fn spawn_follow(config: &Config, path: &Path) -> std::io::Result<Child> {
    Command::new(&config.follow_program)
        .args(&config.follow_args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

/// One upgraded connection paired with the process following one file.
///
/// Whichever side ends first takes the other down with it.
pub struct TailSession<S> {
    conn: S,
    child: Child,
    label: String,
    queue_depth: usize,
}

impl<S> TailSession<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(conn: S, child: Child, label: impl Into<String>, queue_depth: usize) -> Self {
        Self {
            conn,
            child,
            label: label.into(),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Relay process output as binary frames until either side ends.
    pub async fn run(self) -> SessionEnd {
        let TailSession {
            conn,
            mut child,
            label,
            queue_depth,
        } = self;

        let Some(mut stdout) = child.stdout.take() else {
            terminate(&mut child, &label).await;
            return SessionEnd::ProcessExited;
        };

        let (mut inbound, outbound) = tokio::io::split(conn);
        let (frames, queue) = mpsc::channel::<Bytes>(queue_depth);
        let writer = write_frames(outbound, queue);
        tokio::pin!(writer);

        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut discard = [0u8; 1024];

        let end = loop {
            tokio::select! {
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) => break SessionEnd::ProcessExited,
                    Ok(n) => enqueue(&frames, &chunk[..n], &label),
                    Err(err) => {
                        debug!("tail: reading output for {} failed: {}", label, err);
                        break SessionEnd::ProcessExited;
                    }
                },
                status = child.wait() => {
                    debug!("tail: process for {} exited: {:?}", label, status);
                    // Pick up output still sitting in the pipe; a forked
                    // descendant may hold it open, so the wait is bounded
                    let drain = async {
                        loop {
                            match stdout.read(&mut chunk).await {
                                Ok(0) | Err(_) => break,
                                Ok(n) => enqueue(&frames, &chunk[..n], &label),
                            }
                        }
                    };
                    if tokio::time::timeout(EXIT_DRAIN, drain).await.is_err() {
                        debug!("tail: output of {} still open after exit", label);
                    }
                    break SessionEnd::ProcessExited;
                }
                // Client frames are never parsed, only EOF matters
                read = inbound.read(&mut discard) => match read {
                    Ok(0) | Err(_) => break SessionEnd::ConnectionClosed,
                    Ok(_) => {}
                },
                () = &mut writer => break SessionEnd::ConnectionClosed,
            }
        };

        match end {
            SessionEnd::ProcessExited => {
                info!("close websocket for lost follow process of {}", label);
                drop(frames);
                writer.await;
                terminate(&mut child, &label).await;
            }
            SessionEnd::ConnectionClosed => {
                info!("kill follow process of {} for closed websocket", label);
                terminate(&mut child, &label).await;
            }
        }

        end
    }
}

fn enqueue(frames: &mpsc::Sender<Bytes>, output: &[u8], label: &str) {
    // A slow reader loses frames rather than stalling the follow process
    if frames.try_send(Bytes::from(encode_binary_frame(output))).is_err() {
        debug!("tail: dropped {} bytes of {}", output.len(), label);
    }
}

async fn write_frames<W>(mut conn: W, mut queue: mpsc::Receiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = queue.recv().await {
        if let Err(err) = conn.write_all(&frame).await {
            debug!("tail: dropped frame of {} bytes: {}", frame.len(), err);
        }
    }
    let _ = conn.shutdown().await;
}

/// Kill and reap the process. A process that already exited is left alone.
async fn terminate(child: &mut Child, label: &str) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(err) = child.kill().await {
        debug!("tail: killing follow process of {} failed: {}", label, err);
    }
}
