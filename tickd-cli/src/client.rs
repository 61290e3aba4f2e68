//! Control socket client
//!
//! Dials the daemon's Unix socket, sends one command, and reads the
//! single reply. The write side is shut down after sending so the
//! daemon sees the full command in one read.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// Upper bound on a reply; `list` output scales with the job count
const MAX_REPLY_LEN: u64 = 64 * 1024;

/// Sends `command` over the control socket and returns the raw reply
pub async fn send(socket: &Path, command: &str) -> Result<String> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("cannot connect to {}", socket.display()))?;

    stream
        .write_all(command.as_bytes())
        .await
        .context("cannot send command")?;
    stream.shutdown().await.context("cannot send command")?;

    let mut reply = String::new();
    stream
        .take(MAX_REPLY_LEN)
        .read_to_string(&mut reply)
        .await
        .context("cannot read reply")?;

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn test_send_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let len = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"list");
            stream.write_all(b"a: active").await.unwrap();
        });

        let reply = send(&path, "list").await.unwrap();
        assert_eq!(reply, "a: active");
    }

    #[tokio::test]
    async fn test_send_fails_without_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        assert!(send(&path, "list").await.is_err());
    }
}
