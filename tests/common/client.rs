//! Test chat client.
//!
//! A line-oriented client for integration testing that can send commands
//! and assert on received reply lines.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A test chat client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    name: String,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(address: &str, name: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;

        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);
        let writer = BufWriter::new(write_half);

        Ok(Self { reader, writer, name: name.to_string() })
    }

    /// Send one line to the server.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive a single line from the server.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a line with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end().to_string())
    }

    /// Receive lines until the given predicate returns true.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                break;
            }
        }
        Ok(lines)
    }

    /// Receive lines until one equals `expected`.
    #[allow(dead_code)]
    pub async fn expect_line(&mut self, expected: &str) -> anyhow::Result<Vec<String>> {
        self.recv_until(|l| l == expected).await
    }

    /// Discard everything already queued for this client.
    #[allow(dead_code)]
    pub async fn drain(&mut self) {
        while self.recv_timeout(Duration::from_millis(50)).await.is_ok() {}
    }

    /// Register with the server and wait for the confirmation line.
    #[allow(dead_code)]
    pub async fn register(&mut self) -> anyhow::Result<()> {
        let name = self.name.clone();
        self.send(&format!("/register {}", name)).await?;
        let confirmation = format!("You are now registered as '{}'.", name);
        self.recv_until(|l| l == confirmation).await?;
        Ok(())
    }

    /// Join a group.
    #[allow(dead_code)]
    pub async fn join(&mut self, group: &str) -> anyhow::Result<()> {
        self.send(&format!("/join {}", group)).await?;
        let confirmation = format!("You joined group '{}'.", group);
        self.recv_until(|l| l == confirmation).await?;
        Ok(())
    }

    /// Send the exit command.
    #[allow(dead_code)]
    pub async fn exit(&mut self) -> anyhow::Result<()> {
        self.send("/exit").await?;
        Ok(())
    }
}
