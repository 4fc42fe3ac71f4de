//! Child process output capture
//!
//! stdout and stderr are both piped and pumped into one append-only buffer.
//! Each stream keeps its own write order; chunks from the two streams
//! interleave in whatever order the pipes deliver them.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 4096;

/// Combined stdout+stderr of one child process
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, chunk: &[u8]) {
        let mut bytes = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bytes.extend_from_slice(chunk);
    }

    /// Lossy UTF-8 copy of everything captured so far
    pub fn snapshot(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pipe stdout/stderr for capture; the child never reads stdin
pub fn configure_child_stdio(cmd: &mut Command) {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).stdin(Stdio::null());
}

/// Spawn one pump task per piped stream, appending into `buffer`
///
/// Consuming the pipes also keeps the child from blocking on a full pipe.
pub fn spawn_output_consumers(child: &mut Child, buffer: &OutputBuffer) -> Vec<JoinHandle<()>> {
    let mut consumers = Vec::with_capacity(2);

    if let Some(stdout) = child.stdout.take() {
        consumers.push(tokio::spawn(pump(stdout, buffer.clone())));
    }

    if let Some(stderr) = child.stderr.take() {
        consumers.push(tokio::spawn(pump(stderr, buffer.clone())));
    }

    consumers
}

async fn pump<R>(mut reader: R, buffer: OutputBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.append(&chunk[..n]),
        }
    }
}

/// Wait for the pumps to hit EOF, giving up after `limit`
///
/// A grandchild that inherited the pipes can keep them open after the direct
/// child exits; in that case the remaining pumps are aborted.
pub async fn drain_consumers(consumers: Vec<JoinHandle<()>>, limit: Duration) {
    for mut consumer in consumers {
        if tokio::time::timeout(limit, &mut consumer).await.is_err() {
            consumer.abort();
        }
    }
}
