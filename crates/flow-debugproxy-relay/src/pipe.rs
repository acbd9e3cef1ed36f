//! Directional copy between the two legs of a session

use flow_debugproxy_core::{DebugProxyError, Direction, Result};
use flow_debugproxy_pathmapper::{PathMapper, complete_frames_len};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{Level, debug, trace};

/// Read buffer size of each pipe
pub const BUFFER_SIZE: usize = 0xffff;

/// Incomplete message bytes held back before they are forwarded regardless
pub const MAX_PENDING: usize = 64 * 1024 * 1024;

/// How a pipe ended and what it forwarded until then
#[derive(Debug)]
pub struct PipeExit {
    pub direction: Direction,
    /// Bytes written to the destination
    pub bytes: u64,
    pub reason: DebugProxyError,
}

/// Teardown signal shared by both pipes of a session
///
/// The first pipe to stop triggers it; the other pipe abandons its pending
/// read or write and stops too.
#[derive(Debug, Clone)]
pub struct Teardown {
    tx: Arc<watch::Sender<bool>>,
}

impl Teardown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    #[cfg(test)]
    fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the teardown has been triggered
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins reads back into whole protocol messages
///
/// Debugger responses are released frame by frame, IDE commands up to their
/// NUL terminator, so a path or a length prefix is never rewritten in two
/// halves.
#[derive(Debug)]
struct MessageAssembler {
    direction: Direction,
    pending: Vec<u8>,
}

impl MessageAssembler {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            pending: Vec::new(),
        }
    }

    /// Append `chunk` and take every message it completes
    fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(chunk);
        let complete = if self.pending.len() > MAX_PENDING {
            self.pending.len()
        } else {
            match self.direction {
                Direction::DebuggerToIde => complete_frames_len(&self.pending),
                Direction::IdeToDebugger => self
                    .pending
                    .iter()
                    .rposition(|b| *b == 0)
                    .map_or(0, |end| end + 1),
            }
        };
        let rest = self.pending.split_off(complete);
        std::mem::replace(&mut self.pending, rest)
    }

    /// Whatever is left once the source has ended
    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Copy `src` to `dst`, rewriting every complete message for `direction`
///
/// Runs until a read, rewrite or write fails (end of stream included) or the
/// teardown fires. Bytes of an unfinished message still pending at end of
/// stream are flushed as they are. On exit the teardown is triggered and
/// `dst` is shut down so the peer pipe stops as well.
pub async fn pipe<R, W>(
    mut src: R,
    mut dst: W,
    direction: Direction,
    mapper: Arc<dyn PathMapper>,
    teardown: Teardown,
) -> PipeExit
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut assembler = MessageAssembler::new(direction);
    let mut bytes = 0u64;

    let reason = loop {
        let read = tokio::select! {
            read = src.read(&mut buf) => read.map_err(DebugProxyError::from),
            _ = teardown.triggered() => Err(DebugProxyError::PeerClosed),
        };
        let n = match read {
            Ok(0) => break DebugProxyError::EndOfStream,
            Ok(n) => n,
            Err(e) => break e,
        };

        let message = assembler.push(&buf[..n]);
        if message.is_empty() {
            trace!("{}: holding {} bytes", direction, assembler.pending_len());
            continue;
        }
        match forward(&mut dst, direction, mapper.as_ref(), &teardown, &message).await {
            Ok(written) => bytes += written,
            Err(e) => break e,
        }
    };

    let reason = match reason {
        DebugProxyError::EndOfStream => {
            let rest = assembler.finish();
            if rest.is_empty() {
                DebugProxyError::EndOfStream
            } else {
                debug!("{}: flushing {} bytes of an unfinished message", direction, rest.len());
                match forward(&mut dst, direction, mapper.as_ref(), &teardown, &rest).await {
                    Ok(written) => {
                        bytes += written;
                        DebugProxyError::EndOfStream
                    }
                    Err(e) => e,
                }
            }
        }
        other => other,
    };

    teardown.trigger();
    let _ = dst.shutdown().await;

    PipeExit {
        direction,
        bytes,
        reason,
    }
}

/// Rewrite `message` and write it to `dst`; returns the bytes written
async fn forward<W>(
    dst: &mut W,
    direction: Direction,
    mapper: &dyn PathMapper,
    teardown: &Teardown,
    message: &[u8],
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    debug!("{}", direction);
    if tracing::enabled!(Level::TRACE) {
        trace!("Raw protocol:\n{}\n", render(direction, message));
    }

    let processed = mapper.rewrite(direction, message)?;
    if tracing::enabled!(Level::TRACE) {
        trace!("Processed protocol:\n{}\n", render(direction, &processed));
    }

    tokio::select! {
        written = dst.write_all(&processed) => written?,
        _ = teardown.triggered() => return Err(DebugProxyError::PeerClosed),
    }
    Ok(processed.len() as u64)
}

/// Printable form of a chunk; NUL separated commands are put on their own line
fn render(direction: Direction, chunk: &[u8]) -> String {
    let text = String::from_utf8_lossy(chunk);
    match direction {
        Direction::IdeToDebugger => text.replace('\0', "\n"),
        Direction::DebuggerToIde => text.into_owned(),
    }
}
