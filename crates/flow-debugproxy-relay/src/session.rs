//! One relayed debugging session
//!
//! `Connecting → Piping → Draining → Closed`. A failed dial goes straight to
//! `Closed`; the first pipe to stop moves the session to `Draining` and its
//! teardown guarantees the second pipe follows.

use crate::pipe::{PipeExit, Teardown, pipe};
use flow_debugproxy_core::{DebugProxyError, Direction, Result};
use flow_debugproxy_pathmapper::PathMapper;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Piping,
    Draining,
    Closed,
}

/// Outcome of a session that reached `Piping`
#[derive(Debug)]
pub struct SessionReport {
    /// Bytes forwarded from the debugger engine to the IDE
    pub sent_bytes: u64,
    /// Bytes forwarded from the IDE to the debugger engine
    pub received_bytes: u64,
    /// Why the first pipe stopped
    pub first_exit: DebugProxyError,
}

impl SessionReport {
    /// Whether the session ended on a clean end of stream
    pub fn is_clean(&self) -> bool {
        self.first_exit.is_end_of_stream()
    }
}

/// Relays one debugger engine connection to the IDE
pub struct Session {
    ide_addr: String,
    mapper: Arc<dyn PathMapper>,
    state: SessionState,
}

impl Session {
    pub fn new(ide_addr: impl Into<String>, mapper: Arc<dyn PathMapper>) -> Self {
        Self {
            ide_addr: ide_addr.into(),
            mapper,
            state: SessionState::Connecting,
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {:?} >>> {:?}", self.state, next);
        self.state = next;
    }

    /// Dial the IDE and relay `inbound` until either side stops
    ///
    /// Returns `Err` only when the IDE cannot be reached; `inbound` is closed
    /// in that case.
    pub async fn run(mut self, inbound: TcpStream) -> Result<SessionReport> {
        let upstream = match TcpStream::connect(&self.ide_addr).await {
            Ok(upstream) => upstream,
            Err(source) => {
                warn!(
                    "Unable to connect to your IDE at {}, please check that your editor listens for incoming connections",
                    self.ide_addr
                );
                warn!("Error message: {}", source);
                warn!("Configure your IDE and reload the web page to try again");
                self.transition(SessionState::Closed);
                return Err(DebugProxyError::Connect {
                    addr: self.ide_addr,
                    source,
                });
            }
        };

        info!(
            "Opened {} >>> {}",
            peer_label(inbound.peer_addr()),
            peer_label(upstream.peer_addr())
        );
        self.transition(SessionState::Piping);

        let (debugger_read, debugger_write) = inbound.into_split();
        let (ide_read, ide_write) = upstream.into_split();
        let teardown = Teardown::new();
        // one pending exit per direction
        let (exit_tx, mut exit_rx) = mpsc::channel(2);

        self.spawn_pipe(
            debugger_read,
            ide_write,
            Direction::DebuggerToIde,
            &teardown,
            exit_tx.clone(),
        );
        self.spawn_pipe(
            ide_read,
            debugger_write,
            Direction::IdeToDebugger,
            &teardown,
            exit_tx,
        );

        let Some(first) = exit_rx.recv().await else {
            self.transition(SessionState::Closed);
            return Err(DebugProxyError::PeerClosed);
        };
        if first.reason.is_end_of_stream() {
            debug!("{} reached end of stream", first.direction);
        } else {
            warn!("{}: {}", first.direction, first.reason);
        }
        self.transition(SessionState::Draining);

        let second = exit_rx.recv().await;
        self.transition(SessionState::Closed);

        let mut sent_bytes = 0;
        let mut received_bytes = 0;
        for exit in std::iter::once(&first).chain(second.as_ref()) {
            match exit.direction {
                Direction::DebuggerToIde => sent_bytes = exit.bytes,
                Direction::IdeToDebugger => received_bytes = exit.bytes,
            }
        }
        info!(
            "Closed ({} bytes sent, {} bytes received)",
            sent_bytes, received_bytes
        );

        Ok(SessionReport {
            sent_bytes,
            received_bytes,
            first_exit: first.reason,
        })
    }

    fn spawn_pipe<R, W>(
        &self,
        src: R,
        dst: W,
        direction: Direction,
        teardown: &Teardown,
        exit_tx: mpsc::Sender<PipeExit>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mapper = self.mapper.clone();
        let teardown = teardown.clone();
        tokio::spawn(async move {
            let exit = pipe(src, dst, direction, mapper, teardown).await;
            let _ = exit_tx.send(exit).await;
        });
    }
}

fn peer_label(addr: std::io::Result<std::net::SocketAddr>) -> String {
    addr.map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_debugproxy_core::PathMappingStore;
    use flow_debugproxy_pathmapper::FlowPathMapper;
    use std::io;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CACHE: &str =
        "/proj/Data/Temporary/Development/Cache/Code/Flow_Object_Classes/Acme_Demo_Foo_Bar.php";
    const ORIGINAL: &str = "/proj/Packages/Application/Acme.Demo/Classes/Foo/Bar.php";

    fn frame(body: &str) -> Vec<u8> {
        let mut out = format!("{}\0{}", body.len(), body).into_bytes();
        out.push(0);
        out
    }

    fn mapper(store: PathMappingStore) -> Arc<dyn PathMapper> {
        Arc::new(FlowPathMapper::new("Development", Arc::new(store)))
    }

    /// Log lines written while the guard from `install` is alive
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let logs = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || logs.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// (debugger engine end, relay end) of a loopback connection
    async fn debugger_connection() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_relays_both_directions_and_ends_cleanly() {
        let store = PathMappingStore::new();
        store.set(CACHE, ORIGINAL);
        let ide = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ide_addr = ide.local_addr().unwrap().to_string();
        let (mut debugger, inbound) = debugger_connection().await;

        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let handle = tokio::spawn(Session::new(ide_addr, mapper(store)).run(inbound));
        let (mut ide_conn, _) = ide.accept().await.unwrap();

        let init = frame(&format!(
            r#"<init fileuri="file://{}" language="PHP" protocol_version="1.0"/>"#,
            CACHE
        ));
        debugger.write_all(&init).await.unwrap();
        let expected = frame(&format!(
            r#"<init fileuri="file://{}" language="PHP" protocol_version="1.0"/>"#,
            ORIGINAL
        ));
        let mut received = vec![0u8; expected.len()];
        ide_conn.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);

        let command = b"feature_set -i 1 -n max_depth -v 3\0";
        ide_conn.write_all(command).await.unwrap();
        let mut forwarded = vec![0u8; command.len()];
        debugger.read_exact(&mut forwarded).await.unwrap();
        assert_eq!(&forwarded[..], &command[..]);

        // IDE hangs up: clean end, debugger side closed as well
        drop(ide_conn);
        let report = handle.await.unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.sent_bytes, expected.len() as u64);
        assert_eq!(report.received_bytes, command.len() as u64);

        let mut rest = Vec::new();
        debugger.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let logs = logs.contents();
        assert!(logs.contains("Closed ("), "{}", logs);
        assert!(!logs.contains("WARN"), "{}", logs);
    }

    #[tokio::test]
    async fn test_unreachable_ide_closes_inbound() {
        let ide = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ide_addr = ide.local_addr().unwrap().to_string();
        drop(ide);
        let (mut debugger, inbound) = debugger_connection().await;

        let err = Session::new(ide_addr.clone(), mapper(PathMappingStore::new()))
            .run(inbound)
            .await
            .unwrap_err();
        assert!(matches!(err, DebugProxyError::Connect { ref addr, .. } if *addr == ide_addr));

        let mut rest = Vec::new();
        let n = debugger.read_to_end(&mut rest).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_unreadable_artifact_ends_session() {
        let ide = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ide_addr = ide.local_addr().unwrap().to_string();
        let (mut debugger, inbound) = debugger_connection().await;

        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let handle = tokio::spawn(Session::new(ide_addr, mapper(PathMappingStore::new())).run(inbound));
        let (mut ide_conn, _) = ide.accept().await.unwrap();

        let missing = std::env::temp_dir().join(format!("flow-debugproxy-session-{}", std::process::id()));
        let response = frame(&format!(
            r#"<response filename="file://{}/Data/Temporary/Development/Cache/Code/Flow_Object_Classes/Acme_Demo_Foo_Bar.php"/>"#,
            missing.display()
        ));
        debugger.write_all(&response).await.unwrap();

        let report = handle.await.unwrap().unwrap();
        assert!(!report.is_clean());
        assert!(matches!(report.first_exit, DebugProxyError::CacheArtifact { .. }));
        assert_eq!(report.sent_bytes, 0);

        let mut rest = Vec::new();
        ide_conn.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let logs = logs.contents();
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("Debugger >>> IDE"), "{}", logs);
    }

    #[tokio::test]
    async fn test_reset_by_debugger_logs_warning() {
        let ide = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ide_addr = ide.local_addr().unwrap().to_string();
        let (debugger, inbound) = debugger_connection().await;

        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let handle = tokio::spawn(Session::new(ide_addr, mapper(PathMappingStore::new())).run(inbound));
        let (_ide_conn, _) = ide.accept().await.unwrap();

        // linger 0 turns the close into a reset
        debugger.set_linger(Some(std::time::Duration::ZERO)).unwrap();
        drop(debugger);

        let report = handle.await.unwrap().unwrap();
        assert!(!report.is_clean());
        let logs = logs.contents();
        assert!(logs.contains("WARN"), "{}", logs);
    }
}
