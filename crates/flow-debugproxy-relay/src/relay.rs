//! Accept loop: one session per debugger engine connection

use crate::session::Session;
use flow_debugproxy_core::{Config, PathMappingStore, Result};
use flow_debugproxy_pathmapper::PathMapper;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Pause before accepting again after an accept error
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// DBGp relay between debugger engines and the IDE
pub struct Relay {
    config: Config,
    store: Arc<PathMappingStore>,
    mapper: Arc<dyn PathMapper>,
}

impl Relay {
    /// Validate `config` and build the mapper for its framework
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(PathMappingStore::new());
        let mapper = flow_debugproxy_pathmapper::build(&config, store.clone());
        Ok(Self {
            config,
            store,
            mapper,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mappings discovered so far, shared by every session
    pub fn store(&self) -> &Arc<PathMappingStore> {
        &self.store
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(self.config.listen_addr()?).await?)
    }

    /// Accept debugger connections forever
    ///
    /// A session that fails never stops the loop.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Debugger from {}", listener.local_addr()?);
        info!("IDE from {}", self.config.ide);
        info!(
            "Mapping {} paths for context {}",
            self.config.framework, self.config.context
        );

        loop {
            let (inbound, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept debugger connection: {}", e);
                    sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            debug!("Debugger connected from {}", peer);

            let session = Session::new(self.config.ide.clone(), self.mapper.clone());
            let store = self.store.clone();
            tokio::spawn(async move {
                match session.run(inbound).await {
                    Ok(_) => debug!("Session from {} finished ({} mappings known)", peer, store.len()),
                    Err(e) => debug!("Session from {} not started: {}", peer, e),
                }
            });
        }
    }
}
