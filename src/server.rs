use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task;

use crate::config::GatewayConfig;
use crate::core::observability;
use crate::envelope::PeerAddrs;
use crate::kadm_protocol::{LEGACY_TAG, SNIFFED_TAG_LEN};
use crate::session::{run_session, GatewayContext};
use crate::transport::{FrameError, FrameSource};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("gateway is not bound")]
    NotBound,
    #[error("listener I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// TCP acceptor for v4 kadmin connections.
pub struct GatewayServer {
    config: GatewayConfig,
    context: Arc<GatewayContext>,
    listener: Option<TcpListener>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, context: GatewayContext) -> Self {
        Self {
            config,
            context: Arc::new(context),
            listener: None,
        }
    }

    pub async fn bind(&mut self) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local = listener.local_addr()?;
        info!("v4 kadmin gateway listening on {} for realm {}", local, self.config.realm);
        self.listener = Some(listener);
        Ok(local)
    }

    /// Accepts until the listener fails, one task per connection.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let listener = self.listener.as_ref().ok_or(ServerError::NotBound)?;
        loop {
            let (stream, client) = listener.accept().await?;
            debug!("accepted connection from {}", client);

            let context = Arc::clone(&self.context);
            task::spawn(async move {
                if let Err(err) = handle_connection(context, stream, client).await {
                    debug!("connection from {} ended: {}", client, err);
                }
            });
        }
    }
}

/// Checks the first frame's leading tag, then hands the connection to the
/// session loop with that prefix already consumed.
async fn handle_connection(
    context: Arc<GatewayContext>,
    mut stream: TcpStream,
    client: SocketAddr,
) -> Result<(), ServerError> {
    let gateway = stream.local_addr()?;

    let mut prefix = [0u8; 2 + SNIFFED_TAG_LEN];
    stream.read_exact(&mut prefix).await?;
    let declared_len = u16::from_be_bytes([prefix[0], prefix[1]]);
    let tag = [prefix[2], prefix[3]];
    if tag != LEGACY_TAG {
        observability::record_connection_rejected();
        warn!("{}: not a v4 kadmin request, closing", client);
        return Ok(());
    }

    let source = FrameSource::Resumed {
        declared_len,
        consumed: tag,
    };
    run_session(&context, stream, source, PeerAddrs { client, gateway }).await?;
    Ok(())
}
