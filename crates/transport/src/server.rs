//! Inbound RPCs.
//!
//! One acceptor loop per node; every accepted connection is served on its
//! own task, so a handler blocked on an outbound call never stops the node
//! from answering others.

use crate::codec::{read_frame, write_frame};
use crate::error::TransportError;
use crate::protocol::{Envelope, Reply, Request};
use async_trait::async_trait;
use corelib::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Node-side implementation of the ring operations.
#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Reply;
}

/// A bound listener waiting to be served.
pub struct RpcServer {
    listener: TcpListener,
    bits: u8,
}

impl RpcServer {
    /// Bind the listener; requests stamped with a different width than
    /// `bits` are refused.
    pub async fn bind(addr: impl ToSocketAddrs, bits: u8) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, bits })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` flips to `true` or its sender is
    /// dropped.
    pub async fn serve<H: RpcHandler>(self, handler: Arc<H>, mut shutdown: watch::Receiver<bool>) {
        let local = self
            .listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".into());
        info!(addr = %local, "rpc server listening");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        let bits = self.bits;
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, handler, bits).await {
                                debug!(%peer, error = %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => error!(addr = %local, error = %err, "accept failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(addr = %local, "rpc server stopped");
    }
}

async fn handle_connection<H: RpcHandler>(
    mut stream: TcpStream,
    handler: Arc<H>,
    bits: u8,
) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    let envelope: Envelope = match read_frame(&mut stream).await {
        Ok(envelope) => envelope,
        Err(TransportError::Io(err)) => return Err(TransportError::Io(err)),
        Err(err) => {
            warn!(error = %err, "rejecting malformed request");
            let reply: Reply = Err(Error::ProtocolViolation(err.to_string()));
            write_frame(&mut stream, &reply).await?;
            return Err(err);
        }
    };
    let reply = if envelope.bits != bits {
        warn!(local = bits, remote = envelope.bits, "identifier width mismatch");
        Err(Error::Misconfigured(format!(
            "ring uses {}-bit identifiers, caller uses {}",
            bits, envelope.bits
        )))
    } else {
        handler.handle(envelope.request).await
    };
    write_frame(&mut stream, &reply).await
}
