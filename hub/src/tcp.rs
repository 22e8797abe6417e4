//! The TCP Command Server: one accept loop, one task per
//! connection, newline-delimited JSON frames in both directions.
//!
//! Framing: a
//! per-connection buffer accumulates bytes; every complete line (split on
//! `\n`) is a frame; the trailing partial frame is kept for the next read;
//! multiple frames in one read are processed in arrival order; empty
//! lines are ignored.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::commands::{CommandRegistry, DispatchContext};
use crate::wire::{WireRequest, WireResponse};

const READ_CHUNK: usize = 8192;

/// Runs the TCP accept loop until `shutdown` fires. Each accepted
/// connection is handled on its own task; a per-connection error closes
/// only that connection.
pub async fn serve(
    addr: &str,
    registry: Arc<CommandRegistry>,
    ctx: Arc<DispatchContext>,
    shutdown: Arc<tokio::sync::Notify>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "tcp command server listening");

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("tcp command server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "tcp accept failed");
                        continue;
                    }
                };
                let registry = registry.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, registry, ctx).await {
                        debug!(peer = %peer, error = %e, "tcp connection closed");
                    }
                });
            }
        }
    }
}

/// One connection's frame loop: responses are written in request-arrival
/// order; the connection stays open across
/// any individual command's error response and only closes on network
/// close or a fatal write error.
async fn handle_connection(
    mut socket: TcpStream,
    registry: Arc<CommandRegistry>,
    ctx: Arc<DispatchContext>,
) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_slice::<WireRequest>(line) {
                Ok(request) => registry.dispatch(&ctx, request).await,
                Err(e) => WireResponse::err(&crate::error::HubError::MalformedRequest(e.to_string())),
            };

            let mut out = match serde_json::to_vec(&response) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(error = %e, "failed to serialize response");
                    continue;
                }
            };
            out.push(b'\n');
            socket.write_all(&out).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_split_ignores_empty_lines_and_keeps_partial_tail() {
        let mut buffer = b"{\"command\":\"a\"}\n\n{\"command\":\"b\"}\npartial".to_vec();
        let mut frames = Vec::new();
        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = line[..line.len() - 1].to_vec();
            if !line.is_empty() {
                frames.push(line);
            }
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(buffer, b"partial".to_vec());
    }
}
