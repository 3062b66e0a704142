//! TCP setup for both roles.
//!
//! The server accepts exactly one connection and stops listening; the client
//! connects once. Either way the stream gets `TCP_NODELAY` so small PDUs are
//! not held back by Nagle's algorithm.

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::Result;

/// Apply low-latency socket options to a connected stream
pub fn tune_stream(stream: TcpStream, buffer_size: Option<usize>) -> Result<TcpStream> {
    let std_stream = stream.into_std()?;
    let socket = socket2::Socket::from(std_stream.try_clone()?);
    socket.set_nodelay(true)?;
    if let Some(size) = buffer_size {
        socket.set_recv_buffer_size(size)?;
        socket.set_send_buffer_size(size)?;
    }
    Ok(TcpStream::from_std(std_stream)?)
}

/// Bind to `addr`, accept one connection, then close the listener
pub async fn accept_one(addr: &str, buffer_size: Option<usize>) -> Result<(TcpStream, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    accept_from(listener, buffer_size).await
}

/// Accept one connection from an already bound listener and drop it
pub async fn accept_from(
    listener: TcpListener,
    buffer_size: Option<usize>,
) -> Result<(TcpStream, SocketAddr)> {
    let (stream, peer) = listener.accept().await?;
    drop(listener);
    info!("Connection from {}", peer);
    Ok((tune_stream(stream, buffer_size)?, peer))
}

/// Connect to `addr`
pub async fn connect(addr: &str, buffer_size: Option<usize>) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    debug!("Connected to {}", addr);
    tune_stream(stream, buffer_size)
}
