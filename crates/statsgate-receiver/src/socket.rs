//! Datagram socket seam and UDP socket construction
//!
//! The receive loop reads through the [`PacketSocket`] trait so that it can
//! be driven by a real [`UdpSocket`] or by a scripted fake in tests.
//!
//! [`ClosableUdpSocket`] gives a tokio socket "close" semantics: once its
//! token fires, every read fails with a non-transient error, which is how
//! the receive loop learns that the socket is gone.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::warn;

// ============================================================================
// PacketSocket trait
// ============================================================================

/// A connectionless socket the receive loop can read datagrams from
#[async_trait::async_trait]
pub trait PacketSocket: Send + Sync {
    /// Reads one datagram into `buf`, returning its length and sender
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait::async_trait]
impl PacketSocket for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }
}

// ============================================================================
// ClosableUdpSocket
// ============================================================================

/// UDP socket whose reads fail permanently once it has been closed
pub struct ClosableUdpSocket {
    socket: UdpSocket,
    closed: CancellationToken,
}

impl ClosableUdpSocket {
    /// Wraps `socket`; it is closed when `closed` is cancelled
    pub fn new(socket: UdpSocket, closed: CancellationToken) -> Self {
        Self { socket, closed }
    }

    /// Closes the socket. Pending and future reads fail.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns true once the socket has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait::async_trait]
impl PacketSocket for ClosableUdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        tokio::select! {
            biased;

            _ = self.closed.cancelled() => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket closed",
            )),
            result = self.socket.recv_from(buf) => result,
        }
    }
}

// ============================================================================
// Socket construction
// ============================================================================

/// Binds a non-blocking UDP socket for use with tokio
///
/// Sets SO_REUSEADDR, and SO_REUSEPORT when `reuse_port` is true so that
/// several sockets can share one address with kernel load balancing.
/// A receive buffer size the kernel refuses is logged, not fatal.
pub fn bind_udp(addr: SocketAddr, reuse_port: bool, recv_buffer_size: usize) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    if reuse_port {
        socket.set_reuse_port(true)?;
    }
    #[cfg(not(unix))]
    let _ = reuse_port;

    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        warn!(
            error = %e,
            requested_size = recv_buffer_size,
            "Failed to set UDP SO_RCVBUF"
        );
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_udp_ephemeral_port() {
        let socket = bind_udp(loopback(), false, 64 * 1024).unwrap();
        let addr = socket.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_udp_reuse_port_shares_address() {
        let first = bind_udp(loopback(), true, 64 * 1024).unwrap();
        let addr = first.local_addr().unwrap();
        let second = bind_udp(addr, true, 64 * 1024);
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_closable_socket_reads_datagrams() {
        let socket = ClosableUdpSocket::new(
            bind_udp(loopback(), false, 64 * 1024).unwrap(),
            CancellationToken::new(),
        );
        let target = socket.local_addr().unwrap();

        let sender = UdpSocket::bind(loopback()).await.unwrap();
        sender.send_to(b"hello", target).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("read timed out")
            .unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from, sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_closed_socket_fails_pending_read() {
        let socket = std::sync::Arc::new(ClosableUdpSocket::new(
            bind_udp(loopback(), false, 64 * 1024).unwrap(),
            CancellationToken::new(),
        ));

        let reader = {
            let socket = std::sync::Arc::clone(&socket);
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                socket.recv_from(&mut buf).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        socket.close();

        let err = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .expect("read did not observe close")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(socket.is_closed());
    }
}
