//! Socket construction with kernel-level options.
//!
//! # Design Decisions
//! - `SO_REUSEPORT` lets several sockets share one address; the kernel
//!   spreads datagrams across them
//! - Sockets are built blocking-free with socket2, then handed to tokio

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, UdpSocket};

const TCP_BACKLOG: i32 = 1024;

fn domain_for(addr: &SocketAddr) -> Domain {
    if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    }
}

fn set_reuse_port(socket: &Socket) -> io::Result<()> {
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;
    Ok(())
}

/// Create a UDP socket bound to `addr`.
///
/// `recv_buffer_bytes` of zero keeps the kernel default.
pub fn new_udp_socket(addr: SocketAddr, recv_buffer_bytes: usize, reuse_port: bool) -> io::Result<UdpSocket> {
    let socket = Socket::new(domain_for(&addr), Type::DGRAM, Some(Protocol::UDP))?;
    if reuse_port {
        socket.set_reuse_address(true)?;
        set_reuse_port(&socket)?;
    }
    if recv_buffer_bytes > 0 {
        socket.set_recv_buffer_size(recv_buffer_bytes)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Create a listening TCP socket bound to `addr`.
///
/// `SO_REUSEADDR` is always set, so a restart can bind while connections
/// from the previous instance sit in TIME_WAIT.
pub fn new_tcp_listener(addr: SocketAddr, reuse_port: bool) -> io::Result<TcpListener> {
    let socket = Socket::new(domain_for(&addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if reuse_port {
        set_reuse_port(&socket)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(TCP_BACKLOG)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reuse_port_allows_shared_address() {
        let first = new_udp_socket("127.0.0.1:0".parse().unwrap(), 0, true).unwrap();
        let addr = first.local_addr().unwrap();
        let second = new_udp_socket(addr, 0, true).unwrap();
        assert_eq!(second.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn exclusive_socket_conflicts() {
        let first = new_udp_socket("127.0.0.1:0".parse().unwrap(), 0, false).unwrap();
        let addr = first.local_addr().unwrap();
        assert!(new_udp_socket(addr, 0, false).is_err());
    }

    #[tokio::test]
    async fn tcp_listener_sets_reuse_address() {
        let listener = new_tcp_listener("127.0.0.1:0".parse().unwrap(), false).unwrap();
        let socket = socket2::SockRef::from(&listener);
        assert!(socket.reuse_address().unwrap());
    }

    #[tokio::test]
    async fn receive_buffer_is_applied() {
        let socket = new_udp_socket("127.0.0.1:0".parse().unwrap(), 256 * 1024, false).unwrap();
        let size = socket2::SockRef::from(&socket).recv_buffer_size().unwrap();
        // Linux doubles the requested value; other kernels may clamp it.
        assert!(size > 0);
    }

    #[tokio::test]
    async fn tcp_listener_accepts() {
        let listener = new_tcp_listener("127.0.0.1:0".parse().unwrap(), false).unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = tokio::net::TcpStream::connect(addr);
        let (accepted, connected) = tokio::join!(listener.accept(), connect);
        assert!(accepted.is_ok());
        assert!(connected.is_ok());
    }
}
