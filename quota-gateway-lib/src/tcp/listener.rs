#![forbid(unsafe_code)]

use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::error::{GatewayError, Result};

const LISTEN_BACKLOG: i32 = 1024;

/// Bind the client-facing listener on the loopback interface.
///
/// Address reuse (and port reuse where the platform has it) is enabled so a
/// restart does not fail while old sockets sit in `TIME_WAIT`. Port `0` picks
/// an ephemeral port; read it back with `local_addr`.
pub fn bind_loopback(port: u16) -> Result<TcpListener> {
    bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
}

pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let bind_err = |source: std::io::Error| GatewayError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos", target_os = "cygwin"))))]
    socket.set_reuse_port(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    TcpListener::from_std(socket.into()).map_err(bind_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_loopback_port() -> Result<()> {
        let listener = bind_loopback(0)?;
        let addr = listener.local_addr()?;
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn rebinds_a_recently_released_port() -> Result<()> {
        let first = bind_loopback(0)?;
        let port = first.local_addr()?.port();
        drop(first);
        let second = bind_loopback(port)?;
        assert_eq!(second.local_addr()?.port(), port);
        Ok(())
    }
}
