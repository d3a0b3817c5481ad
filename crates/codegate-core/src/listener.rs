//! TCP listener binding with diagnostics that tell an operator what to change.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;

/// Why a listener could not be bound. `listener` names the surface ("http",
/// "smtp") so that one failing listener can be reported while the others run.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(
        "{listener} listener cannot bind {addr}: permission denied \
         (ports below 1024 need elevated privileges; pick a higher port or grant CAP_NET_BIND_SERVICE)"
    )]
    PermissionDenied {
        listener: &'static str,
        addr: SocketAddr,
    },
    #[error(
        "{listener} listener cannot bind {addr}: address already in use \
         (another process holds this port; stop it or configure a different port)"
    )]
    AddrInUse {
        listener: &'static str,
        addr: SocketAddr,
    },
    #[error("{listener} listener cannot bind {addr}: {source}")]
    Other {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    pub fn from_io(listener: &'static str, addr: SocketAddr, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { listener, addr },
            io::ErrorKind::AddrInUse => Self::AddrInUse { listener, addr },
            _ => Self::Other {
                listener,
                addr,
                source: err,
            },
        }
    }

    pub fn listener(&self) -> &'static str {
        match self {
            Self::PermissionDenied { listener, .. }
            | Self::AddrInUse { listener, .. }
            | Self::Other { listener, .. } => listener,
        }
    }
}

/// Bind `addr` for the named listener.
pub async fn bind(listener: &'static str, addr: SocketAddr) -> Result<TcpListener, BindError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| BindError::from_io(listener, addr, e))
}
