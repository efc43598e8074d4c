//! UDP capture socket: binds the PFCP port and yields datagrams.

use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::pipeline::{Datagram, DatagramSource};

/// Errors from the capture engine.
#[derive(Debug)]
pub enum CaptureError {
    /// The configured bind address is not an IP address.
    InvalidAddress(String),
    /// Socket creation or option setup failed.
    Socket(io::Error),
    /// Binding the listening address failed.
    Bind { addr: SocketAddr, source: io::Error },
    /// A receive failed for a reason other than the read timeout.
    Recv(io::Error),
    /// The source has no more datagrams and never will.
    Closed,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::InvalidAddress(addr) => write!(f, "invalid bind address '{}'", addr),
            CaptureError::Socket(e) => write!(f, "socket error: {}", e),
            CaptureError::Bind { addr, source } => {
                write!(f, "cannot listen on udp {}: {}", addr, source)
            }
            CaptureError::Recv(e) => write!(f, "receive error: {}", e),
            CaptureError::Closed => write!(f, "datagram source closed"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Socket(e) | CaptureError::Recv(e) => Some(e),
            CaptureError::Bind { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A bound PFCP listening socket.
#[derive(Debug)]
pub struct UdpCapture {
    socket: UdpSocket,
    local_addr: SocketAddr,
    destination: Option<SocketAddr>,
}

impl UdpCapture {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Open the capture socket described by `config`.
///
/// A bind failure is returned as-is and never retried.
pub fn open_socket(config: &CaptureConfig) -> Result<UdpCapture, CaptureError> {
    let ip: IpAddr = config
        .bind
        .trim()
        .parse()
        .map_err(|_| CaptureError::InvalidAddress(config.bind.clone()))?;
    let addr = SocketAddr::new(ip, config.port);

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(CaptureError::Socket)?;
    if let Some(bytes) = config.recv_buffer_bytes {
        socket
            .set_recv_buffer_size(bytes)
            .map_err(CaptureError::Socket)?;
    }
    socket
        .bind(&addr.into())
        .map_err(|source| CaptureError::Bind { addr, source })?;
    socket
        .set_read_timeout(Some(Duration::from_millis(config.timeout_ms.max(1))))
        .map_err(CaptureError::Socket)?;

    let socket: UdpSocket = socket.into();
    let local_addr = socket.local_addr().map_err(CaptureError::Socket)?;

    // With a wildcard bind the datagram's destination address is unknown.
    let destination = if ip.is_unspecified() {
        None
    } else {
        Some(local_addr)
    };

    tracing::info!(
        bind = %local_addr,
        timeout_ms = config.timeout_ms,
        recv_buffer = config.recv_buffer_bytes.unwrap_or(0),
        "capture started"
    );

    Ok(UdpCapture {
        socket,
        local_addr,
        destination,
    })
}

impl DatagramSource for UdpCapture {
    fn recv<'b>(&mut self, buf: &'b mut [u8]) -> Result<Option<Datagram<'b>>, CaptureError> {
        match self.socket.recv_from(buf) {
            Ok((len, source)) => Ok(Some(Datagram {
                payload: &buf[..len],
                source,
                destination: self.destination,
            })),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(CaptureError::Recv(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> CaptureConfig {
        CaptureConfig {
            bind: "127.0.0.1".into(),
            port: 0,
            timeout_ms: 50,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn reject_invalid_bind_address() {
        let config = CaptureConfig {
            bind: "not-an-address".into(),
            ..loopback_config()
        };
        assert!(matches!(
            open_socket(&config),
            Err(CaptureError::InvalidAddress(_))
        ));
    }

    #[test]
    fn timeout_is_no_data() {
        let mut capture = open_socket(&loopback_config()).unwrap();
        let mut buf = [0u8; 64];
        assert!(capture.recv(&mut buf).unwrap().is_none());
    }

    #[test]
    fn receive_from_loopback() {
        let mut capture = open_socket(&loopback_config()).unwrap();
        let local = capture.local_addr();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[0x20, 0x01, 0, 4, 0, 0, 0, 1], local).unwrap();

        let mut buf = [0u8; 4096];
        let mut received = None;
        for _ in 0..40 {
            if let Some(dg) = capture.recv(&mut buf).unwrap() {
                received = Some((dg.payload.to_vec(), dg.source, dg.destination));
                break;
            }
        }
        let (payload, source, destination) = received.expect("no datagram received");
        assert_eq!(payload, vec![0x20, 0x01, 0, 4, 0, 0, 0, 1]);
        assert_eq!(source, sender.local_addr().unwrap());
        assert_eq!(destination, Some(local));
    }

    #[test]
    fn wildcard_bind_has_no_destination() {
        let config = CaptureConfig {
            bind: "0.0.0.0".into(),
            ..loopback_config()
        };
        let capture = open_socket(&config).unwrap();
        assert!(capture.destination.is_none());
    }
}
