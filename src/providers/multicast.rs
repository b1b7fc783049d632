//! UDP multicast provider

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use crate::config::ReceiverConfig;
use crate::provider::DatagramProvider;
use crate::{ProtocolError, Result};

/// Bind `port` on all addresses and join `group` on `interface`.
///
/// Address reuse lets several receivers on one host listen to the same stream.
pub(crate) fn multicast_receive_socket(
    group: Ipv4Addr,
    port: u16,
    interface: Ipv4Addr,
) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| ProtocolError::io("creating multicast socket", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| ProtocolError::io("setting SO_REUSEADDR", e))?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket
        .set_reuse_port(true)
        .map_err(|e| ProtocolError::io("setting SO_REUSEPORT", e))?;

    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into()).map_err(|e| ProtocolError::io(format!("binding {}", addr), e))?;
    socket
        .join_multicast_v4(&group, &interface)
        .map_err(|e| ProtocolError::io(format!("joining multicast group {}", group), e))?;
    socket.set_nonblocking(true).map_err(|e| ProtocolError::io("setting non-blocking", e))?;

    UdpSocket::from_std(socket.into())
        .map_err(|e| ProtocolError::io("registering socket with the runtime", e))
}

/// Receives datagrams from one source's multicast group
#[derive(Debug)]
pub struct MulticastProvider {
    socket: UdpSocket,
    buffer: Vec<u8>,
    group: Ipv4Addr,
    port: u16,
    sample_rate: f64,
}

impl MulticastProvider {
    /// Join the group for `config.source_number` and start listening.
    pub fn bind(config: &ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let group = config.multicast_group();
        let socket = multicast_receive_socket(group, config.port, config.interface)?;

        info!("Listening for samples on {}:{}", group, config.port);

        Ok(Self {
            socket,
            buffer: vec![0u8; config.buffer_size],
            group,
            port: config.port,
            sample_rate: config.sample_rate_hz,
        })
    }

    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait::async_trait]
impl DatagramProvider for MulticastProvider {
    async fn next_datagram(&mut self) -> Result<Option<Vec<u8>>> {
        let (len, peer) = self
            .socket
            .recv_from(&mut self.buffer)
            .await
            .map_err(|e| ProtocolError::io("receiving datagram", e))?;

        if len == self.buffer.len() {
            debug!("Datagram from {} filled the {}-byte buffer", peer, len);
        }
        trace!("Datagram: {} bytes from {}", len, peer);

        Ok(Some(self.buffer[..len].to_vec()))
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
