//! UDP socket bindings for the datagram path.
//!
//! [`DatagramSocket`] is implemented for a non-blocking
//! [`std::net::UdpSocket`] and, with the `transport` feature, for tokio's
//! [`UdpSocket`](tokio::net::UdpSocket), which also lets the host await the
//! transport's watches with [`EspTransport::wait`].

use std::io;
use std::net::SocketAddr;

use crate::core::DatagramSocket;

impl DatagramSocket for std::net::UdpSocket {
    fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf)
    }

    fn try_send(&self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)
    }
}

/// Bind `local`, connect to `remote` and switch to non-blocking mode.
pub fn connect_std_udp(local: SocketAddr, remote: SocketAddr) -> io::Result<std::net::UdpSocket> {
    let socket = std::net::UdpSocket::bind(local)?;
    socket.connect(remote)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

#[cfg(feature = "transport")]
pub use self::tokio_socket::connect_udp;

#[cfg(feature = "transport")]
mod tokio_socket {
    use std::io;
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::io::Interest;
    use tokio::net::UdpSocket;

    use crate::core::{DatagramSocket, TransportAdapter};
    use crate::transport::EspTransport;

    impl DatagramSocket for UdpSocket {
        fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            UdpSocket::try_recv(self, buf)
        }

        fn try_send(&self, buf: &[u8]) -> io::Result<usize> {
            UdpSocket::try_send(self, buf)
        }
    }

    /// Open a tokio UDP socket bound to `local` and connected to `remote`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_udp(local: SocketAddr, remote: SocketAddr) -> io::Result<UdpSocket> {
        let socket = super::connect_std_udp(local, remote)?;
        UdpSocket::from_std(socket)
    }

    impl<A> EspTransport<A, UdpSocket>
    where
        A: TransportAdapter<UdpSocket>,
    {
        /// Wait until the socket is ready for what the transport watches,
        /// or `timeout` elapses.
        ///
        /// Pass the timeout shortened by the last
        /// [`poll`](EspTransport::poll), then poll again.
        pub async fn wait(&self, timeout: Duration) -> io::Result<()> {
            let watches = self.link().watches();
            let mut interest = None;
            if watches.read || watches.except {
                interest = Some(Interest::READABLE);
            }
            if watches.write {
                interest = Some(match interest {
                    Some(interest) => interest.add(Interest::WRITABLE),
                    None => Interest::WRITABLE,
                });
            }

            let (Some(socket), Some(interest)) = (self.link().socket(), interest) else {
                tokio::time::sleep(timeout).await;
                return Ok(());
            };

            tokio::select! {
                ready = socket.ready(interest) => {
                    ready?;
                }
                _ = tokio::time::sleep(timeout) => {}
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crypto::KeySession;
    use crate::transport::{EspConfig, EspTransport, StateEvent};

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_std_socket_would_block_when_empty() {
        let peer = std::net::UdpSocket::bind(loopback()).unwrap();
        let socket = connect_std_udp(loopback(), peer.local_addr().unwrap()).unwrap();
        let mut buf = [0u8; 64];
        let err = DatagramSocket::try_recv(&socket, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    fn endpoint(
        socket: std::net::UdpSocket,
        rx_spi: u32,
        tx_spi: u32,
    ) -> EspTransport<(), std::net::UdpSocket> {
        let session = |spi| KeySession::new(spi, 0x05, 0x01, &[0x42; 32], &[0x24; 16]).unwrap();
        let mut transport = EspTransport::new(EspConfig::default(), ());
        let link = transport.link_mut();
        link.sessions_mut().install_incoming(session(rx_spi));
        link.sessions_mut().set_outgoing(session(tx_spi));
        link.apply(StateEvent::KeysInstalled);
        link.apply(StateEvent::ProbeReply);
        link.apply(StateEvent::Established);
        link.attach_socket(socket);
        transport
    }

    #[test]
    fn test_esp_over_loopback() {
        let a = std::net::UdpSocket::bind(loopback()).unwrap();
        let b = std::net::UdpSocket::bind(loopback()).unwrap();
        for (socket, peer) in [(&a, &b), (&b, &a)] {
            socket.connect(peer.local_addr().unwrap()).unwrap();
            socket.set_nonblocking(true).unwrap();
        }
        let mut alice = endpoint(a, 0xa1, 0xb0);
        let mut bob = endpoint(b, 0xb0, 0xa1);

        let payload = [0x60u8, 0, 0, 0, 0, 8, 17, 64, 1, 2, 3, 4, 5, 6, 7, 8];
        alice.send(&payload);
        let mut timeout = Duration::from_secs(1);
        assert!(alice.poll(&mut timeout).did_work());

        let mut received = None;
        for _ in 0..200 {
            bob.poll(&mut timeout);
            received = bob.recv();
            if received.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(received.unwrap().payload(), &payload);
        assert_eq!(bob.link().sessions().current_incoming().sequence_counter(), 1);
    }

    #[cfg(feature = "transport")]
    #[tokio::test]
    async fn test_tokio_socket_roundtrip() {
        let server = tokio::net::UdpSocket::bind(loopback()).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = connect_udp(loopback(), server_addr).unwrap();
        server.connect(client.local_addr().unwrap()).await.unwrap();

        let sent = DatagramSocket::try_send(&client, b"hello esp").unwrap();
        assert_eq!(sent, 9);

        let mut buf = [0u8; 64];
        let len = loop {
            server.readable().await.unwrap();
            match DatagramSocket::try_recv(&server, &mut buf) {
                Ok(len) => break len,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => panic!("receive failed: {err}"),
            }
        };
        assert_eq!(&buf[..len], b"hello esp");
    }
}
