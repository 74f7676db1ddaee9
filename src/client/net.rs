//! The underlying network stream: plain TCP, upgraded in place to TLS

use std::{
    fmt::{self, Debug, Formatter},
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use rustls::{pki_types::ServerName, ClientConnection, StreamOwned};

use crate::{
    client::{tls::TlsParameters, MockStream},
    error, Error,
};

/// Represents the different types of underlying network streams
pub enum NetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// Mock stream
    Mock(MockStream),
}

impl Debug for NetworkStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NetworkStream::Tcp(_) => "NetworkStream::Tcp",
            NetworkStream::Tls(_) => "NetworkStream::Tls",
            NetworkStream::Mock(_) => "NetworkStream::Mock",
        })
    }
}

impl NetworkStream {
    /// Opens a TCP connection, honoring the timeout for the connect itself
    pub fn connect<A: ToSocketAddrs>(
        server: A,
        timeout: Option<Duration>,
    ) -> Result<NetworkStream, Error> {
        fn try_connect(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
            match timeout {
                Some(t) => TcpStream::connect_timeout(addr, t),
                None => TcpStream::connect(addr),
            }
        }

        let addrs = server.to_socket_addrs().map_err(error::network)?;
        let mut last_err = None;
        for addr in addrs {
            match try_connect(&addr, timeout) {
                Ok(stream) => return Ok(NetworkStream::Tcp(stream)),
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => error::network(err),
            None => error::network(io::Error::new(
                io::ErrorKind::NotFound,
                "could not resolve to any address",
            )),
        })
    }

    /// Performs the TLS client handshake over the existing connection
    ///
    /// The plaintext socket is not closed or reconnected; the TLS records
    /// start flowing on the same TCP stream, as STARTTLS requires. A no-op
    /// on already-encrypted and mock streams.
    pub fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        let NetworkStream::Tcp(stream) = self else {
            return Ok(());
        };

        let tcp = stream.try_clone().map_err(error::network)?;
        let server_name = ServerName::try_from(tls_parameters.domain().to_owned())
            .map_err(error::handshake)?;
        let connection = ClientConnection::new(tls_parameters.connector(), server_name)
            .map_err(error::handshake)?;

        let mut tls = StreamOwned::new(connection, tcp);
        while tls.conn.is_handshaking() {
            if let Err(err) = tls.conn.complete_io(&mut tls.sock) {
                return Err(match err.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => error::network(err),
                    _ => error::handshake(err),
                });
            }
        }

        *self = NetworkStream::Tls(Box::new(tls));
        Ok(())
    }

    /// Is the stream encrypted
    pub fn is_encrypted(&self) -> bool {
        matches!(self, NetworkStream::Tls(_))
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self {
            NetworkStream::Tcp(s) => s.peer_addr(),
            NetworkStream::Tls(s) => s.sock.peer_addr(),
            NetworkStream::Mock(_) => Ok("127.0.0.1:587".parse().unwrap()),
        }
    }

    /// Shutdowns the connection
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self {
            NetworkStream::Tcp(s) => s.shutdown(how),
            NetworkStream::Tls(s) => s.sock.shutdown(how),
            NetworkStream::Mock(_) => Ok(()),
        }
    }

    /// Set read timeout for IO calls
    pub fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self {
            NetworkStream::Tcp(s) => s.set_read_timeout(duration),
            NetworkStream::Tls(s) => s.sock.set_read_timeout(duration),
            NetworkStream::Mock(_) => Ok(()),
        }
    }

    /// Set write timeout for IO calls
    pub fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self {
            NetworkStream::Tcp(s) => s.set_write_timeout(duration),
            NetworkStream::Tls(s) => s.sock.set_write_timeout(duration),
            NetworkStream::Mock(_) => Ok(()),
        }
    }

    /// The negotiated protocol version and cipher suite, once encrypted
    pub(crate) fn tls_negotiation(
        &self,
    ) -> Option<(rustls::ProtocolVersion, rustls::SupportedCipherSuite)> {
        match self {
            NetworkStream::Tls(s) => Some((
                s.conn.protocol_version()?,
                s.conn.negotiated_cipher_suite()?,
            )),
            _ => None,
        }
    }

    /// The certificate chain the server presented, leaf first, DER encoded
    pub(crate) fn peer_certificates(&self) -> Option<Vec<Vec<u8>>> {
        match self {
            NetworkStream::Tls(s) => Some(
                s.conn
                    .peer_certificates()?
                    .iter()
                    .map(|c| c.as_ref().to_vec())
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NetworkStream::Tcp(s) => s.read(buf),
            NetworkStream::Tls(s) => s.read(buf),
            NetworkStream::Mock(s) => s.read(buf),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            NetworkStream::Tcp(s) => s.write(buf),
            NetworkStream::Tls(s) => s.write(buf),
            NetworkStream::Mock(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NetworkStream::Tcp(s) => s.flush(),
            NetworkStream::Tls(s) => s.flush(),
            NetworkStream::Mock(s) => s.flush(),
        }
    }
}
