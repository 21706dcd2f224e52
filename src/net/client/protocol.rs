//! Underlying transport protocols.
//!
//! The dispatcher doesn’t access the network directly. Instead, it uses
//! two seams defined here:
//!
//! * [`DgramTransport`] sends a query as a single datagram and returns a
//!   [`PendingReply`] that waits for the matching answer, and
//! * [`StreamConnect`] establishes stream connections, possibly protected
//!   by TLS, over which queries are exchanged with [`stream_exchange`].
//!
//! [`UdpTransport`] and [`TcpConnector`] implement these seams with real
//! sockets.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::config::Config;
use super::error::Error;
use crate::base::header::Header;
use crate::base::iana::Rtype;
use crate::base::message::{peek_question, Message};
use crate::base::name::Dname;
use crate::base::net::Netmask;
use bytes::Bytes;
use core::future::Future;
use core::pin::Pin;
use parking_lot::Mutex;
use std::boxed::Box;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tokio::sync::broadcast;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::trace;

#[cfg(feature = "tls")]
use tokio_rustls::rustls::pki_types::ServerName;
#[cfg(feature = "tls")]
use tokio_rustls::rustls::ClientConfig;
#[cfg(feature = "tls")]
use tokio_rustls::TlsConnector;

/// How many times do we try a new random port if we get ‘address in use.’
const RETRY_RANDOM_PORT: usize = 10;

/// The size of the receive buffer for datagrams.
const RECV_SIZE: usize = 65535;

/// A future returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

//------------ AsyncStream ---------------------------------------------------

/// A byte stream connected to a name server.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {
    /// Returns the local address of the stream if there is one.
    fn local_addr(&self) -> Option<SocketAddr>;
}

impl AsyncStream for TcpStream {
    fn local_addr(&self) -> Option<SocketAddr> {
        TcpStream::local_addr(self).ok()
    }
}

#[cfg(feature = "tls")]
impl AsyncStream for tokio_rustls::client::TlsStream<TcpStream> {
    fn local_addr(&self) -> Option<SocketAddr> {
        self.get_ref().0.local_addr().ok()
    }
}

impl AsyncStream for tokio::io::DuplexStream {
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

//------------ MatchKey ------------------------------------------------------

/// The identity of an outstanding datagram query.
///
/// Two queries with the same key ask the same server the same question on
/// behalf of the same client subnet and can share one answer. Since
/// [`Dname`] compares and hashes without regard to case, so does the key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MatchKey {
    /// The address of the server.
    pub server: SocketAddr,

    /// The question name.
    pub qname: Dname,

    /// The question type.
    pub qtype: Rtype,

    /// The client subnet sent with the query.
    pub subnet: Option<Netmask>,
}

impl MatchKey {
    /// Creates a new key.
    pub fn new(
        server: SocketAddr,
        qname: &Dname,
        qtype: Rtype,
        subnet: Option<Netmask>,
    ) -> Self {
        MatchKey {
            server,
            qname: qname.clone(),
            qtype,
            subnet,
        }
    }
}

//------------ DgramTransport ------------------------------------------------

/// A transport sending queries as datagrams.
pub trait DgramTransport: Send + Sync {
    /// Sends a query message.
    ///
    /// The `key` describes the question of `message` and `id` is its
    /// message ID. If sending fails, the error is returned right away.
    /// Otherwise the returned value is used to wait for the answer.
    ///
    /// An implementation may decide not to send `message` at all if an
    /// identical query is already outstanding and instead return a
    /// _chained_ reply sharing the earlier query’s answer.
    fn send<'a>(
        &'a self,
        key: MatchKey,
        id: u16,
        message: &'a [u8],
    ) -> BoxFuture<'a, Result<Box<dyn PendingReply>, Error>>;
}

//------------ PendingReply --------------------------------------------------

/// The answer to a datagram query that is yet to arrive.
pub trait PendingReply: Send {
    /// Returns whether the answer is shared with an earlier query.
    fn is_chained(&self) -> bool;

    /// Waits at most `timeout` for the answer.
    fn recv(
        self: Box<Self>,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Bytes, Error>>;
}

//------------ UdpTransport --------------------------------------------------

/// The outstanding queries of a [`UdpTransport`].
type Inflight = Arc<Mutex<HashMap<MatchKey, broadcast::Sender<Reply>>>>;

/// The result shared among chained queries.
type Reply = Result<Bytes, Error>;

/// Datagram transport using a fresh UDP socket for every query.
///
/// Each query goes out from a new socket bound to a random port and only
/// datagrams arriving on that socket from the server are considered as
/// answers. Of these, only a datagram with the right message ID and
/// question is accepted.
///
/// Identical queries are chained: while a query is outstanding, another
/// query with the same [`MatchKey`] is not sent but waits for the answer
/// of the first one.
#[derive(Clone, Debug)]
pub struct UdpTransport {
    /// The local IPv4 address to bind to.
    local_v4: Ipv4Addr,

    /// The local IPv6 address to bind to.
    local_v6: Ipv6Addr,

    /// Whether answers must echo the client subnet of the query.
    ecs_hardening: bool,

    /// The outstanding queries.
    inflight: Inflight,
}

impl UdpTransport {
    /// Creates a new transport using the relevant parts of `config`.
    pub fn new(config: &Config) -> Self {
        UdpTransport {
            local_v4: config.local_v4(),
            local_v6: config.local_v6(),
            ecs_hardening: config.ecs_hardening(),
            inflight: Default::default(),
        }
    }

    /// Returns the number of outstanding queries that can be chained to.
    pub fn inflight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Sends a query or chains it to an identical one.
    async fn start(
        &self,
        key: MatchKey,
        id: u16,
        message: &[u8],
    ) -> Result<Box<dyn PendingReply>, Error> {
        let (tx, guard) = {
            let mut inflight = self.inflight.lock();
            match inflight.entry(key.clone()) {
                Entry::Occupied(entry) => {
                    trace!(
                        server = %key.server,
                        qname = %key.qname,
                        qtype = %key.qtype,
                        "chaining to outstanding query"
                    );
                    return Ok(Box::new(ChainedReply {
                        rx: entry.get().subscribe(),
                    }));
                }
                Entry::Vacant(entry) => {
                    let (tx, _) = broadcast::channel(1);
                    entry.insert(tx.clone());
                    (
                        tx,
                        InflightGuard {
                            inflight: self.inflight.clone(),
                            key: key.clone(),
                        },
                    )
                }
            }
        };
        match self.open(key.server, message).await {
            Ok(sock) => Ok(Box::new(LeaderReply {
                sock,
                key,
                id,
                ecs_hardening: self.ecs_hardening,
                tx,
                guard,
            })),
            Err(err) => {
                drop(guard);
                let _ = tx.send(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Creates a socket connected to `server` and sends `message`.
    async fn open(
        &self,
        server: SocketAddr,
        message: &[u8],
    ) -> Result<UdpSocket, Error> {
        let local = match server {
            SocketAddr::V4(_) => IpAddr::V4(self.local_v4),
            SocketAddr::V6(_) => IpAddr::V6(self.local_v6),
        };
        let sock = udp_bind(local)
            .await
            .map_err(|err| Error::UdpBind(Arc::new(err)))?;
        sock.connect(server)
            .await
            .map_err(|err| Error::UdpConnect(Arc::new(err)))?;
        let sent = sock
            .send(message)
            .await
            .map_err(|err| Error::UdpSend(Arc::new(err)))?;
        if sent != message.len() {
            return Err(Error::UdpShortSend);
        }
        Ok(sock)
    }
}

impl DgramTransport for UdpTransport {
    fn send<'a>(
        &'a self,
        key: MatchKey,
        id: u16,
        message: &'a [u8],
    ) -> BoxFuture<'a, Result<Box<dyn PendingReply>, Error>> {
        Box::pin(self.start(key, id, message))
    }
}

/// Binds a UDP socket to a random port.
///
/// The port is picked by the operating system. If it happens to pick one
/// that is in use, we try again a few times.
async fn udp_bind(local: IpAddr) -> Result<UdpSocket, io::Error> {
    let mut i = 0;
    loop {
        match UdpSocket::bind(SocketAddr::new(local, 0)).await {
            Ok(sock) => return Ok(sock),
            Err(err) => {
                if err.kind() != io::ErrorKind::AddrInUse
                    || i == RETRY_RANDOM_PORT
                {
                    return Err(err);
                }
                i += 1
            }
        }
    }
}

//------------ InflightGuard -------------------------------------------------

/// Removes an outstanding query when dropped.
#[derive(Debug)]
struct InflightGuard {
    /// The map of outstanding queries.
    inflight: Inflight,

    /// The key of the query.
    key: MatchKey,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.inflight.lock().remove(&self.key);
    }
}

//------------ LeaderReply ---------------------------------------------------

/// The answer to a query that has actually been sent.
struct LeaderReply {
    /// The socket the query was sent from.
    sock: UdpSocket,

    /// The key of the query.
    key: MatchKey,

    /// The message ID of the query.
    id: u16,

    /// Whether answers must echo the client subnet.
    ecs_hardening: bool,

    /// The sender for chained queries.
    tx: broadcast::Sender<Reply>,

    /// The guard of the entry in the outstanding queries.
    guard: InflightGuard,
}

impl LeaderReply {
    /// Receives datagrams until an answer arrives or time runs out.
    async fn wait(&self, deadline: Instant) -> Result<Bytes, Error> {
        let mut buf = vec![0; RECV_SIZE];
        loop {
            let len = match timeout_at(deadline, self.sock.recv(&mut buf))
                .await
            {
                Ok(Ok(len)) => len,
                Ok(Err(err)) => return Err(Error::UdpReceive(Arc::new(err))),
                Err(_) => return Err(Error::Timeout),
            };
            let data = &buf[..len];
            if self.is_answer(data) {
                return Ok(Bytes::copy_from_slice(data));
            }
        }
    }

    /// Returns whether a datagram is the answer to the query.
    ///
    /// Datagrams with the right ID whose question can’t be decoded are
    /// dropped. Datagrams without a question are accepted, except when the
    /// client subnet must be checked.
    fn is_answer(&self, data: &[u8]) -> bool {
        let header = match Header::for_message(data) {
            Ok(header) => header,
            Err(_) => {
                trace!(server = %self.key.server, "dropping short datagram");
                return false;
            }
        };
        if header.id() != self.id || !header.qr() {
            trace!(
                server = %self.key.server,
                id = header.id(),
                expected = self.id,
                "dropping datagram with wrong ID"
            );
            return false;
        }
        let subnet = match self.key.subnet {
            Some(subnet) if self.ecs_hardening => subnet,
            _ => {
                return match peek_question(data) {
                    Ok((_, Some(question))) => self.check_question(
                        question.qname(),
                        question.qtype(),
                    ),
                    Ok((_, None)) => true,
                    Err(_) => {
                        trace!(
                            server = %self.key.server,
                            "dropping datagram with undecodable question"
                        );
                        false
                    }
                }
            }
        };
        let msg = match Message::from_slice(data) {
            Ok(msg) => msg,
            Err(_) => {
                trace!(
                    server = %self.key.server,
                    "dropping unparseable datagram"
                );
                return false;
            }
        };
        if let Some(question) = msg.question() {
            if !self.check_question(question.qname(), question.qtype()) {
                return false;
            }
        }
        let echoed = msg
            .opt()
            .and_then(|opt| opt.client_subnet())
            .map(|ecs| ecs.source());
        if echoed != Some(subnet) {
            trace!(
                server = %self.key.server,
                sent = %subnet,
                "dropping datagram without matching client subnet"
            );
            return false;
        }
        true
    }

    /// Checks that the question of a datagram is the question asked.
    fn check_question(&self, qname: &Dname, qtype: Rtype) -> bool {
        if *qname != self.key.qname || qtype != self.key.qtype {
            trace!(
                server = %self.key.server,
                qname = %qname,
                qtype = %qtype,
                "dropping datagram with wrong question"
            );
            return false;
        }
        true
    }
}

impl PendingReply for LeaderReply {
    fn is_chained(&self) -> bool {
        false
    }

    fn recv(
        self: Box<Self>,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Bytes, Error>> {
        Box::pin(async move {
            let res = self.wait(Instant::now() + timeout).await;
            let LeaderReply { tx, guard, .. } = *self;
            // Remove the entry first so nobody subscribes after the send.
            drop(guard);
            let _ = tx.send(res.clone());
            res
        })
    }
}

//------------ ChainedReply --------------------------------------------------

/// The answer to a query chained to an outstanding one.
struct ChainedReply {
    /// The receiver for the answer of the outstanding query.
    rx: broadcast::Receiver<Reply>,
}

impl PendingReply for ChainedReply {
    fn is_chained(&self) -> bool {
        true
    }

    fn recv(
        self: Box<Self>,
        wait: Duration,
    ) -> BoxFuture<'static, Result<Bytes, Error>> {
        let mut rx = self.rx;
        Box::pin(async move {
            match timeout(wait, rx.recv()).await {
                Ok(Ok(res)) => res,
                Ok(Err(_)) => Err(Error::ChainAbandoned),
                Err(_) => Err(Error::Timeout),
            }
        })
    }
}

//------------ StreamConnect -------------------------------------------------

/// The parameters for establishing a stream connection.
#[derive(Clone, Copy, Debug)]
pub struct ConnectRequest<'a> {
    /// The address of the server.
    pub server: SocketAddr,

    /// Whether the connection needs to be protected by TLS.
    pub tls: bool,

    /// The name of the server to authenticate it by.
    pub server_name: Option<&'a Dname>,

    /// The time establishing the connection may take.
    pub timeout: Duration,
}

/// Establishes stream connections.
pub trait StreamConnect: Send + Sync {
    /// Returns whether TLS connections can be established.
    fn supports_tls(&self) -> bool;

    /// Establishes a new connection.
    fn connect<'a>(
        &'a self,
        req: ConnectRequest<'a>,
    ) -> BoxFuture<'a, Result<Box<dyn AsyncStream>, Error>>;
}

//------------ TcpConnector --------------------------------------------------

/// Establishes TCP connections, optionally protected by TLS.
///
/// TLS is only available if a client configuration has been provided via
/// [`with_tls`][Self::with_tls].
#[derive(Clone, Debug)]
pub struct TcpConnector {
    /// The local IPv4 address to bind to.
    local_v4: Ipv4Addr,

    /// The local IPv6 address to bind to.
    local_v6: Ipv6Addr,

    /// The TLS client configuration.
    #[cfg(feature = "tls")]
    tls: Option<Arc<ClientConfig>>,
}

impl TcpConnector {
    /// Creates a new connector using the relevant parts of `config`.
    pub fn new(config: &Config) -> Self {
        TcpConnector {
            local_v4: config.local_v4(),
            local_v6: config.local_v6(),
            #[cfg(feature = "tls")]
            tls: None,
        }
    }

    /// Enables TLS with the given client configuration.
    #[cfg(feature = "tls")]
    pub fn with_tls(
        mut self,
        client_config: impl Into<Arc<ClientConfig>>,
    ) -> Self {
        self.tls = Some(client_config.into());
        self
    }

    /// Establishes a connection.
    async fn establish(
        &self,
        req: ConnectRequest<'_>,
    ) -> Result<Box<dyn AsyncStream>, Error> {
        let tcp = match timeout(req.timeout, self.connect_tcp(req.server)).await
        {
            Ok(res) => res.map_err(|err| Error::StreamConnect(Arc::new(err)))?,
            Err(_) => return Err(Error::Timeout),
        };
        if req.tls {
            self.start_tls(tcp, req).await
        } else {
            Ok(Box::new(tcp))
        }
    }

    /// Establishes a TCP connection from the configured local address.
    async fn connect_tcp(
        &self,
        server: SocketAddr,
    ) -> Result<TcpStream, io::Error> {
        let (sock, local) = match server {
            SocketAddr::V4(_) => {
                (TcpSocket::new_v4()?, IpAddr::V4(self.local_v4))
            }
            SocketAddr::V6(_) => {
                (TcpSocket::new_v6()?, IpAddr::V6(self.local_v6))
            }
        };
        sock.bind(SocketAddr::new(local, 0))?;
        let stream = sock.connect(server).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Performs the TLS handshake over an established connection.
    #[cfg(feature = "tls")]
    async fn start_tls(
        &self,
        tcp: TcpStream,
        req: ConnectRequest<'_>,
    ) -> Result<Box<dyn AsyncStream>, Error> {
        let client_config = match self.tls.as_ref() {
            Some(client_config) => client_config.clone(),
            None => return Err(Error::TlsUnavailable),
        };
        let server_name = tls_server_name(req.server, req.server_name);
        let connector = TlsConnector::from(client_config);
        match timeout(req.timeout, connector.connect(server_name, tcp)).await {
            Ok(Ok(stream)) => Ok(Box::new(stream)),
            Ok(Err(err)) => Err(Error::TlsHandshake(Arc::new(err))),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Performs the TLS handshake over an established connection.
    #[cfg(not(feature = "tls"))]
    async fn start_tls(
        &self,
        _tcp: TcpStream,
        _req: ConnectRequest<'_>,
    ) -> Result<Box<dyn AsyncStream>, Error> {
        Err(Error::TlsUnavailable)
    }
}

impl StreamConnect for TcpConnector {
    fn supports_tls(&self) -> bool {
        #[cfg(feature = "tls")]
        {
            self.tls.is_some()
        }
        #[cfg(not(feature = "tls"))]
        {
            false
        }
    }

    fn connect<'a>(
        &'a self,
        req: ConnectRequest<'a>,
    ) -> BoxFuture<'a, Result<Box<dyn AsyncStream>, Error>> {
        Box::pin(self.establish(req))
    }
}

/// Returns the name to authenticate a server by.
///
/// This is the server’s domain name if known and acceptable, otherwise its
/// IP address.
#[cfg(feature = "tls")]
fn tls_server_name(
    server: SocketAddr,
    name: Option<&Dname>,
) -> ServerName<'static> {
    if let Some(name) = name.filter(|name| !name.is_root()) {
        let mut name = name.to_string();
        name.pop();
        if let Ok(res) = ServerName::try_from(name) {
            return res;
        }
    }
    ServerName::from(server.ip())
}

//------------ stream_exchange -----------------------------------------------

/// Exchanges a query and its answer over a stream.
///
/// The query is sent preceded by its length as a 16 bit value, and the
/// answer is expected to come the same way. The whole exchange must be
/// completed within `wait`.
pub async fn stream_exchange(
    stream: &mut dyn AsyncStream,
    message: &[u8],
    wait: Duration,
) -> Result<Bytes, Error> {
    let len = u16::try_from(message.len()).map_err(|_| Error::MessageTooLarge)?;
    match timeout(wait, exchange(stream, len, message)).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout),
    }
}

/// Writes the framed query and reads the framed answer.
async fn exchange(
    stream: &mut dyn AsyncStream,
    len: u16,
    message: &[u8],
) -> Result<Bytes, Error> {
    let mut buf = Vec::with_capacity(message.len() + 2);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(message);
    stream
        .write_all(&buf)
        .await
        .map_err(|err| Error::StreamWriteError(Arc::new(err)))?;
    stream
        .flush()
        .await
        .map_err(|err| Error::StreamWriteError(Arc::new(err)))?;

    let mut len = [0u8; 2];
    read_exact(stream, &mut len).await?;
    let mut reply = vec![0; usize::from(u16::from_be_bytes(len))];
    read_exact(stream, &mut reply).await?;
    Ok(reply.into())
}

/// Fills `buf` from the stream.
async fn read_exact(
    stream: &mut dyn AsyncStream,
    buf: &mut [u8],
) -> Result<(), Error> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            Err(Error::StreamUnexpectedEndOfData)
        }
        Err(err) => Err(Error::StreamReadError(Arc::new(err))),
    }
}

//============ Testing =======================================================
