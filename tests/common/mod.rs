//! Helpers shared by the integration tests.
#![allow(dead_code)]

use domain_egress::base::iana::{Class, Opcode, Rcode, Rtype};
use domain_egress::base::message::Message;
use domain_egress::base::message_builder::MessageWriter;
use domain_egress::base::name::Dname;
use domain_egress::base::net::Netmask;
use domain_egress::base::opt::ClientSubnet;
use domain_egress::base::record::Section;
use domain_egress::net::client::error::Error;
use domain_egress::net::client::protocol::{
    AsyncStream, BoxFuture, ConnectRequest, DgramTransport, MatchKey,
    PendingReply, StreamConnect,
};
use domain_egress::net::client::random::RandomSource;
use domain_egress::net::client::telemetry::{
    IncomingResponse, OutgoingQuery, QueryLogger, SinkError,
};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpListener, UdpSocket};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

//------------ Setup ---------------------------------------------------------

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .without_time()
        .try_init()
        .ok();
}

pub fn name(s: &str) -> Dname {
    Dname::from_str(s).unwrap()
}

pub fn mask(s: &str) -> Netmask {
    Netmask::from_str(s).unwrap()
}

pub fn server(port: u16) -> SocketAddr {
    SocketAddr::from(([192, 0, 2, 1], port))
}

//------------ Building Responses --------------------------------------------

/// A function producing the answer to a query, or `None` for no answer.
pub type Responder = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

pub fn responder(
    f: impl Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
) -> Responder {
    Arc::new(f)
}

/// Starts a response to `query` with the same ID and question.
pub fn response_to(query: &[u8]) -> MessageWriter {
    let msg = Message::from_slice(query).unwrap();
    let question = msg.question().unwrap();
    response_with_question(query, question.qname(), question.qtype())
}

/// Starts a response to `query` with the given question.
pub fn response_with_question(
    query: &[u8],
    qname: &Dname,
    qtype: Rtype,
) -> MessageWriter {
    let msg = Message::from_slice(query).unwrap();
    let mut res = MessageWriter::new(qname, qtype, Class::IN, Opcode::QUERY);
    let mut header = res.header_mut();
    header.set_id(msg.header().id());
    header.set_qr(true);
    header.set_rd(msg.header().rd());
    res
}

/// Adds an A record to the answer section.
pub fn add_a(msg: &mut MessageWriter, owner: &Dname, addr: [u8; 4]) {
    msg.start_record(owner, Rtype::A, 3600, Class::IN, Section::Answer, true);
    msg.push_slice(&addr);
    msg.commit();
}

/// Adds an AAAA record to the answer section.
pub fn add_aaaa(msg: &mut MessageWriter, owner: &Dname, addr: [u8; 16]) {
    msg.start_record(
        owner,
        Rtype::AAAA,
        3600,
        Class::IN,
        Section::Answer,
        true,
    );
    msg.push_slice(&addr);
    msg.commit();
}

/// Adds an OPT record, possibly with a client subnet option.
pub fn add_opt(msg: &mut MessageWriter, ecs: Option<(Netmask, u8)>) {
    let options: Vec<_> = ecs
        .map(|(source, scope)| ClientSubnet::new(source, scope).to_option())
        .into_iter()
        .collect();
    msg.add_opt(1232, 0, 0, &options, 0);
}

/// Answers the question of `query` with a single A record.
pub fn a_response(query: &[u8]) -> Vec<u8> {
    let msg = Message::from_slice(query).unwrap();
    let qname = msg.question().unwrap().qname().clone();
    let mut res = response_to(query);
    add_a(&mut res, &qname, [192, 0, 2, 10]);
    if msg.opt().is_some() {
        add_opt(&mut res, None);
    }
    res.finish()
}

/// Returns a bare header answering `query` with the given rcode.
pub fn header_only(query: &[u8], rcode: Rcode) -> Vec<u8> {
    let mut res = vec![0; 12];
    res[..2].copy_from_slice(&query[..2]);
    res[2] = 0x80;
    res[3] = rcode.to_int();
    res
}

/// Returns the client subnet option of a query.
pub fn query_subnet(query: &[u8]) -> Option<Netmask> {
    Message::from_slice(query)
        .ok()?
        .opt()?
        .client_subnet()
        .map(|ecs| ecs.source())
}

//------------ FakeDgram -----------------------------------------------------

/// A datagram transport answering through a closure.
pub struct FakeDgram {
    responder: Responder,
    queries: Arc<Mutex<Vec<Vec<u8>>>>,
    chained: bool,
    delay: Duration,
    send_error: Option<Error>,
}

impl FakeDgram {
    pub fn new(responder: Responder) -> Self {
        FakeDgram {
            responder,
            queries: Default::default(),
            chained: false,
            delay: Duration::ZERO,
            send_error: None,
        }
    }

    pub fn failing(err: Error) -> Self {
        let mut res = Self::new(responder(|_| None));
        res.send_error = Some(err);
        res
    }

    pub fn chained(mut self) -> Self {
        self.chained = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns a handle to the queries sent.
    pub fn queries(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.queries.clone()
    }
}

impl DgramTransport for FakeDgram {
    fn send<'a>(
        &'a self,
        _key: MatchKey,
        _id: u16,
        message: &'a [u8],
    ) -> BoxFuture<'a, Result<Box<dyn PendingReply>, Error>> {
        if let Some(err) = self.send_error.clone() {
            return Box::pin(async move {
                Err::<Box<dyn PendingReply>, _>(err)
            });
        }
        self.queries.lock().push(message.to_vec());
        let reply = FakeReply {
            reply: (self.responder)(message),
            chained: self.chained,
            delay: self.delay,
        };
        Box::pin(async move { Ok(Box::new(reply) as Box<dyn PendingReply>) })
    }
}

struct FakeReply {
    reply: Option<Vec<u8>>,
    chained: bool,
    delay: Duration,
}

impl PendingReply for FakeReply {
    fn is_chained(&self) -> bool {
        self.chained
    }

    fn recv(
        self: Box<Self>,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<bytes::Bytes, Error>> {
        let FakeReply { reply, delay, .. } = *self;
        Box::pin(async move {
            match reply {
                Some(reply) if delay <= timeout => {
                    sleep(delay).await;
                    Ok(reply.into())
                }
                _ => {
                    sleep(timeout).await;
                    Err(Error::Timeout)
                }
            }
        })
    }
}

//------------ FakeStream ----------------------------------------------------

/// A stream connector serving each connection through a closure.
///
/// If the closure returns `None`, the connection is closed.
pub struct FakeStream {
    responder: Responder,
    tls: bool,
    refuse: bool,
    connects: Arc<Mutex<Vec<(bool, Option<Dname>)>>>,
    queries: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeStream {
    pub fn new(responder: Responder) -> Self {
        FakeStream {
            responder,
            tls: false,
            refuse: false,
            connects: Default::default(),
            queries: Default::default(),
        }
    }

    pub fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Returns a handle to the TLS flag and server name of each connect.
    pub fn connects(&self) -> Arc<Mutex<Vec<(bool, Option<Dname>)>>> {
        self.connects.clone()
    }

    /// Returns a handle to the queries received.
    pub fn queries(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.queries.clone()
    }
}

impl StreamConnect for FakeStream {
    fn supports_tls(&self) -> bool {
        self.tls
    }

    fn connect<'a>(
        &'a self,
        req: ConnectRequest<'a>,
    ) -> BoxFuture<'a, Result<Box<dyn AsyncStream>, Error>> {
        self.connects
            .lock()
            .push((req.tls, req.server_name.cloned()));
        if self.refuse {
            return Box::pin(async {
                Err::<Box<dyn AsyncStream>, _>(Error::StreamConnect(Arc::new(
                    io::Error::from(io::ErrorKind::ConnectionRefused),
                )))
            });
        }
        let (client, server) = tokio::io::duplex(65536);
        tokio::spawn(serve_stream(
            server,
            self.responder.clone(),
            self.queries.clone(),
        ));
        Box::pin(async move { Ok(Box::new(client) as Box<dyn AsyncStream>) })
    }
}

/// Returns a connection whose peer has gone away.
pub fn dead_stream() -> Box<dyn AsyncStream> {
    let (client, _) = tokio::io::duplex(1024);
    Box::new(client)
}

async fn serve_stream(
    mut stream: DuplexStream,
    responder: Responder,
    queries: Arc<Mutex<Vec<Vec<u8>>>>,
) {
    loop {
        let mut len = [0u8; 2];
        if stream.read_exact(&mut len).await.is_err() {
            return;
        }
        let mut query = vec![0; usize::from(u16::from_be_bytes(len))];
        if stream.read_exact(&mut query).await.is_err() {
            return;
        }
        queries.lock().push(query.clone());
        let reply = match responder(&query) {
            Some(reply) => reply,
            None => return,
        };
        let mut framed = (reply.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(&reply);
        if stream.write_all(&framed).await.is_err() {
            return;
        }
    }
}

//------------ FakeRandom ----------------------------------------------------

/// A random source returning fixed values.
pub struct FakeRandom {
    id: u16,
    jitter: u64,
    bounds: Mutex<Vec<u64>>,
}

impl FakeRandom {
    pub fn new(id: u16) -> Arc<Self> {
        Self::with_jitter(id, 0)
    }

    pub fn with_jitter(id: u16, jitter: u64) -> Arc<Self> {
        Arc::new(FakeRandom {
            id,
            jitter,
            bounds: Default::default(),
        })
    }

    /// Returns the bounds `below` was called with.
    pub fn bounds(&self) -> Vec<u64> {
        self.bounds.lock().clone()
    }
}

impl RandomSource for FakeRandom {
    fn next_u16(&self) -> u16 {
        self.id
    }

    fn below(&self, bound: u64) -> u64 {
        self.bounds.lock().push(bound);
        if bound == 0 {
            0
        } else {
            self.jitter.min(bound - 1)
        }
    }

    fn fill(&self, buf: &mut [u8]) {
        buf.fill(0x42)
    }
}

//------------ RecordingLogger -----------------------------------------------

/// A telemetry sink keeping all events.
#[derive(Default)]
pub struct RecordingLogger {
    pub queries: Mutex<Vec<OutgoingQuery>>,
    pub responses: Mutex<Vec<IncomingResponse>>,
    pub error: Option<SinkError>,
    pub responses_only: bool,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn responses_only() -> Arc<Self> {
        Arc::new(RecordingLogger {
            responses_only: true,
            ..Default::default()
        })
    }

    pub fn failing(error: SinkError) -> Arc<Self> {
        Arc::new(RecordingLogger {
            error: Some(error),
            ..Default::default()
        })
    }
}

impl QueryLogger for RecordingLogger {
    fn logs_queries(&self) -> bool {
        !self.responses_only
    }

    fn log_query(&self, query: &OutgoingQuery) -> Result<(), SinkError> {
        self.queries.lock().push(query.clone());
        match self.error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn log_response(
        &self,
        response: &IncomingResponse,
    ) -> Result<(), SinkError> {
        self.responses.lock().push(response.clone());
        match self.error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

//------------ Loopback Servers ----------------------------------------------

/// Starts a UDP server on the loopback interface.
///
/// For each query, the handler returns the datagrams to send back. They
/// are sent after `delay`. Returns the server address and a counter of
/// received queries.
pub async fn udp_server(
    delay: Duration,
    handler: impl Fn(&[u8]) -> Vec<Vec<u8>> + Send + Sync + 'static,
) -> (SocketAddr, Arc<AtomicUsize>) {
    let sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let addr = sock.local_addr().unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(handler);
    let task_count = count.clone();
    tokio::spawn(async move {
        let mut buf = vec![0; 65535];
        loop {
            let (len, peer) = match sock.recv_from(&mut buf).await {
                Ok(some) => some,
                Err(_) => return,
            };
            task_count.fetch_add(1, Ordering::SeqCst);
            let replies = handler(&buf[..len]);
            let sock = sock.clone();
            tokio::spawn(async move {
                sleep(delay).await;
                for reply in replies {
                    let _ = sock.send_to(&reply, peer).await;
                }
            });
        }
    });
    (addr, count)
}

/// Starts a TCP server on the loopback interface.
///
/// Each connection answers at most `per_connection` queries before it is
/// closed. Returns the server address and a counter of accepted
/// connections.
pub async fn tcp_server(
    per_connection: usize,
    handler: impl Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let handler = Arc::new(handler);
    let task_count = count.clone();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(some) => some,
                Err(_) => return,
            };
            task_count.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            tokio::spawn(async move {
                for _ in 0..per_connection {
                    let mut len = [0u8; 2];
                    if stream.read_exact(&mut len).await.is_err() {
                        return;
                    }
                    let mut query =
                        vec![0; usize::from(u16::from_be_bytes(len))];
                    if stream.read_exact(&mut query).await.is_err() {
                        return;
                    }
                    let reply = handler(&query);
                    let mut framed =
                        (reply.len() as u16).to_be_bytes().to_vec();
                    framed.extend_from_slice(&reply);
                    if stream.write_all(&framed).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    (addr, count)
}
