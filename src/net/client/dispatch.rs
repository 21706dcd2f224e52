//! Performing a single query exchange.
//!
//! The [`Dispatcher`] sends one query for a [`Request`] to one name server
//! and checks the answer. It knows nothing about iterative resolution:
//! which server to ask, whether to retry, and what to do with the answer
//! is up to the caller.
//!
//! All state shared between exchanges, such as the connection pool, the
//! random number source, the telemetry sinks, and the counters, are held
//! by the dispatcher and can be replaced at construction time.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::config::{Config, DnssecMode};
use super::error::Error;
use super::outcome::{Resolution, ResultKind};
use super::pool::{ConnectionPool, PooledConnection};
use super::protocol::{
    stream_exchange, ConnectRequest, DgramTransport, MatchKey,
    StreamConnect, TcpConnector, UdpTransport,
};
use super::random::{RandomSource, ThreadRandom};
use super::telemetry::{
    IncomingResponse, MessageId, OutgoingQuery, Protocol, QueryLogger,
    SinkError,
};
use crate::base::iana::{Class, Opcode, Rcode, Rtype};
use crate::base::message::Message;
use crate::base::message_builder::MessageWriter;
use crate::base::name::Dname;
use crate::base::net::Netmask;
use crate::base::opt::{
    block_padding_len, padding_option, ClientSubnet, DNSSEC_OK,
};
use crate::base::record::Record;
use bytes::Bytes;
use std::cmp;
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, trace, warn};

/// The port DNS-over-TLS is reached at.
const DOT_PORT: u16 = 853;

//------------ QueryContext --------------------------------------------------

/// Information about why a query is sent.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    /// The name of the name server.
    ///
    /// This is used to authenticate the server when using TLS and is
    /// included in telemetry.
    pub ns_name: Option<Dname>,

    /// The identifier of the client request that caused the query.
    pub initial_request_id: Option<MessageId>,
}

//------------ Request -------------------------------------------------------

/// A query to be sent to a name server.
#[derive(Clone, Debug)]
pub struct Request {
    /// The address of the name server.
    pub server: SocketAddr,

    /// The question name.
    pub qname: Dname,

    /// The question type.
    pub qtype: Rtype,

    /// Whether to use TCP instead of UDP.
    ///
    /// If the server’s port is 853 and
    /// [`Config::dot_to_port_853`] is set, TLS is used on top of TCP.
    pub tcp: bool,

    /// Whether to set the RD bit.
    pub recursion_desired: bool,

    /// The EDNS level. Zero means no EDNS.
    pub edns_level: u8,

    /// The client subnet to send along with the query.
    ///
    /// This is only used if `edns_level` is not zero.
    pub source_mask: Option<Netmask>,

    /// Information about why the query is sent.
    pub context: QueryContext,
}

impl Request {
    /// Creates a request for a UDP query with EDNS but without RD.
    pub fn new(server: SocketAddr, qname: Dname, qtype: Rtype) -> Self {
        Request {
            server,
            qname,
            qtype,
            tcp: false,
            recursion_desired: false,
            edns_level: 1,
            source_mask: None,
            context: QueryContext::default(),
        }
    }
}

//------------ Counters ------------------------------------------------------

/// Statistics of a dispatcher.
#[derive(Debug, Default)]
pub struct Counters {
    /// The number of responses that could not be parsed.
    server_parse_errors: AtomicU64,

    /// The number of times DoT was requested but couldn’t be used.
    dot_unavailable: AtomicU64,
}

impl Counters {
    /// Returns the number of responses that could not be parsed.
    pub fn server_parse_errors(&self) -> u64 {
        self.server_parse_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of times DoT was requested but not available.
    pub fn dot_unavailable(&self) -> u64 {
        self.dot_unavailable.load(Ordering::Relaxed)
    }
}

//------------ Dispatcher ----------------------------------------------------

/// Sends queries and validates their answers.
///
/// The dispatcher is generic over the datagram transport `D` and the
/// stream connector `S`. Use [`Dispatcher::from_config`] to get one that
/// uses real sockets.
pub struct Dispatcher<D = UdpTransport, S = TcpConnector> {
    /// The configuration.
    config: Config,

    /// The transport for UDP queries.
    dgram: D,

    /// The connector for TCP and TLS queries.
    stream: S,

    /// The pool of idle stream connections.
    pool: Arc<ConnectionPool>,

    /// The source of query IDs and other random values.
    random: Arc<dyn RandomSource>,

    /// The telemetry sinks.
    loggers: Vec<Arc<dyn QueryLogger>>,

    /// The record types included in response events.
    export_types: HashSet<Rtype>,

    /// The statistics.
    counters: Arc<Counters>,
}

impl Dispatcher<UdpTransport, TcpConnector> {
    /// Creates a dispatcher using real sockets.
    ///
    /// TLS is not available. Use [`Dispatcher::new`] with a
    /// [`TcpConnector`] that has a TLS configuration to enable it.
    pub fn from_config(config: Config) -> Self {
        let dgram = UdpTransport::new(&config);
        let stream = TcpConnector::new(&config);
        Self::new(config, dgram, stream)
    }
}

impl<D, S> Dispatcher<D, S> {
    /// Creates a new dispatcher from its transports.
    pub fn new(config: Config, dgram: D, stream: S) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.pool().clone()));
        Dispatcher {
            config,
            dgram,
            stream,
            pool,
            random: Arc::new(ThreadRandom),
            loggers: Vec::new(),
            export_types: HashSet::new(),
            counters: Default::default(),
        }
    }

    /// Replaces the connection pool with a shared one.
    pub fn with_pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Replaces the source of random values.
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Replaces the counters with shared ones.
    pub fn with_counters(mut self, counters: Arc<Counters>) -> Self {
        self.counters = counters;
        self
    }

    /// Adds a telemetry sink.
    pub fn add_logger(&mut self, logger: Arc<dyn QueryLogger>) {
        self.loggers.push(logger)
    }

    /// Sets the record types to be included in response events.
    pub fn set_export_types(&mut self, types: impl IntoIterator<Item = Rtype>) {
        self.export_types = types.into_iter().collect()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the datagram transport.
    pub fn dgram(&self) -> &D {
        &self.dgram
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Returns the counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

impl<D: DgramTransport, S: StreamConnect> Dispatcher<D, S> {
    /// Performs a query exchange.
    ///
    /// This never fails: all problems are reported through the
    /// [`kind`][Resolution::kind] of the returned value.
    ///
    /// Note that a response that can’t be parsed results in
    /// [`ResultKind::Success`] with [`valid_packet`] set to `false`. See
    /// [`Resolution`] for details.
    ///
    /// A stream connection used for the exchange is returned to the pool
    /// only if a valid response was received over it.
    ///
    /// [`valid_packet`]: Resolution::valid_packet
    pub async fn resolve(&self, request: &Request) -> Resolution {
        let mut conn = None;
        let res = self.exchange(request, &mut conn).await;
        if let Some(conn) = conn {
            if res.valid_packet {
                self.pool.release(request.server, conn);
            } else {
                self.pool.discard(conn);
            }
        }
        res
    }

    /// Performs the exchange leaving a used connection in `conn`.
    async fn exchange(
        &self,
        request: &Request,
        conn: &mut Option<PooledConnection>,
    ) -> Resolution {
        let id = self.random.next_u16();
        let tls = request.tcp && self.use_tls(request.server);
        let message = self.build_query(request, id, tls);
        let subnet = request.source_mask.filter(|_| request.edns_level > 0);

        let event = Exchange {
            message_id: self.message_id(),
            protocol: if tls {
                Protocol::Dot
            } else if request.tcp {
                Protocol::Tcp
            } else {
                Protocol::Udp
            },
            id,
            query_time: SystemTime::now(),
            request,
        };
        self.log_query(&event, message.len(), subnet);

        let mut res = Resolution::new(ResultKind::Success);
        let started = Instant::now();
        let reply = if request.tcp {
            self.send_stream(request, tls, &message, conn).await
        } else {
            let key = MatchKey::new(
                request.server,
                &request.qname,
                request.qtype,
                subnet,
            );
            match self.dgram.send(key, id, &message).await {
                Ok(pending) => {
                    res.chained = pending.is_chained();
                    pending.recv(self.config.network_timeout()).await
                }
                Err(err) => {
                    debug!(
                        server = %request.server,
                        qname = %request.qname,
                        error = %err,
                        "sending query failed"
                    );
                    res.kind = err.kind();
                    return res;
                }
            }
        };
        let elapsed = started.elapsed();
        res.usec = elapsed.as_micros() as u64;

        let data = match reply {
            Ok(data) => data,
            Err(err) => {
                debug!(
                    server = %request.server,
                    qname = %request.qname,
                    error = %err,
                    "query failed"
                );
                self.log_response(&event, elapsed, 0, None, &[], None);
                res.kind = err.kind();
                return res;
            }
        };

        if res.chained {
            self.chained_jitter(res.usec).await;
        }

        self.validate(request, subnet, &event, elapsed, data, res)
    }

    /// Checks the answer and fills in the result.
    fn validate(
        &self,
        request: &Request,
        sent_subnet: Option<Netmask>,
        event: &Exchange,
        elapsed: Duration,
        data: Bytes,
        mut res: Resolution,
    ) -> Resolution {
        let len = data.len();
        let msg = match Message::from_octets(data) {
            Ok(msg) => msg,
            Err(err) => {
                if self.config.log_common_errors() {
                    info!(
                        server = %request.server,
                        error = %err,
                        "unable to parse packet from remote server"
                    );
                } else {
                    debug!(
                        server = %request.server,
                        error = %err,
                        "unable to parse packet from remote server"
                    );
                }
                self.counters
                    .server_parse_errors
                    .fetch_add(1, Ordering::Relaxed);
                res.rcode = Rcode::FORMERR;
                res.valid_packet = false;
                self.log_response(
                    event,
                    elapsed,
                    len,
                    Some(res.rcode),
                    &[],
                    None,
                );
                return res;
            }
        };

        let header = msg.header();
        res.aa = header.aa();
        res.tc = header.tc();
        res.rcode = header.rcode();

        match msg.question() {
            None if res.rcode == Rcode::FORMERR => {
                // Servers that don’t do EDNS may answer like this.
                self.log_response(
                    event,
                    elapsed,
                    len,
                    Some(res.rcode),
                    &[],
                    None,
                );
                res.valid_packet = true;
                return res;
            }
            Some(question) if *question.qname() == request.qname => {}
            question => {
                if let Some(question) = question {
                    if !question.qname().is_root() {
                        info!(
                            server = %request.server,
                            qname = %request.qname,
                            onwire = %question.qname(),
                            "packet purporting to come from remote server \
                             contained wrong answer"
                        );
                    }
                }
                if res.rcode == Rcode::NOERROR {
                    res.rcode = Rcode::SERVFAIL;
                }
                res.kind = ResultKind::PermanentError;
                return res;
            }
        }

        let mut subnet = None;
        if let Some(opt) = msg.opt().filter(|_| request.edns_level > 0) {
            res.have_edns = true;
            let echoed = sent_subnet.and_then(|sent| {
                opt.client_subnet().map(|echoed| (sent, echoed))
            });
            if let Some((sent, echoed)) = echoed {
                if !request.tcp && echoed.source() != sent {
                    info!(
                        server = %request.server,
                        qname = %request.qname,
                        outgoing = %sent,
                        incoming = %echoed.source(),
                        "incoming ECS does not match outgoing"
                    );
                    res.kind = ResultKind::Spoofed;
                    return res;
                }
                if echoed.scope_prefix_len() != 0 {
                    subnet = Some(sent.truncate(cmp::min(
                        echoed.scope_prefix_len(),
                        sent.bits(),
                    )));
                }
            }
        }

        res.subnet = subnet;
        res.records = msg.into_records();
        self.log_response(
            event,
            elapsed,
            len,
            Some(res.rcode),
            &res.records,
            subnet,
        );
        res.valid_packet = true;
        res
    }

    /// Exchanges the query over a stream connection.
    ///
    /// A pooled connection is used if available. If the exchange fails
    /// over a pooled connection, the connection is closed and the exchange
    /// attempted again. If it fails over a new connection, we give up.
    async fn send_stream(
        &self,
        request: &Request,
        tls: bool,
        message: &[u8],
        conn: &mut Option<PooledConnection>,
    ) -> Result<Bytes, Error> {
        let timeout = self.config.network_timeout();
        loop {
            let (mut current, is_new) =
                match self.pool.acquire(request.server, tls) {
                    Some(current) => (current, false),
                    None => {
                        let stream = self
                            .stream
                            .connect(ConnectRequest {
                                server: request.server,
                                tls,
                                server_name: request.context.ns_name.as_ref(),
                                timeout,
                            })
                            .await?;
                        (PooledConnection::new(stream, tls), true)
                    }
                };
            current.count_query();
            match stream_exchange(current.stream_mut(), message, timeout).await
            {
                Ok(data) => {
                    *conn = Some(current);
                    return Ok(data);
                }
                Err(err) => {
                    self.pool.discard(current);
                    if is_new {
                        return Err(err);
                    }
                    trace!(
                        server = %request.server,
                        error = %err,
                        "pooled connection failed, retrying"
                    );
                }
            }
        }
    }

    /// Returns whether a stream query to `server` should use TLS.
    fn use_tls(&self, server: SocketAddr) -> bool {
        if !self.config.dot_to_port_853() || server.port() != DOT_PORT {
            return false;
        }
        if !self.stream.supports_tls() {
            error!(server = %server, "DoT requested but not available");
            self.counters.dot_unavailable.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Builds the query message.
    fn build_query(&self, request: &Request, id: u16, tls: bool) -> Vec<u8> {
        let mut msg = MessageWriter::new(
            &request.qname,
            request.qtype,
            Class::IN,
            Opcode::QUERY,
        );
        let dnssec = self.config.dnssec() != DnssecMode::Off;
        {
            let mut header = msg.header_mut();
            header.set_id(id);
            header.set_rd(request.recursion_desired);
            header.set_cd(request.recursion_desired && dnssec);
        }
        if request.edns_level > 0 {
            let bufsize = self.config.edns_bufsize();
            let mut options = Vec::new();
            if let Some(mask) = request.source_mask {
                options.push(ClientSubnet::for_query(mask).to_option());
            }
            if tls && self.config.padding_outgoing() {
                if let Some(len) = block_padding_len(
                    msg.size_with_opts(&options),
                    usize::from(bufsize),
                ) {
                    options.push(padding_option(len));
                }
            }
            msg.add_opt(
                bufsize,
                0,
                if dnssec { DNSSEC_OK } else { 0 },
                &options,
                0,
            );
        }
        msg.finish()
    }

    /// Sleeps a random time if a chained answer took long to arrive.
    ///
    /// All queries chained to the same one wake up at the same time. If
    /// that took long, they are spread out a bit.
    async fn chained_jitter(&self, usec: u64) {
        let timeout_ms = self.config.network_timeout().as_millis() as u64;
        let msec = usec / 1000;
        if msec > timeout_ms * 2 / 3 {
            let jitter = self.random.below(msec);
            if jitter > 0 {
                sleep(Duration::from_millis(jitter)).await;
            }
        }
    }
}

impl<D, S> Dispatcher<D, S> {
    /// Creates a new random identifier for an exchange.
    fn message_id(&self) -> MessageId {
        let mut octets = [0u8; 16];
        if !self.loggers.is_empty() {
            self.random.fill(&mut octets);
        }
        MessageId::from_octets(octets)
    }

    /// Hands a query event to all sinks that want it.
    fn log_query(
        &self,
        event: &Exchange,
        bytes: usize,
        subnet: Option<Netmask>,
    ) {
        if !self.loggers.iter().any(|l| l.logs_queries()) {
            return;
        }
        let query = OutgoingQuery {
            message_id: event.message_id,
            initial_request_id: event.request.context.initial_request_id,
            protocol: event.protocol,
            server: event.request.server,
            id: event.id,
            qname: event.request.qname.clone(),
            qtype: event.request.qtype,
            time: event.query_time,
            bytes,
            subnet,
            ns_name: event.request.context.ns_name.clone(),
        };
        for logger in self.loggers.iter().filter(|l| l.logs_queries()) {
            if let Err(err) = logger.log_query(&query) {
                log_sink_error(err);
            }
        }
    }

    /// Hands a response event to all sinks that want it.
    fn log_response(
        &self,
        event: &Exchange,
        elapsed: Duration,
        bytes: usize,
        rcode: Option<Rcode>,
        records: &[Record],
        subnet: Option<Netmask>,
    ) {
        if !self.loggers.iter().any(|l| l.logs_responses()) {
            return;
        }
        let response = IncomingResponse {
            message_id: event.message_id,
            initial_request_id: event.request.context.initial_request_id,
            protocol: event.protocol,
            server: event.request.server,
            id: event.id,
            qname: event.request.qname.clone(),
            qtype: event.request.qtype,
            query_time: event.query_time,
            elapsed,
            bytes,
            rcode,
            records: records
                .iter()
                .filter(|record| self.export_types.contains(&record.rtype()))
                .cloned()
                .collect(),
            subnet,
            ns_name: event.request.context.ns_name.clone(),
        };
        for logger in self.loggers.iter().filter(|l| l.logs_responses()) {
            if let Err(err) = logger.log_response(&response) {
                log_sink_error(err);
            }
        }
    }
}

impl<D, S> fmt::Debug for Dispatcher<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("loggers", &self.loggers.len())
            .field("export_types", &self.export_types)
            .field("counters", &self.counters)
            .finish()
    }
}

/// Logs the failure of a telemetry sink.
fn log_sink_error(err: SinkError) {
    match err {
        SinkError::PipeFull => debug!("telemetry sink full, dropping event"),
        err => warn!(error = %err, "telemetry sink failed"),
    }
}

//------------ Exchange ------------------------------------------------------

/// The parts of an exchange needed for its telemetry events.
struct Exchange<'a> {
    /// The identifier of the exchange.
    message_id: MessageId,

    /// The protocol used.
    protocol: Protocol,

    /// The message ID of the query.
    id: u16,

    /// When the query was sent.
    query_time: SystemTime,

    /// The request.
    request: &'a Request,
}

//============ Testing =======================================================
