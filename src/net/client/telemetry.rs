//! Reporting queries and responses to external consumers.
//!
//! Every query sent and every response received, or not received, can be
//! reported to any number of _sinks_. A sink is anything that implements
//! [`QueryLogger`]. Typically, it forwards the events to a remote logging
//! service via some framed protocol, which is not part of this crate. A
//! sink that simply turns the events into `tracing` events is provided by
//! [`TracingLogger`].
//!
//! Failing sinks never affect query processing. Their errors are only
//! logged.

use crate::base::iana::{Rcode, Rtype};
use crate::base::name::Dname;
use crate::base::net::Netmask;
use crate::base::record::Record;
use core::fmt;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};
use tracing::info;

//------------ MessageId -----------------------------------------------------

/// A random identifier for an exchange.
///
/// The identifier connects the query event with the response event of the
/// same exchange. It is also used to relate all outgoing queries to the
/// incoming request that caused them.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct MessageId([u8; 16]);

impl MessageId {
    /// Creates an identifier from its octets.
    pub fn from_octets(octets: [u8; 16]) -> Self {
        MessageId(octets)
    }

    /// Returns the octets of the identifier.
    pub fn as_octets(&self) -> &[u8; 16] {
        &self.0
    }
}

//--- Display and Debug

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", octet)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MessageId({})", self)
    }
}

//------------ Protocol ------------------------------------------------------

/// The transport protocol a query was sent over.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Protocol {
    /// Plain UDP.
    Udp,

    /// Plain TCP.
    Tcp,

    /// TLS over TCP.
    Dot,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
            Protocol::Dot => "DoT",
        })
    }
}

//------------ OutgoingQuery -------------------------------------------------

/// The event of a query having been sent.
#[derive(Clone, Debug)]
pub struct OutgoingQuery {
    /// The identifier of this exchange.
    pub message_id: MessageId,

    /// The identifier of the request that caused the query.
    pub initial_request_id: Option<MessageId>,

    /// The transport protocol used.
    pub protocol: Protocol,

    /// The address of the name server.
    pub server: SocketAddr,

    /// The message ID of the query.
    pub id: u16,

    /// The question name.
    pub qname: Dname,

    /// The question type.
    pub qtype: Rtype,

    /// The time the query was sent.
    pub time: SystemTime,

    /// The size of the query message.
    pub bytes: usize,

    /// The client subnet sent along with the query.
    pub subnet: Option<Netmask>,

    /// The name of the name server, if known.
    pub ns_name: Option<Dname>,
}

impl OutgoingQuery {
    /// Returns the address family of the server: 1 for IPv4, 2 for IPv6.
    pub fn family(&self) -> u16 {
        if self.server.is_ipv4() {
            1
        } else {
            2
        }
    }
}

//------------ IncomingResponse ----------------------------------------------

/// The event of a query exchange having ended.
#[derive(Clone, Debug)]
pub struct IncomingResponse {
    /// The identifier of this exchange.
    pub message_id: MessageId,

    /// The identifier of the request that caused the query.
    pub initial_request_id: Option<MessageId>,

    /// The transport protocol used.
    pub protocol: Protocol,

    /// The address of the name server.
    pub server: SocketAddr,

    /// The message ID of the query.
    pub id: u16,

    /// The question name.
    pub qname: Dname,

    /// The question type.
    pub qtype: Rtype,

    /// The time the query was sent.
    pub query_time: SystemTime,

    /// The time it took for the response to arrive.
    pub elapsed: Duration,

    /// The size of the response message.
    ///
    /// This is zero if no response was received.
    pub bytes: usize,

    /// The response code.
    ///
    /// This is `None` if no response was received.
    pub rcode: Option<Rcode>,

    /// The records of the response of the exported types.
    pub records: Vec<Record>,

    /// The client subnet the response is valid for.
    pub subnet: Option<Netmask>,

    /// The name of the name server, if known.
    pub ns_name: Option<Dname>,
}

//------------ SinkError -----------------------------------------------------

/// A sink failed to accept an event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SinkError {
    /// The sink’s queue is full and the event was dropped.
    PipeFull,

    /// The event is too large for the sink.
    TooLarge,

    /// Some other error happened.
    Other(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SinkError::PipeFull => f.write_str("queue full"),
            SinkError::TooLarge => f.write_str("event too large"),
            SinkError::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for SinkError {}

//------------ QueryLogger ---------------------------------------------------

/// A consumer of query and response events.
pub trait QueryLogger: Send + Sync {
    /// Returns whether the sink wants query events.
    fn logs_queries(&self) -> bool {
        true
    }

    /// Returns whether the sink wants response events.
    fn logs_responses(&self) -> bool {
        true
    }

    /// Accepts a query event.
    fn log_query(&self, query: &OutgoingQuery) -> Result<(), SinkError>;

    /// Accepts a response event.
    fn log_response(
        &self,
        response: &IncomingResponse,
    ) -> Result<(), SinkError>;
}

//------------ TracingLogger -------------------------------------------------

/// A sink emitting events through `tracing`.
///
/// Events are emitted at info level with the target
/// `domain_egress::telemetry`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl QueryLogger for TracingLogger {
    fn log_query(&self, query: &OutgoingQuery) -> Result<(), SinkError> {
        info!(
            target: "domain_egress::telemetry",
            message_id = %query.message_id,
            protocol = %query.protocol,
            server = %query.server,
            id = query.id,
            qname = %query.qname,
            qtype = %query.qtype,
            bytes = query.bytes,
            "outgoing query"
        );
        Ok(())
    }

    fn log_response(
        &self,
        response: &IncomingResponse,
    ) -> Result<(), SinkError> {
        match response.rcode {
            Some(rcode) => info!(
                target: "domain_egress::telemetry",
                message_id = %response.message_id,
                protocol = %response.protocol,
                server = %response.server,
                id = response.id,
                qname = %response.qname,
                qtype = %response.qtype,
                bytes = response.bytes,
                rcode = %rcode,
                records = response.records.len(),
                elapsed_us = response.elapsed.as_micros() as u64,
                "incoming response"
            ),
            None => info!(
                target: "domain_egress::telemetry",
                message_id = %response.message_id,
                protocol = %response.protocol,
                server = %response.server,
                id = response.id,
                qname = %response.qname,
                qtype = %response.qtype,
                elapsed_us = response.elapsed.as_micros() as u64,
                "no response"
            ),
        }
        Ok(())
    }
}

//============ Testing =======================================================
