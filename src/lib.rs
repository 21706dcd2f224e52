//! The outgoing query engine of a recursive DNS resolver.
//!
//! This crate contains the part of a recursive resolver that talks to a
//! single remote name server: it builds a query message in wire format,
//! sends it over UDP, TCP or DNS-over-TLS, waits for the answer and checks
//! that the answer actually belongs to the query before handing it back.
//!
//! The crate is organized in two parts:
//!
//! * [base] contains the DNS data types: names, IANA parameters, the message
//!   header, EDNS options, the compressing [message writer] and a decoder
//!   for received messages.
//! * [net] contains the networking side: the transports, the TCP
//!   connection pool, and the [dispatcher] that performs a single
//!   query/response exchange and reports its [outcome].
//!
//! The iterative resolution algorithm, caching and DNSSEC validation live
//! above this crate. Everything the dispatcher needs from its environment
//! (transports, random numbers, telemetry sinks) is injected, so the whole
//! exchange can be driven by fakes in tests.
//!
//! # Reference of feature flags
//!
//! * `tls`: enables DNS-over-TLS through `tokio-rustls` (enabled by
//!   default).
//! * `serde`: enables serialization of the configuration.
//! * `logging`: provides [`logging::init_logging`][logging] for binaries
//!   that want the crate's `tracing` events printed.
//!
//! [message writer]: base::message_builder::MessageWriter
//! [dispatcher]: net::client::dispatch::Dispatcher
//! [outcome]: net::client::outcome::Resolution
#![cfg_attr(feature = "logging", doc = "[logging]: crate::logging")]
#![cfg_attr(not(feature = "logging"), doc = "[logging]: #")]
#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod base;
pub mod net;

#[cfg(feature = "logging")]
pub mod logging;
