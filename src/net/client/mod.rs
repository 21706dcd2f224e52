//! Sending queries and receiving responses.
//!
//! This module provides everything necessary to send a single query to a
//! single remote name server and to check that what comes back is an
//! answer to it. The central type is the [`Dispatcher`][dispatch::Dispatcher]
//! which is given a [`Request`][dispatch::Request] and returns a
//! [`Resolution`][outcome::Resolution].
//!
//! A query exchange consists of these steps:
//! 1) Building the query message, possibly with EDNS, client subnet, and
//!    padding options,
//! 2) Sending it over UDP or over a TCP connection, the latter possibly
//!    protected by TLS and possibly reused from the
//!    [connection pool][pool::ConnectionPool],
//! 3) Waiting for the reply, and
//! 4) Validating the reply against the query.
//!
//! The network access for the second and third step happens through the
//! traits in [protocol]. The crate provides implementations using real
//! sockets, [`UdpTransport`][protocol::UdpTransport] and
//! [`TcpConnector`][protocol::TcpConnector], but any other implementation
//! can be used instead, for instance in tests.
//!
//! # Example
//!
//! ```no_run
//! # use std::str::FromStr;
//! # use domain_egress::base::{Dname, Rtype};
//! # use domain_egress::net::client::config::Config;
//! # use domain_egress::net::client::dispatch::{Dispatcher, Request};
//! # use domain_egress::net::client::outcome::ResultKind;
//! # async fn _test() {
//! let dispatcher = Dispatcher::from_config(Config::default());
//! let request = Request::new(
//!     "192.0.2.53:53".parse().unwrap(),
//!     Dname::from_str("example.com").unwrap(),
//!     Rtype::AAAA,
//! );
//! let res = dispatcher.resolve(&request).await;
//! if res.kind == ResultKind::Success && res.valid_packet {
//!     for record in &res.records {
//!         println!("{} {}", record.owner(), record.rtype());
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod outcome;
pub mod pool;
pub mod protocol;
pub mod random;
pub mod telemetry;
