//! Sending and receiving DNS messages.
//!
//! Currently, the module only provides the [`client`] sub-module with the
//! outgoing side of a resolver: sending a query to a single name server and
//! receiving the response to it.

pub mod client;
