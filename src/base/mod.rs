//! Basics.
//!
//! This module provides the types for DNS data that the query engine
//! produces and consumes.
//!
//!
//! ## Parsing and Composing Messages
//!
//! We use the term *parsing* for extracting data from a wire-format
//! representation and *composing* for producing such a representation.
//!
//! Composing happens through a [`MessageWriter`] which owns the buffer of
//! the message it builds and compresses domain names as it goes. Parsing
//! happens through [`Message`] which decodes a complete received message
//! in one go, resolving all compressed names, so that the records it
//! produces remain usable after the message buffer is gone.
//!
//!
//! # Types for DNS Data
//!
//! The types are arranged in submodules. These are:
//!
//! * [header] for the header of DNS messages,
//! * [iana] for the IANA-registered parameters,
//! * [name] for domain names,
//! * [net] for IP prefixes,
//! * [opt] for EDNS and the options the engine sends and checks,
//! * [question] for questions, and
//! * [record] for DNS resource records.

pub use self::header::Header;
pub use self::iana::{Class, Opcode, OptionCode, Rcode, Rtype};
pub use self::message::Message;
pub use self::message_builder::MessageWriter;
pub use self::name::Dname;
pub use self::net::Netmask;
pub use self::question::Question;
pub use self::record::{Record, Section};
pub use self::wire::{FormError, ParseError};

pub mod header;
pub mod iana;
pub mod message;
pub mod message_builder;
pub mod name;
pub mod net;
pub mod opt;
pub mod question;
pub mod record;
pub mod wire;
