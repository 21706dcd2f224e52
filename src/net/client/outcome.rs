//! The outcome of sending a query.

use crate::base::iana::Rcode;
use crate::base::net::Netmask;
use crate::base::record::Record;
use core::fmt;

//------------ ResultKind ----------------------------------------------------

/// The kind of result of a query exchange.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResultKind {
    /// A response was received.
    ///
    /// This does not mean the response is any good. See
    /// [`Resolution::valid_packet`] and [`Resolution::rcode`].
    Success,

    /// No response was received in time.
    Timeout,

    /// The exchange failed in a way that retrying won’t fix.
    ///
    /// This includes responses that don’t answer the question asked.
    PermanentError,

    /// The local system ran out of resources such as sockets or memory.
    OsLimitError,

    /// A response was received that can’t have come from the server.
    Spoofed,
}

//--- Display

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            ResultKind::Success => "success",
            ResultKind::Timeout => "timeout",
            ResultKind::PermanentError => "permanent error",
            ResultKind::OsLimitError => "OS limit error",
            ResultKind::Spoofed => "spoofed",
        })
    }
}

//------------ Resolution ----------------------------------------------------

/// The result of a single query exchange with a name server.
///
/// # Success despite a broken response
///
/// If the server responded with something that can’t be parsed as a DNS
/// message, the result is **still [`ResultKind::Success`]**: the server did
/// respond, after all. In this case, [`valid_packet`] is `false` and
/// [`rcode`] is set to FORMERR. Callers must check `valid_packet` before
/// relying on any of the response data.
///
/// Similarly, a FORMERR response with an empty question section, as sent
/// by servers that don’t understand EDNS, is a success with a valid
/// packet, leaving it to the caller to retry without EDNS.
///
/// [`valid_packet`]: Self::valid_packet
/// [`rcode`]: Self::rcode
#[derive(Clone, Debug)]
pub struct Resolution {
    /// The kind of result.
    pub kind: ResultKind,

    /// The time between sending the query and receiving the response in
    /// microseconds.
    pub usec: u64,

    /// Whether a well-formed response to the query was received.
    pub valid_packet: bool,

    /// The response code.
    ///
    /// Only the four bits present in the header are considered.
    pub rcode: Rcode,

    /// Whether EDNS was used and the response contained an OPT record.
    pub have_edns: bool,

    /// The AA bit of the response.
    pub aa: bool,

    /// The TC bit of the response.
    pub tc: bool,

    /// The records of the response except the OPT record.
    pub records: Vec<Record>,

    /// The client subnet the answer is valid for.
    ///
    /// This is only present if the query contained a client subnet option
    /// and the server returned one with a non-zero scope prefix length.
    /// It is the query’s subnet shortened to the scope.
    pub subnet: Option<Netmask>,

    /// Whether the response was shared with an identical, earlier query.
    pub chained: bool,
}

impl Resolution {
    /// Creates an empty result of the given kind.
    pub fn new(kind: ResultKind) -> Self {
        Resolution {
            kind,
            usec: 0,
            valid_packet: false,
            rcode: Rcode::NOERROR,
            have_edns: false,
            aa: false,
            tc: false,
            records: Vec::new(),
            subnet: None,
            chained: false,
        }
    }

    /// Returns whether the exchange resulted in a usable response.
    pub fn is_usable(&self) -> bool {
        self.kind == ResultKind::Success && self.valid_packet
    }
}
