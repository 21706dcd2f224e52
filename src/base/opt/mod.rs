//! Record data for OPT records.
//!
//! OPT records are meta records used by EDNS to convey additional data
//! about clients, servers, and the query being performed. Because these
//! records are fundamental for modern DNS operations, they are here instead
//! of in the `rdata` module and the types defined for operating on them
//! differ from how other record types are handled.
//!
//! The query engine only needs a small part of EDNS: it sends an OPT record
//! with its buffer size, the DO flag, and possibly the client subnet and
//! padding options, and it looks at the client subnet option echoed back
//! by the server. Options are therefore kept as raw [`EdnsOption`] values
//! and only the two options the engine acts upon get their own types in
//! the submodules.
//!
//! The OPT record is defined in [RFC 6891].
//!
//! [RFC 6891]: https://tools.ietf.org/html/rfc6891

pub use self::padding::{block_padding_len, padding_option, BLOCK_SIZE};
pub use self::subnet::ClientSubnet;

pub mod padding;
pub mod subnet;

use super::iana::{Class, OptionCode};
use super::wire::ParseError;
use core::fmt;
use octseq::parse::Parser;

/// The DO bit in the EDNS flags.
///
/// Setting it signals that the sender is able to handle DNSSEC records.
pub const DNSSEC_OK: u16 = 0x8000;

//------------ EdnsOption ----------------------------------------------------

/// A single EDNS option: an option code and its raw data.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct EdnsOption {
    code: OptionCode,
    data: Vec<u8>,
}

impl EdnsOption {
    /// Creates a new option.
    ///
    /// The data must not be longer than 65,535 octets. Data longer than
    /// that cannot be represented in an OPT record.
    pub fn new(code: OptionCode, data: Vec<u8>) -> Self {
        EdnsOption { code, data }
    }

    /// Returns the option code.
    pub fn code(&self) -> OptionCode {
        self.code
    }

    /// Returns the option data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the length of the option in wire format.
    ///
    /// This is the four octets of code and length plus the data.
    pub fn compose_len(&self) -> usize {
        4 + self.data.len()
    }
}

impl fmt::Debug for EdnsOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EdnsOption")
            .field("code", &self.code)
            .field("len", &self.data.len())
            .finish()
    }
}

//------------ OptRecord -----------------------------------------------------

/// The content of an OPT record found in a message.
///
/// An OPT record abuses the class field for the requestor’s UDP payload
/// size and the TTL field for the upper bits of the extended rcode, the
/// EDNS version, and the flags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OptRecord {
    udp_payload_size: u16,
    ext_rcode: u8,
    version: u8,
    flags: u16,
    options: Vec<EdnsOption>,
}

impl OptRecord {
    /// Creates the OPT record content from the fields of the record.
    ///
    /// Returns an error if the record data is not a well-formed sequence
    /// of options.
    pub fn from_record(
        class: Class,
        ttl: u32,
        rdata: &[u8],
    ) -> Result<Self, ParseError> {
        let mut parser = Parser::from_ref(rdata);
        let mut options = Vec::new();
        while parser.remaining() > 0 {
            let code = OptionCode::from_int(parser.parse_u16_be()?);
            let len = usize::from(parser.parse_u16_be()?);
            let data = parser.peek(len)?.to_vec();
            parser.advance(len)?;
            options.push(EdnsOption::new(code, data));
        }
        Ok(OptRecord {
            udp_payload_size: class.to_int(),
            ext_rcode: (ttl >> 24) as u8,
            version: (ttl >> 16) as u8,
            flags: ttl as u16,
            options,
        })
    }

    /// Returns the UDP payload size advertised by the sender.
    pub fn udp_payload_size(&self) -> u16 {
        self.udp_payload_size
    }

    /// Returns the upper eight bits of the extended rcode.
    pub fn ext_rcode(&self) -> u8 {
        self.ext_rcode
    }

    /// Returns the EDNS version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the EDNS flags.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Returns whether the DO bit is set.
    pub fn dnssec_ok(&self) -> bool {
        self.flags & DNSSEC_OK != 0
    }

    /// Returns the options in the order they appeared.
    pub fn options(&self) -> &[EdnsOption] {
        &self.options
    }

    /// Returns the first option with the given code.
    pub fn first_option(&self, code: OptionCode) -> Option<&EdnsOption> {
        self.options.iter().find(|opt| opt.code() == code)
    }

    /// Returns the client subnet option if present and well-formed.
    ///
    /// Only the first client subnet option is considered. If it cannot be
    /// parsed, the method returns `None` even if there are more.
    pub fn client_subnet(&self) -> Option<ClientSubnet> {
        self.first_option(OptionCode::CLIENT_SUBNET)
            .and_then(|opt| ClientSubnet::parse(opt.data()).ok())
    }
}

//============ Testing =======================================================
