//! EDNS option for carrying client subnet information.
//!
//! The option in this module – [`ClientSubnet`] – can be used by a resolver
//! to include information about the network a query originated from in its
//! own query to an authoritative server so it can tailor its response for
//! that network.
//!
//! The option is defined in [RFC 7871](https://tools.ietf.org/html/rfc7871)
//! which also includes some guidance on its use.

use super::EdnsOption;
use crate::base::iana::OptionCode;
use crate::base::net::{max_prefix_len, Netmask};
use crate::base::wire::{FormError, ParseError};
use core::fmt;
use octseq::parse::Parser;
use std::net::IpAddr;

//------------ ClientSubnet --------------------------------------------------

/// Option data for the client subnet option.
///
/// The option identifies the network through an address prefix. It uses
/// two prefix lengths: The _source prefix length_ is the number of bits
/// provided by the client when describing its network and the _scope
/// prefix length_ is the number of bits that the server considered when
/// providing the answer. The scope prefix length is zero in a query.
///
/// The source is kept as a [`Netmask`], so its address never has bits set
/// beyond the source prefix length.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ClientSubnet {
    /// The source network.
    source: Netmask,

    /// The scope prefix length.
    scope_prefix_len: u8,
}

impl ClientSubnet {
    /// Creates a new client subnet value.
    ///
    /// The scope prefix length is limited to the size of the address
    /// family.
    pub fn new(source: Netmask, scope_prefix_len: u8) -> Self {
        let max = max_prefix_len(source.addr());
        ClientSubnet {
            source,
            scope_prefix_len: scope_prefix_len.min(max),
        }
    }

    /// Creates the value a query carries for `source`.
    pub fn for_query(source: Netmask) -> Self {
        Self::new(source, 0)
    }

    /// Returns the source network.
    pub fn source(&self) -> Netmask {
        self.source
    }

    /// Returns the source prefix length.
    pub fn source_prefix_len(&self) -> u8 {
        self.source.bits()
    }

    /// Returns the scope prefix length.
    pub fn scope_prefix_len(&self) -> u8 {
        self.scope_prefix_len
    }

    /// Returns the address.
    pub fn addr(&self) -> IpAddr {
        self.source.addr()
    }

    /// Parses a value from the option data.
    ///
    /// Address octets beyond the source prefix length are accepted and
    /// their bits cleared, but there may not be more address octets than
    /// the address family has.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        const ERR_ADDR_LEN: &str = "invalid address length in client \
                                    subnet option";

        let mut parser = Parser::from_ref(data);
        let family = parser.parse_u16_be()?;
        let source_prefix_len = parser.parse_u8()?;
        let scope_prefix_len = parser.parse_u8()?;
        let addr_len = parser.remaining();

        let addr = match family {
            1 => {
                let mut buf = [0; 4];
                if addr_len > buf.len() || source_prefix_len > 32 {
                    return Err(ParseError::form_error(ERR_ADDR_LEN));
                }
                parser.parse_buf(&mut buf[..addr_len])?;
                IpAddr::from(buf)
            }
            2 => {
                let mut buf = [0; 16];
                if addr_len > buf.len() || source_prefix_len > 128 {
                    return Err(ParseError::form_error(ERR_ADDR_LEN));
                }
                parser.parse_buf(&mut buf[..addr_len])?;
                IpAddr::from(buf)
            }
            _ => {
                return Err(FormError::new(
                    "invalid client subnet address family",
                )
                .into())
            }
        };

        Ok(ClientSubnet::new(
            Netmask::new(addr, source_prefix_len),
            scope_prefix_len,
        ))
    }

    /// Returns the option data in wire format.
    ///
    /// The address is truncated to the octets covered by the source
    /// prefix length.
    pub fn compose_data(&self) -> Vec<u8> {
        let prefix_bytes = self.source.prefix_octets();
        let mut data = Vec::with_capacity(4 + prefix_bytes);
        data.extend_from_slice(&self.source.family().to_be_bytes());
        data.push(self.source.bits());
        data.push(self.scope_prefix_len);
        match self.source.addr() {
            IpAddr::V4(addr) => {
                data.extend_from_slice(&addr.octets()[..prefix_bytes])
            }
            IpAddr::V6(addr) => {
                data.extend_from_slice(&addr.octets()[..prefix_bytes])
            }
        }
        data
    }

    /// Returns the value as an EDNS option.
    pub fn to_option(&self) -> EdnsOption {
        EdnsOption::new(OptionCode::CLIENT_SUBNET, self.compose_data())
    }
}

//--- Display

impl fmt::Display for ClientSubnet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.scope_prefix_len != 0 {
            write!(f, "{}/{}", self.source, self.scope_prefix_len)
        } else {
            write!(f, "{}", self.source)
        }
    }
}

//============ Testing =======================================================
