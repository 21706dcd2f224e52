//! IP address prefixes.

use core::{cmp, fmt, str};
use std::net::{AddrParseError, IpAddr};

//------------ Netmask -------------------------------------------------------

/// An IP address prefix.
///
/// A netmask is an address of which only the left-most `bits` bits are
/// significant. The constructor clears all other bits, so two netmasks
/// describing the same network always compare equal.
///
/// Netmasks describe the client subnet a query is sent on behalf of and
/// the narrowed scope a server reports back for its answer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Netmask {
    addr: IpAddr,
    bits: u8,
}

impl Netmask {
    /// Creates a new netmask.
    ///
    /// The prefix length is limited to the size of the address family and
    /// all address bits beyond it are set to zero.
    pub fn new(addr: IpAddr, bits: u8) -> Self {
        let bits = cmp::min(bits, max_prefix_len(addr));
        let (addr, _) = addr_apply_mask(addr, bits);
        Netmask { addr, bits }
    }

    /// Creates a netmask covering exactly one host.
    pub fn host(addr: IpAddr) -> Self {
        Netmask::new(addr, max_prefix_len(addr))
    }

    /// Returns the network address.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Returns the prefix length in bits.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// Returns the EDNS address family: 1 for IPv4, 2 for IPv6.
    pub fn family(&self) -> u16 {
        match self.addr {
            IpAddr::V4(_) => 1,
            IpAddr::V6(_) => 2,
        }
    }

    /// Returns a netmask for the same network shortened to `bits` bits.
    ///
    /// If `bits` is not shorter than the current prefix length, the value
    /// is returned unchanged.
    #[must_use]
    pub fn truncate(&self, bits: u8) -> Self {
        if bits >= self.bits {
            *self
        } else {
            Netmask::new(self.addr, bits)
        }
    }

    /// Returns the number of octets needed for the significant bits.
    pub fn prefix_octets(&self) -> usize {
        prefix_bytes(self.bits)
    }
}

//--- FromStr and Display

impl str::FromStr for Netmask {
    type Err = NetmaskError;

    /// Parses `address/bits` or a bare address, the latter as a host mask.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr, bits)) => {
                let addr = IpAddr::from_str(addr)?;
                let bits =
                    u8::from_str(bits).map_err(|_| NetmaskError::BadLength)?;
                if bits > max_prefix_len(addr) {
                    return Err(NetmaskError::BadLength);
                }
                Ok(Netmask::new(addr, bits))
            }
            None => Ok(Netmask::host(IpAddr::from_str(s)?)),
        }
    }
}

impl fmt::Display for Netmask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.bits)
    }
}

//------------ NetmaskError --------------------------------------------------

/// A netmask could not be parsed from a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetmaskError {
    /// The address part was invalid.
    BadAddr(AddrParseError),

    /// The prefix length was invalid or too large for the address.
    BadLength,
}

impl From<AddrParseError> for NetmaskError {
    fn from(err: AddrParseError) -> Self {
        NetmaskError::BadAddr(err)
    }
}

impl fmt::Display for NetmaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NetmaskError::BadAddr(ref err) => err.fmt(f),
            NetmaskError::BadLength => f.write_str("invalid prefix length"),
        }
    }
}

impl std::error::Error for NetmaskError {}

//------------ Helper Functions ----------------------------------------------

/// Returns the number of bytes needed for a prefix of a given length
pub(crate) fn prefix_bytes(bits: u8) -> usize {
    (usize::from(bits) + 7) / 8
}

/// Returns the longest prefix length for the address family of `addr`.
pub(crate) fn max_prefix_len(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Only keeps the left-most `mask` bits and zeros out the rest.
///
/// Returns whether the buffer has been modified.
fn apply_bit_mask(buf: &mut [u8], mask: usize) -> bool {
    let mut modified = false;

    // skip full bytes covered by prefix length
    let mut p = mask / 8;
    if p >= buf.len() {
        return modified;
    }

    // clear extra bits in a byte
    let bits = mask % 8;
    if bits != 0 {
        if buf[p].trailing_zeros() < (8 - bits) as u32 {
            buf[p] &= 0xff << (8 - bits);
            modified = true;
        }
        p += 1;
    }

    // clear the rest bytes
    for octet in &mut buf[p..] {
        if *octet != 0 {
            *octet = 0;
            modified = true;
        }
    }

    modified
}

/// Zeros out unused bits in a address prefix of the given length
///
/// Returns the new address and whether it was changed.
pub(crate) fn addr_apply_mask(addr: IpAddr, len: u8) -> (IpAddr, bool) {
    match addr {
        IpAddr::V4(a) => {
            let mut array = a.octets();
            let m = apply_bit_mask(&mut array, len as usize);
            (array.into(), m)
        }
        IpAddr::V6(a) => {
            let mut array = a.octets();
            let m = apply_bit_mask(&mut array, len as usize);
            (array.into(), m)
        }
    }
}

//============ Testing =======================================================
