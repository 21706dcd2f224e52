//! The header of a DNS message.
//!
//! Each DNS message starts with a twelve octet long header section
//! containing some general information related to the message as well as
//! the number of records in each of the four sections that follow the
//! header. Its content and format are defined in section 4.1.1 of
//! [RFC 1035].
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

use super::iana::{Opcode, Rcode};
use super::record::Section;
use core::fmt;

/// The length of the header section in octets.
pub const HEADER_LEN: usize = 12;

//------------ Header --------------------------------------------------------

/// Access to the header of a DNS message.
///
/// The type wraps an octets sequence that starts with the twelve header
/// octets, typically an entire message, and reads and writes the header
/// fields directly in their network byte order representation. The data is
/// layed out like this:
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|Z |AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ANCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    NSCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// Immutable access is available for any `Octs: AsRef<[u8]>`, mutable
/// access for `Octs: AsMut<[u8]>`. An owned copy is a `Header<[u8; 12]>`.
///
/// The basic structure and most of the fields are defined in [RFC 1035],
/// except for the AD and CD flags, which are defined in [RFC 4035].
///
/// [RFC 1035]: https://tools.ietf.org/html/rfc1035
/// [RFC 4035]: https://tools.ietf.org/html/rfc4035
#[derive(Clone, Copy)]
pub struct Header<Octs> {
    octets: Octs,
}

impl Header<[u8; HEADER_LEN]> {
    /// Creates a new, all-zero header.
    pub fn new() -> Self {
        Header {
            octets: [0; HEADER_LEN],
        }
    }
}

impl Default for Header<[u8; HEADER_LEN]> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Octs: AsRef<[u8]>> Header<Octs> {
    /// Creates a header for the message starting at `octets`.
    ///
    /// Returns an error if there are fewer than twelve octets.
    pub fn for_message(octets: Octs) -> Result<Self, ShortHeader> {
        if octets.as_ref().len() < HEADER_LEN {
            Err(ShortHeader(()))
        } else {
            Ok(Header { octets })
        }
    }

    /// Creates a header for `octets` without checking the length.
    ///
    /// The caller must make sure there are at least twelve octets or the
    /// field accessors will panic.
    pub(crate) fn for_message_unchecked(octets: Octs) -> Self {
        Header { octets }
    }

    /// Returns an owned copy of the header.
    pub fn to_owned_header(&self) -> Header<[u8; HEADER_LEN]> {
        let mut octets = [0; HEADER_LEN];
        octets.copy_from_slice(self.as_slice());
        Header { octets }
    }

    /// Returns the twelve header octets.
    pub fn as_slice(&self) -> &[u8] {
        &self.octets.as_ref()[..HEADER_LEN]
    }

    fn u16_at(&self, pos: usize) -> u16 {
        let octets = self.octets.as_ref();
        u16::from_be_bytes([octets[pos], octets[pos + 1]])
    }

    fn bit(&self, pos: usize, mask: u8) -> bool {
        self.octets.as_ref()[pos] & mask != 0
    }
}

/// # Field Access
///
impl<Octs: AsRef<[u8]>> Header<Octs> {
    /// Returns the value of the ID field.
    pub fn id(&self) -> u16 {
        self.u16_at(0)
    }

    /// Returns the value of the QR bit.
    ///
    /// The QR bit specifies whether a message is a query (`false`) or a
    /// response (`true`).
    pub fn qr(&self) -> bool {
        self.bit(2, 0x80)
    }

    /// Returns the value of the Opcode field.
    pub fn opcode(&self) -> Opcode {
        Opcode::from_int((self.octets.as_ref()[2] >> 3) & 0x0F)
    }

    /// Returns the value of the AA bit.
    ///
    /// Using this bit, a name server generating a response states whether
    /// it is authoritative for the requested domain name.
    pub fn aa(&self) -> bool {
        self.bit(2, 0x04)
    }

    /// Returns the value of the TC bit.
    ///
    /// The *truncation* bit is set if there was more data available than
    /// fit into the message.
    pub fn tc(&self) -> bool {
        self.bit(2, 0x02)
    }

    /// Returns the value of the RD bit.
    ///
    /// The *recursion desired* bit asks the receiving server to resolve
    /// the question recursively.
    pub fn rd(&self) -> bool {
        self.bit(2, 0x01)
    }

    /// Returns the value of the RA bit.
    pub fn ra(&self) -> bool {
        self.bit(3, 0x80)
    }

    /// Returns the value of the reserved Z bit.
    pub fn z(&self) -> bool {
        self.bit(3, 0x40)
    }

    /// Returns the value of the AD bit.
    pub fn ad(&self) -> bool {
        self.bit(3, 0x20)
    }

    /// Returns the value of the CD bit.
    ///
    /// The *checking disabled* bit asks a validating server to not perform
    /// DNSSEC validation for the query.
    pub fn cd(&self) -> bool {
        self.bit(3, 0x10)
    }

    /// Returns the value of the RCODE field.
    pub fn rcode(&self) -> Rcode {
        Rcode::from_int(self.octets.as_ref()[3] & 0x0F)
    }

    /// Returns the value of the QDCOUNT field.
    pub fn qdcount(&self) -> u16 {
        self.u16_at(4)
    }

    /// Returns the value of the ANCOUNT field.
    pub fn ancount(&self) -> u16 {
        self.u16_at(6)
    }

    /// Returns the value of the NSCOUNT field.
    pub fn nscount(&self) -> u16 {
        self.u16_at(8)
    }

    /// Returns the value of the ARCOUNT field.
    pub fn arcount(&self) -> u16 {
        self.u16_at(10)
    }

    /// Returns the record count for the given section.
    pub fn count(&self, section: Section) -> u16 {
        self.u16_at(count_pos(section))
    }
}

impl<Octs: AsRef<[u8]> + AsMut<[u8]>> Header<Octs> {
    fn set_u16_at(&mut self, pos: usize, value: u16) {
        self.octets.as_mut()[pos..pos + 2]
            .copy_from_slice(&value.to_be_bytes());
    }

    fn set_bit(&mut self, pos: usize, mask: u8, set: bool) {
        let octet = &mut self.octets.as_mut()[pos];
        if set {
            *octet |= mask
        } else {
            *octet &= !mask
        }
    }

    /// Sets the value of the ID field.
    pub fn set_id(&mut self, value: u16) {
        self.set_u16_at(0, value)
    }

    /// Sets the value of the QR bit.
    pub fn set_qr(&mut self, set: bool) {
        self.set_bit(2, 0x80, set)
    }

    /// Sets the value of the opcode field.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        let octet = &mut self.octets.as_mut()[2];
        *octet = *octet & 0x87 | ((opcode.to_int() & 0x0F) << 3);
    }

    /// Sets the value of the AA bit.
    pub fn set_aa(&mut self, set: bool) {
        self.set_bit(2, 0x04, set)
    }

    /// Sets the value of the TC bit.
    pub fn set_tc(&mut self, set: bool) {
        self.set_bit(2, 0x02, set)
    }

    /// Sets the value of the RD bit.
    pub fn set_rd(&mut self, set: bool) {
        self.set_bit(2, 0x01, set)
    }

    /// Sets the value of the RA bit.
    pub fn set_ra(&mut self, set: bool) {
        self.set_bit(3, 0x80, set)
    }

    /// Sets the value of the Z bit.
    pub fn set_z(&mut self, set: bool) {
        self.set_bit(3, 0x40, set)
    }

    /// Sets the value of the AD bit.
    pub fn set_ad(&mut self, set: bool) {
        self.set_bit(3, 0x20, set)
    }

    /// Sets the value of the CD bit.
    pub fn set_cd(&mut self, set: bool) {
        self.set_bit(3, 0x10, set)
    }

    /// Sets the value of the RCODE field.
    ///
    /// Only the lower four bits of the code fit into the header.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        let octet = &mut self.octets.as_mut()[3];
        *octet = *octet & 0xF0 | rcode.header_bits();
    }

    /// Sets the record count for the given section.
    pub fn set_count(&mut self, section: Section, value: u16) {
        self.set_u16_at(count_pos(section), value)
    }
}

fn count_pos(section: Section) -> usize {
    match section {
        Section::Question => 4,
        Section::Answer => 6,
        Section::Authority => 8,
        Section::Additional => 10,
    }
}

//--- Debug

impl<Octs: AsRef<[u8]>> fmt::Debug for Header<Octs> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Header")
            .field("id", &self.id())
            .field("qr", &self.qr())
            .field("opcode", &self.opcode())
            .field("aa", &self.aa())
            .field("tc", &self.tc())
            .field("rd", &self.rd())
            .field("ra", &self.ra())
            .field("ad", &self.ad())
            .field("cd", &self.cd())
            .field("rcode", &self.rcode())
            .field("qdcount", &self.qdcount())
            .field("ancount", &self.ancount())
            .field("nscount", &self.nscount())
            .field("arcount", &self.arcount())
            .finish()
    }
}

//------------ ShortHeader ---------------------------------------------------

/// The message was too short to contain a header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ShortHeader(());

impl fmt::Display for ShortHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("short message header")
    }
}

impl std::error::Error for ShortHeader {}

//============ Testing =======================================================
