//! Building a new DNS message.
//!
//! A message is built through a [`MessageWriter`]. It starts out with a
//! header and a single question and then accepts resource records one at a
//! time. Each record is opened with [`start_record`], which writes the
//! owner name and the fixed part of the record, after which the record
//! data is appended through the various `push_*` methods. The record is
//! completed by [`commit`] which fills in the record data length and
//! increases the record count of the section in the header. Opening the
//! next record commits the previous one.
//!
//! A record that turns out not to fit can be taken back with
//! [`rollback`]. All records can be dropped with [`truncate`], leaving
//! only the header and question.
//!
//! # Name Compression
//!
//! The writer always compresses domain names where allowed: It remembers
//! the positions of names it has written and, when writing a new name,
//! looks for the longest suffix of the new name that is already present
//! in the message. It then only writes the labels before that suffix and
//! a pointer to its earlier occurence. Comparison is ASCII-case-insensitive.
//! Compression pointers have 14 bits, so only names starting at an offset
//! below 16384 can be pointed to.
//!
//! Compression can be switched off per record and per name. Writing in
//! [canonical form][MessageWriter::set_canonic] or in [lower
//! case][MessageWriter::set_lowercase] switches it off entirely.
//!
//! # Example
//!
//! ```
//! use std::str::FromStr;
//! use domain_egress::base::{
//!     Class, Dname, MessageWriter, Opcode, Rtype, Section
//! };
//!
//! let qname = Dname::from_str("www.example.com").unwrap();
//! let mut msg = MessageWriter::new(&qname, Rtype::A, Class::IN, Opcode::QUERY);
//! msg.header_mut().set_rd(true);
//!
//! let owner = Dname::from_str("mail.example.com").unwrap();
//! msg.start_record(&owner, Rtype::A, 3600, Class::IN, Section::Answer, true);
//! msg.push_slice(&[192, 0, 2, 1]);
//! msg.commit();
//!
//! assert_eq!(msg.header().ancount(), 1);
//! let message = msg.finish();
//! assert_eq!(message.len(), 54);
//! ```
//!
//! [`start_record`]: MessageWriter::start_record
//! [`commit`]: MessageWriter::commit
//! [`rollback`]: MessageWriter::rollback
//! [`truncate`]: MessageWriter::truncate

use super::header::{Header, HEADER_LEN};
use super::iana::{Class, Opcode, Rcode, Rtype};
use super::name::Dname;
use super::opt::EdnsOption;
use super::record::Section;
use smallvec::SmallVec;

/// The largest offset a compression pointer can point to plus one.
pub const MAX_COMPRESSION_OFFSET: usize = 16384;

/// The most labels a name may have to take part in compression.
const MAX_COMPRESSION_LABELS: usize = 34;

//------------ MessageWriter -------------------------------------------------

/// A builder for a DNS message in wire format.
///
/// The writer owns the buffer of the message. Its first twelve octets are
/// always a valid header, followed by exactly one question. See the
/// [module documentation][self] for an overview of the building process.
///
/// None of the operations limit the size of the message. It is up to the
/// caller to keep it within what the transport allows. Record data longer
/// than 65535 octets cannot be represented and will have its length
/// truncated.
#[derive(Clone, Debug)]
pub struct MessageWriter {
    /// The message as built so far.
    content: Vec<u8>,

    /// The name of the question.
    qname: Dname,

    /// The positions of all names that can be pointed to.
    ///
    /// Positions are kept in the order the names were written and all of
    /// them are below `MAX_COMPRESSION_OFFSET` and the buffer length.
    name_positions: Vec<u16>,

    /// The length of the message with only the header and question.
    truncate_marker: usize,

    /// The length of the message before the open record.
    rollback_marker: usize,

    /// The start of the record data of the open record.
    ///
    /// This is zero if there is no open record.
    sor: usize,

    /// The section the open record goes into.
    record_section: Section,

    /// Whether the open record allows compression.
    record_compress: bool,

    /// Whether names are written in canonical form.
    canonic: bool,

    /// Whether names are written in lowercase.
    lowercase: bool,
}

impl MessageWriter {
    /// Creates a new message with a single question.
    ///
    /// The header is all zeros except for the opcode and a question count
    /// of one. The question name is written without compression.
    pub fn new(
        qname: &Dname,
        qtype: Rtype,
        qclass: Class,
        opcode: Opcode,
    ) -> Self {
        Self::from_vec(Vec::new(), qname, qtype, qclass, opcode)
    }

    /// Creates a new message reusing the allocation of `buf`.
    ///
    /// Any content of `buf` is discarded.
    pub fn from_vec(
        mut buf: Vec<u8>,
        qname: &Dname,
        qtype: Rtype,
        qclass: Class,
        opcode: Opcode,
    ) -> Self {
        buf.clear();
        buf.reserve(HEADER_LEN + qname.len() + 4);
        buf.resize(HEADER_LEN, 0);
        let mut res = MessageWriter {
            content: buf,
            qname: qname.clone(),
            name_positions: Vec::with_capacity(16),
            truncate_marker: 0,
            rollback_marker: 0,
            sor: 0,
            record_section: Section::Question,
            record_compress: true,
            canonic: false,
            lowercase: false,
        };
        {
            let mut header = res.header_mut();
            header.set_opcode(opcode);
            header.set_count(Section::Question, 1);
        }
        res.compose_name(qname, false);
        res.push_u16(qtype.to_int());
        res.push_u16(qclass.to_int());
        res.truncate_marker = res.content.len();
        res
    }

    /// Returns the header of the message.
    pub fn header(&self) -> Header<&[u8]> {
        Header::for_message_unchecked(self.content.as_slice())
    }

    /// Returns a mutable header of the message.
    ///
    /// Changing the section counts through the header is possible but
    /// they will be increased again as records are committed.
    pub fn header_mut(&mut self) -> Header<&mut [u8]> {
        Header::for_message_unchecked(self.content.as_mut_slice())
    }

    /// Returns the message as built so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.content
    }

    /// Returns the current length of the message.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns whether the message is empty.
    ///
    /// It never is, since the header is always present.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Commits any open record and returns the message.
    pub fn finish(mut self) -> Vec<u8> {
        self.commit();
        self.content
    }

    /// Switches writing names in canonical form on or off.
    ///
    /// In canonical form, names are never compressed.
    pub fn set_canonic(&mut self, canonic: bool) {
        self.canonic = canonic
    }

    /// Switches writing names in lowercase on or off.
    ///
    /// Lowercase names are never compressed either.
    pub fn set_lowercase(&mut self, lowercase: bool) {
        self.lowercase = lowercase
    }
}

/// # Records
///
impl MessageWriter {
    /// Starts a new record.
    ///
    /// Commits the currently open record, if any, and writes the owner
    /// name, type, class, and TTL of the new record followed by a
    /// placeholder for the record data length. The record ends up in
    /// `section` once committed.
    ///
    /// If `compress` is `false`, neither the owner nor any names in the
    /// record data will be compressed.
    pub fn start_record(
        &mut self,
        name: &Dname,
        rtype: Rtype,
        ttl: u32,
        class: Class,
        section: Section,
        compress: bool,
    ) {
        self.commit();
        self.record_compress = compress;
        self.rollback_marker = self.content.len();

        if compress
            && !self.canonic
            && !self.lowercase
            && !name.is_root()
            && *name == self.qname
        {
            // Points to the question name.
            self.content.extend_from_slice(&[0xC0, 0x0C]);
        } else {
            self.compose_name(name, compress);
        }
        self.push_u16(rtype.to_int());
        self.push_u16(class.to_int());
        self.push_u32(ttl);
        self.push_u16(0);
        self.record_section = section;
        self.sor = self.content.len();
    }

    /// Completes the open record.
    ///
    /// Fills in the record data length and increases the count of the
    /// record’s section. Does nothing if there is no open record.
    pub fn commit(&mut self) {
        if self.sor == 0 {
            return;
        }
        let rlen = (self.content.len() - self.sor) as u16;
        self.content[self.sor - 2..self.sor]
            .copy_from_slice(&rlen.to_be_bytes());
        self.sor = 0;
        let section = self.record_section;
        let mut header = self.header_mut();
        let count = header.count(section).wrapping_add(1);
        header.set_count(section, count);
    }

    /// Removes the open record.
    ///
    /// The message is returned to the state it had before the record was
    /// started. Does nothing useful if the record had been committed
    /// already.
    pub fn rollback(&mut self) {
        self.cut_back(self.rollback_marker);
    }

    /// Removes all records.
    ///
    /// Only the header and the question remain and all record counts are
    /// set to zero. An open record is discarded.
    pub fn truncate(&mut self) {
        self.cut_back(self.truncate_marker);
        let mut header = self.header_mut();
        header.set_count(Section::Answer, 0);
        header.set_count(Section::Authority, 0);
        header.set_count(Section::Additional, 0);
    }

    fn cut_back(&mut self, len: usize) {
        self.content.truncate(len);
        self.sor = 0;
        self.name_positions.retain(|&pos| usize::from(pos) < len);
    }

    /// Appends an OPT record to the additional section.
    ///
    /// The record’s class carries `udp_size` and its TTL the upper eight
    /// bits of the twelve bit `ext_rcode`, the EDNS `version`, and the
    /// `flags`. If `ext_rcode` is not zero, its lower four bits replace
    /// the rcode in the header. The record is committed.
    pub fn add_opt(
        &mut self,
        udp_size: u16,
        ext_rcode: u16,
        flags: u16,
        options: &[EdnsOption],
        version: u8,
    ) {
        let ttl = u32::from((ext_rcode >> 4) as u8) << 24
            | u32::from(version) << 16
            | u32::from(flags);
        if ext_rcode != 0 {
            self.header_mut()
                .set_rcode(Rcode::from_int((ext_rcode & 0x0F) as u8));
        }
        self.start_record(
            &Dname::root(),
            Rtype::OPT,
            ttl,
            Class::from_int(udp_size),
            Section::Additional,
            false,
        );
        for option in options {
            self.push_u16(option.code().to_int());
            self.push_u16(option.data().len() as u16);
            self.push_slice(option.data());
        }
        self.commit();
    }

    /// Returns the size the message would have after adding an OPT record.
    ///
    /// This is the current length plus the fixed eleven octets of an OPT
    /// record plus four octets and the data of each option.
    pub fn size_with_opts(&self, options: &[EdnsOption]) -> usize {
        self.content.len()
            + 11
            + options.iter().map(EdnsOption::compose_len).sum::<usize>()
    }

    /// Returns the record data written for the open record so far.
    ///
    /// Returns an empty slice if there is no open record.
    pub fn record_payload(&self) -> &[u8] {
        if self.sor == 0 {
            &[]
        } else {
            &self.content[self.sor..]
        }
    }

    /// Returns the complete wire format of the open record so far.
    ///
    /// The record data length is only filled in upon committing, so it is
    /// still zero in the returned data.
    pub fn record_wire(&self) -> &[u8] {
        if self.sor == 0 {
            &[]
        } else {
            &self.content[self.rollback_marker..]
        }
    }
}

/// # Composing Data
///
impl MessageWriter {
    /// Appends an octet.
    pub fn push_u8(&mut self, value: u8) {
        self.content.push(value)
    }

    /// Appends a 16 bit integer in network byte order.
    pub fn push_u16(&mut self, value: u16) {
        self.content.extend_from_slice(&value.to_be_bytes())
    }

    /// Appends a 32 bit integer in network byte order.
    pub fn push_u32(&mut self, value: u32) {
        self.content.extend_from_slice(&value.to_be_bytes())
    }

    /// Appends the lower 48 bits of `value` in network byte order.
    pub fn push_u48(&mut self, value: u64) {
        self.content.extend_from_slice(&value.to_be_bytes()[2..])
    }

    /// Appends a slice of octets as is.
    pub fn push_slice(&mut self, data: &[u8]) {
        self.content.extend_from_slice(data)
    }

    /// Appends text as a sequence of character strings.
    ///
    /// The text is split into strings of at most 255 octets, each
    /// preceded by its length. Empty text results in a single empty
    /// character string.
    pub fn push_text(&mut self, text: &[u8]) {
        if text.is_empty() {
            self.content.push(0);
            return;
        }
        for chunk in text.chunks(255) {
            self.content.push(chunk.len() as u8);
            self.content.extend_from_slice(chunk);
        }
    }

    /// Appends a domain name.
    ///
    /// The name is compressed if `compress` is `true`, the open record
    /// allows compression, and neither canonical nor lowercase mode is
    /// active.
    pub fn compose_name(&mut self, name: &Dname, compress: bool) {
        let compress = compress
            && self.record_compress
            && !self.canonic
            && !self.lowercase;

        if name.is_root() {
            self.content.push(0);
            return;
        }

        let pos = self.content.len();
        let found = if compress { self.lookup_name(name) } else { None };
        match found {
            Some((ptr, matchlen)) => {
                let raw = name.as_slice();
                if pos < MAX_COMPRESSION_OFFSET && matchlen != raw.len() {
                    self.name_positions.push(pos as u16);
                }
                self.content
                    .extend_from_slice(&raw[..raw.len() - matchlen]);
                self.push_u16(ptr | 0xC000);
            }
            None => {
                if pos < MAX_COMPRESSION_OFFSET {
                    self.name_positions.push(pos as u16);
                }
                self.content.extend_from_slice(name.as_slice());
                if self.lowercase {
                    // Length octets are below 64 and never letters.
                    self.content[pos..].make_ascii_lowercase();
                }
            }
        }
    }

    /// Finds the longest suffix of `name` present in the message.
    ///
    /// Returns the position of the suffix and its length in octets,
    /// including the root label. If several earlier names provide a
    /// suffix of the same length, the earliest one wins. A complete
    /// match ends the search right away.
    fn lookup_name(&self, name: &Dname) -> Option<(u16, usize)> {
        let raw = name.as_slice();

        let mut nvect = SmallVec::<[usize; MAX_COMPRESSION_LABELS]>::new();
        let mut pos = 0;
        while raw[pos] != 0 {
            if nvect.len() == MAX_COMPRESSION_LABELS {
                return None;
            }
            nvect.push(pos);
            pos += usize::from(raw[pos]) + 1;
        }

        let mut best: Option<(u16, usize)> = None;
        let mut pvect = SmallVec::<[usize; MAX_COMPRESSION_LABELS]>::new();
        for &start in &self.name_positions {
            if !self.label_positions(usize::from(start), &mut pvect) {
                continue;
            }

            let mut matchlen = 1;
            let mut last = None;
            for (&npos, &ppos) in nvect.iter().rev().zip(pvect.iter().rev()) {
                let nlen = usize::from(raw[npos]);
                let plen = usize::from(self.content[ppos]);
                if nlen != plen {
                    break;
                }
                let plabel = match self.content.get(ppos + 1..ppos + 1 + plen)
                {
                    Some(label) => label,
                    None => break,
                };
                if !raw[npos + 1..npos + 1 + nlen].eq_ignore_ascii_case(plabel)
                {
                    break;
                }
                matchlen += nlen + 1;
                last = Some(ppos as u16);
                if matchlen == raw.len() {
                    return Some((ppos as u16, matchlen));
                }
            }
            if let Some(last) = last {
                if best.map(|(_, len)| len < matchlen).unwrap_or(true) {
                    best = Some((last, matchlen));
                }
            }
        }
        best
    }

    /// Collects the label positions of the name starting at `pos`.
    ///
    /// Compression pointers are followed as long as they point backwards.
    /// Returns `false` if the name can’t be used for compression: if it
    /// has too many labels, contains labels that can’t be pointed to, or
    /// is malformed.
    fn label_positions(
        &self,
        mut pos: usize,
        pvect: &mut SmallVec<[usize; MAX_COMPRESSION_LABELS]>,
    ) -> bool {
        pvect.clear();
        loop {
            let len = match self.content.get(pos) {
                Some(&len) => len,
                None => return false,
            };
            match len {
                0 => return true,
                1..=0x3F => {
                    if pos >= MAX_COMPRESSION_OFFSET
                        || pvect.len() == MAX_COMPRESSION_LABELS
                    {
                        return false;
                    }
                    pvect.push(pos);
                    pos += usize::from(len) + 1;
                }
                0xC0..=0xFF => {
                    let low = match self.content.get(pos + 1) {
                        Some(&low) => low,
                        None => return false,
                    };
                    let target = usize::from(len & 0x3F) << 8 | usize::from(low);
                    if target >= pos {
                        return false;
                    }
                    pos = target;
                }
                _ => return false,
            }
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::opt::{padding_option, DNSSEC_OK};
    use core::str::FromStr;
    use octseq::parse::Parser;

    fn name(s: &str) -> Dname {
        Dname::from_str(s).unwrap()
    }

    fn writer() -> MessageWriter {
        MessageWriter::new(
            &name("www.example.com"),
            Rtype::A,
            Class::IN,
            Opcode::QUERY,
        )
    }

    #[test]
    fn new_message() {
        let msg = MessageWriter::new(
            &name("www.example.com"),
            Rtype::AAAA,
            Class::IN,
            Opcode::NOTIFY,
        );
        assert_eq!(
            msg.as_slice(),
            b"\x00\x00\x20\x00\x00\x01\x00\x00\x00\x00\x00\x00\
              \x03www\x07example\x03com\x00\x00\x1c\x00\x01"
        );
        assert_eq!(msg.header().opcode(), Opcode::NOTIFY);
        assert_eq!(msg.name_positions, [12]);
    }

    #[test]
    fn from_vec_discards_content() {
        let msg = MessageWriter::from_vec(
            vec![0xFF; 100],
            &name("example.com"),
            Rtype::NS,
            Class::IN,
            Opcode::QUERY,
        );
        assert_eq!(msg.len(), 12 + 13 + 4);
        assert_eq!(msg.header().id(), 0);
    }

    #[test]
    fn compress_suffix() {
        let mut msg = writer();
        msg.start_record(
            &name("mail.example.com"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        assert_eq!(&msg.as_slice()[33..40], b"\x04mail\xc0\x10");
        msg.push_slice(&[192, 0, 2, 1]);
        msg.commit();
        assert_eq!(msg.len(), 54);
        assert_eq!(msg.header().ancount(), 1);
        assert_eq!(&msg.as_slice()[48..50], b"\x00\x04");
        assert_eq!(msg.name_positions, [12, 33]);
    }

    #[test]
    fn compress_ignores_case() {
        let mut msg = writer();
        msg.start_record(
            &name("MAIL.Example.COM"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        assert_eq!(&msg.as_slice()[33..40], b"\x04MAIL\xc0\x10");
    }

    #[test]
    fn compress_follows_pointers() {
        let mut msg = writer();
        msg.start_record(
            &name("mail.example.com"),
            Rtype::MX,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_u16(10);
        msg.compose_name(&name("smtp.mail.example.com"), true);
        msg.commit();
        // mail.example.com sits at 33, its record data starts at 50.
        assert_eq!(&msg.as_slice()[52..], b"\x04smtp\xc0\x21");

        let msg = msg.finish();
        let mut parser = Parser::from_ref(&msg[..]);
        parser.advance(52).unwrap();
        assert_eq!(
            Dname::parse(&mut parser).unwrap(),
            name("smtp.mail.example.com")
        );
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn full_match_points_at_suffix() {
        let mut msg = writer();
        msg.start_record(
            &name("example.com"),
            Rtype::NS,
            300,
            Class::IN,
            Section::Authority,
            true,
        );
        let len = msg.len();
        assert_eq!(&msg.as_slice()[33..35], b"\xc0\x10");
        msg.compose_name(&name("www.example.com"), true);
        assert_eq!(&msg.as_slice()[len..], b"\xc0\x0c");
        // Full matches are not recorded.
        assert_eq!(msg.name_positions, [12]);
    }

    #[test]
    fn question_name_shortcut() {
        let mut msg = writer();
        msg.start_record(
            &name("WWW.example.com"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        assert_eq!(&msg.as_slice()[33..35], b"\xc0\x0c");
        msg.start_record(
            &name("www.example.com"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            false,
        );
        assert_eq!(
            &msg.as_slice()[45..62],
            b"\x03www\x07example\x03com\x00"
        );
        // Root owners are never replaced by a pointer.
        let mut msg = MessageWriter::new(
            &Dname::root(),
            Rtype::NS,
            Class::IN,
            Opcode::QUERY,
        );
        msg.start_record(
            &Dname::root(),
            Rtype::NS,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        assert_eq!(msg.as_slice()[17], 0);
    }

    #[test]
    fn no_compression_for_record() {
        let mut msg = writer();
        msg.start_record(
            &name("mail.example.com"),
            Rtype::MX,
            300,
            Class::IN,
            Section::Answer,
            false,
        );
        msg.push_u16(10);
        let len = msg.len();
        msg.compose_name(&name("example.com"), true);
        assert_eq!(&msg.as_slice()[len..], b"\x07example\x03com\x00");
    }

    #[test]
    fn canonic_and_lowercase() {
        let mut msg = writer();
        msg.set_canonic(true);
        msg.start_record(
            &name("Mail.Example.com"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        assert_eq!(
            &msg.as_slice()[33..51],
            b"\x04Mail\x07Example\x03com\x00"
        );
        msg.set_canonic(false);
        msg.set_lowercase(true);
        let len = msg.len();
        msg.start_record(
            &name("WWW.Example.COM"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        assert_eq!(
            &msg.as_slice()[len..len + 17],
            b"\x03www\x07example\x03com\x00"
        );
    }

    #[test]
    fn counts_follow_commits() {
        let mut msg = writer();
        for section in [
            Section::Answer,
            Section::Answer,
            Section::Authority,
            Section::Additional,
        ] {
            msg.start_record(
                &name("example.com"),
                Rtype::A,
                0,
                Class::IN,
                section,
                true,
            );
            msg.push_u32(0);
        }
        // The last record is still open.
        assert_eq!(msg.header().ancount(), 2);
        assert_eq!(msg.header().nscount(), 1);
        assert_eq!(msg.header().arcount(), 0);
        msg.commit();
        msg.commit();
        assert_eq!(msg.header().arcount(), 1);
    }

    #[test]
    fn rollback() {
        let mut msg = writer();
        msg.start_record(
            &name("mail.example.com"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_u32(0);
        msg.commit();
        let len = msg.len();

        msg.start_record(
            &name("ftp.example.org"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_u32(0);
        assert_eq!(msg.name_positions.len(), 3);
        msg.rollback();
        assert_eq!(msg.len(), len);
        assert_eq!(msg.header().ancount(), 1);
        assert_eq!(msg.name_positions.len(), 2);
        msg.commit();
        assert_eq!(msg.header().ancount(), 1);
        assert!(msg.record_payload().is_empty());
    }

    #[test]
    fn truncate() {
        let mut msg = writer();
        msg.start_record(
            &name("mail.example.com"),
            Rtype::A,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_u32(0);
        msg.add_opt(1232, 0, 0, &[], 0);
        msg.start_record(
            &name("example.com"),
            Rtype::NS,
            300,
            Class::IN,
            Section::Authority,
            true,
        );
        msg.truncate();
        let first = msg.as_slice().to_vec();
        assert_eq!(first.len(), 33);
        assert_eq!(msg.header().ancount(), 0);
        assert_eq!(msg.header().nscount(), 0);
        assert_eq!(msg.header().arcount(), 0);
        assert_eq!(msg.header().qdcount(), 1);
        assert_eq!(msg.name_positions, [12]);

        // The open record was dropped, too.
        msg.commit();
        assert_eq!(msg.header().nscount(), 0);

        msg.truncate();
        assert_eq!(msg.as_slice(), first.as_slice());
    }

    #[test]
    fn add_opt() {
        let mut msg = writer();
        let options = [padding_option(3)];
        let expected = msg.size_with_opts(&options);
        msg.add_opt(1232, 0, DNSSEC_OK, &options, 0);
        assert_eq!(msg.len(), expected);
        assert_eq!(msg.header().arcount(), 1);
        assert_eq!(
            &msg.as_slice()[33..],
            b"\x00\x00\x29\x04\xd0\x00\x00\x80\x00\x00\x07\
              \x00\x0c\x00\x03\x00\x00\x00"
        );
    }

    #[test]
    fn add_opt_ext_rcode() {
        let mut msg = writer();
        msg.add_opt(512, 0x17, 0, &[], 0);
        assert_eq!(msg.header().rcode(), Rcode::from_int(7));
        assert_eq!(&msg.as_slice()[38..42], b"\x01\x00\x00\x00");

        let mut msg = writer();
        msg.header_mut().set_rcode(Rcode::REFUSED);
        msg.add_opt(512, 0, 0, &[], 1);
        assert_eq!(msg.header().rcode(), Rcode::REFUSED);
        assert_eq!(&msg.as_slice()[38..42], b"\x00\x01\x00\x00");
    }

    #[test]
    fn push_primitives() {
        let mut msg = writer();
        msg.start_record(
            &name("www.example.com"),
            Rtype::TXT,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_u8(1);
        msg.push_u48(0x0102_0304_0506);
        msg.push_text(b"");
        msg.push_text(&[b'x'; 300]);
        let payload = msg.record_payload();
        assert_eq!(&payload[..8], b"\x01\x01\x02\x03\x04\x05\x06\x00");
        assert_eq!(payload[8], 255);
        assert_eq!(payload[8 + 256], 45);
        assert_eq!(payload.len(), 8 + 256 + 46);
        assert_eq!(&msg.record_wire()[..4], b"\xc0\x0c\x00\x10");
        assert_eq!(msg.record_wire().len(), payload.len() + 12);
    }

    #[test]
    fn positions_below_pointer_limit() {
        let mut msg = writer();
        msg.start_record(
            &name("www.example.com"),
            Rtype::TXT,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_slice(&[0; 20000]);
        msg.start_record(
            &name("host.example.net"),
            Rtype::A,
            300,
            Class::IN,
            Section::Additional,
            true,
        );
        msg.push_u32(0);
        let len = msg.len();
        msg.start_record(
            &name("host.example.net"),
            Rtype::A,
            300,
            Class::IN,
            Section::Additional,
            true,
        );
        assert_eq!(
            &msg.as_slice()[len..len + 18],
            name("host.example.net").as_slice()
        );
        msg.push_u32(0);
        let len = msg.len();
        msg.compose_name(&name("ns.example.com"), true);
        assert_eq!(&msg.as_slice()[len..], b"\x02ns\xc0\x10");
        assert!(msg
            .name_positions
            .iter()
            .all(|&pos| usize::from(pos) < MAX_COMPRESSION_OFFSET));
    }

    #[test]
    fn names_crossing_pointer_limit() {
        let mut msg = writer();
        msg.start_record(
            &name("www.example.com"),
            Rtype::TXT,
            300,
            Class::IN,
            Section::Answer,
            true,
        );
        msg.push_slice(&[0; 16335]);
        assert_eq!(msg.len(), 16380);
        msg.compose_name(&name("org.example.org"), true);
        assert_eq!(msg.name_positions, [12, 16380]);
        let len = msg.len();
        msg.compose_name(&name("org"), true);
        assert_eq!(&msg.as_slice()[len..], b"\x03org\x00");
    }

    #[test]
    fn long_names_are_not_compressed() {
        let long = (0..40).map(|_| "a").collect::<Vec<_>>().join(".");
        let long = name(&format!("{}.example.com", long));
        let mut msg = writer();
        let len = msg.len();
        msg.compose_name(&long, true);
        assert_eq!(&msg.as_slice()[len..], long.as_slice());
    }
}
