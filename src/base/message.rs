//! Accessing existing DNS messages.
//!
//! This module defines [`Message`], a received DNS message decoded in one
//! go. Decoding resolves all compressed domain names: in owner names,
//! questions, and in the record data of the standard record types that may
//! contain compressed names. The resulting records therefore don’t depend
//! on the message buffer anymore and can be handed on freely.
//!
//! The OPT record of a message is not treated as a regular record. It is
//! available through [`Message::opt`] instead and does not appear among the
//! [records][Message::records].
//!
//! For the cheap checks necessary when matching a datagram to a query,
//! [`peek_question`] parses only the header and first question.

use super::header::{Header, HEADER_LEN};
use super::iana::{Class, Rtype};
use super::name::Dname;
use super::opt::OptRecord;
use super::question::Question;
use super::record::{Record, Section};
use super::wire::ParseError;
use bytes::Bytes;
use core::fmt;
use octseq::parse::Parser;

//------------ Message -------------------------------------------------------

/// A decoded DNS message.
///
/// Only the first question of the question section is kept. All other
/// questions, if any, are parsed and discarded. Data following the last
/// record announced by the header is ignored.
#[derive(Clone)]
pub struct Message {
    octets: Bytes,
    header: Header<[u8; HEADER_LEN]>,
    question: Option<Question>,
    records: Vec<Record>,
    opt: Option<OptRecord>,
}

/// # Creation and Conversion
///
impl Message {
    /// Decodes a message from a bytes value.
    ///
    /// Fails if the message is shorter than announced by its header or if
    /// any of its parts is malformed.
    pub fn from_octets(octets: Bytes) -> Result<Self, ParseError> {
        let mut parser = Parser::from_ref(&octets[..]);
        let header = Header::for_message(&octets[..])
            .map_err(|_| ParseError::ShortInput)?
            .to_owned_header();
        parser.advance(HEADER_LEN)?;

        let mut question = None;
        for _ in 0..header.qdcount() {
            let parsed = Question::parse(&mut parser)?;
            if question.is_none() {
                question = Some(parsed)
            }
        }

        let mut records = Vec::new();
        let mut opt = None;
        let mut section = Section::Question;
        while let Some(next) = section.next_section() {
            section = next;
            for _ in 0..header.count(section) {
                let raw = RawRecord::parse(&mut parser)?;
                if raw.rtype == Rtype::OPT {
                    if section == Section::Additional
                        && raw.owner.is_root()
                        && opt.is_none()
                    {
                        let rdata = &octets[raw.data_start..raw.data_end];
                        opt = OptRecord::from_record(raw.class, raw.ttl, rdata)
                            .ok();
                    }
                    continue;
                }
                let data = raw.expand_data(&octets)?;
                records.push(Record::new(
                    raw.owner, raw.rtype, raw.class, raw.ttl, data, section,
                ));
            }
        }

        Ok(Message {
            header,
            question,
            records,
            opt,
            octets,
        })
    }

    /// Decodes a message from a slice, copying its content.
    pub fn from_slice(slice: &[u8]) -> Result<Self, ParseError> {
        Self::from_octets(Bytes::copy_from_slice(slice))
    }

    /// Returns the message’s octets.
    pub fn as_slice(&self) -> &[u8] {
        self.octets.as_ref()
    }

    /// Returns the message’s octets as a bytes value.
    pub fn as_octets(&self) -> &Bytes {
        &self.octets
    }

    /// Converts the message into its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// # Header and Sections
///
impl Message {
    /// Returns the message header.
    pub fn header(&self) -> Header<[u8; HEADER_LEN]> {
        self.header
    }

    /// Returns the first question of the message, if there is one.
    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    /// Returns all records of the answer, authority, and additional
    /// sections.
    ///
    /// The records appear in message order. The OPT record is not
    /// included.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns an iterator over the records of one section.
    pub fn section(
        &self,
        section: Section,
    ) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().filter(move |rec| rec.section() == section)
    }

    /// Returns the OPT record of the message, if there is a valid one.
    ///
    /// Only the first OPT record in the additional section is considered.
    pub fn opt(&self) -> Option<&OptRecord> {
        self.opt.as_ref()
    }
}

//--- Debug

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Message")
            .field("header", &self.header)
            .field("question", &self.question)
            .field("records", &self.records)
            .field("opt", &self.opt)
            .finish()
    }
}

//------------ peek_question -------------------------------------------------

/// Parses the header and first question of a message.
///
/// Returns `Ok(None)` as the question if the question count is zero.
pub fn peek_question(
    msg: &[u8],
) -> Result<(Header<[u8; HEADER_LEN]>, Option<Question>), ParseError> {
    let header = Header::for_message(msg)
        .map_err(|_| ParseError::ShortInput)?
        .to_owned_header();
    if header.qdcount() == 0 {
        return Ok((header, None));
    }
    let mut parser = Parser::from_ref(msg);
    parser.advance(HEADER_LEN)?;
    let question = Question::parse(&mut parser)?;
    Ok((header, Some(question)))
}

//------------ RawRecord -----------------------------------------------------

/// The parts of a record before its data has been looked at.
struct RawRecord {
    owner: Dname,
    rtype: Rtype,
    class: Class,
    ttl: u32,
    data_start: usize,
    data_end: usize,
}

impl RawRecord {
    fn parse(parser: &mut Parser<[u8]>) -> Result<Self, ParseError> {
        let owner = Dname::parse(parser)?;
        let rtype = Rtype::from_int(parser.parse_u16_be()?);
        let class = Class::from_int(parser.parse_u16_be()?);
        let ttl = parser.parse_u32_be()?;
        let len = usize::from(parser.parse_u16_be()?);
        let data_start = parser.pos();
        parser.advance(len)?;
        Ok(RawRecord {
            owner,
            rtype,
            class,
            ttl,
            data_start,
            data_end: data_start + len,
        })
    }

    /// Returns the record data with all compressed names expanded.
    ///
    /// Data of types that can’t contain compressed names is returned as
    /// is without copying.
    fn expand_data(&self, octets: &Bytes) -> Result<Bytes, ParseError> {
        // Each item is either a domain name or a number of fixed octets.
        let layout: &[Item] = match self.rtype {
            Rtype::NS | Rtype::CNAME | Rtype::PTR | Rtype::DNAME => {
                &[Item::Name]
            }
            Rtype::MX => &[Item::Fixed(2), Item::Name],
            Rtype::SRV => &[Item::Fixed(6), Item::Name],
            Rtype::SOA => &[Item::Name, Item::Name, Item::Fixed(20)],
            _ => return Ok(octets.slice(self.data_start..self.data_end)),
        };

        let mut parser = Parser::from_ref(&octets[..]);
        parser.seek(self.data_start)?;
        let mut data = Vec::with_capacity(self.data_end - self.data_start);
        for item in layout {
            match *item {
                Item::Name => {
                    let name = Dname::parse(&mut parser)?;
                    data.extend_from_slice(name.as_slice());
                }
                Item::Fixed(len) => {
                    data.extend_from_slice(parser.peek(len)?);
                    parser.advance(len)?;
                }
            }
        }
        if parser.pos() != self.data_end {
            return Err(ParseError::form_error("record data length mismatch"));
        }
        Ok(data.into())
    }
}

#[derive(Clone, Copy)]
enum Item {
    Name,
    Fixed(usize),
}

//============ Testing =======================================================
