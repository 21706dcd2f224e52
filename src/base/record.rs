//! Resource records.
//!
//! This module defines [`Record`], a resource record as decoded from a
//! received message, and [`Section`], the four parts of a message a
//! record can appear in.

use super::iana::{Class, Rtype};
use super::name::Dname;
use bytes::Bytes;
use core::fmt;

//------------ Section -------------------------------------------------------

/// The section of a DNS message.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Section {
    /// The question section.
    Question,

    /// The answer section.
    Answer,

    /// The authority section.
    Authority,

    /// The additional section.
    Additional,
}

impl Section {
    /// Returns the section following `self`, if there is one.
    pub fn next_section(self) -> Option<Self> {
        match self {
            Section::Question => Some(Section::Answer),
            Section::Answer => Some(Section::Authority),
            Section::Authority => Some(Section::Additional),
            Section::Additional => None,
        }
    }
}

//------------ Record --------------------------------------------------------

/// A DNS resource record.
///
/// The record data is kept in its uncompressed wire format. Domain names
/// embedded in the record data of the well-known types that allow
/// compression have been expanded during parsing, so the data stays
/// meaningful without the message it came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    owner: Dname,
    rtype: Rtype,
    class: Class,
    ttl: u32,
    data: Bytes,
    section: Section,
}

impl Record {
    /// Creates a new record from its parts.
    pub fn new(
        owner: Dname,
        rtype: Rtype,
        class: Class,
        ttl: u32,
        data: Bytes,
        section: Section,
    ) -> Self {
        Record {
            owner,
            rtype,
            class,
            ttl,
            data,
            section,
        }
    }

    /// Returns the owner domain name.
    pub fn owner(&self) -> &Dname {
        &self.owner
    }

    /// Returns the record type.
    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    /// Returns the class of the record.
    pub fn class(&self) -> Class {
        self.class
    }

    /// Returns the TTL of the record.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the record data in wire format.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the section the record was found in.
    pub fn section(&self) -> Section {
        self.section
    }
}

//--- Display

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t\\# {}",
            self.owner,
            self.ttl,
            self.class,
            self.rtype,
            self.data.len()
        )?;
        for octet in self.data.iter() {
            write!(f, " {:02x}", octet)?;
        }
        Ok(())
    }
}
