//! A single question in a DNS message.

use super::iana::{Class, Rtype};
use super::name::Dname;
use super::wire::ParseError;
use core::fmt;
use octseq::parse::Parser;

//------------ Question ------------------------------------------------------

/// A question in a DNS message.
///
/// In DNS, a question describes what is requested in a query. It consists
/// of three elements: a domain name, a record type, and a class.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Question {
    qname: Dname,
    qtype: Rtype,
    qclass: Class,
}

impl Question {
    /// Creates a new question from its three components.
    pub fn new(qname: Dname, qtype: Rtype, qclass: Class) -> Self {
        Question {
            qname,
            qtype,
            qclass,
        }
    }

    /// Creates a new question in class IN.
    pub fn new_in(qname: Dname, qtype: Rtype) -> Self {
        Self::new(qname, qtype, Class::IN)
    }

    /// Parses a question from the start of `parser`.
    pub fn parse(parser: &mut Parser<[u8]>) -> Result<Self, ParseError> {
        Ok(Question {
            qname: Dname::parse(parser)?,
            qtype: Rtype::from_int(parser.parse_u16_be()?),
            qclass: Class::from_int(parser.parse_u16_be()?),
        })
    }

    /// Returns a reference to the domain name of the question.
    pub fn qname(&self) -> &Dname {
        &self.qname
    }

    /// Returns the record type of the question.
    pub fn qtype(&self) -> Rtype {
        self.qtype
    }

    /// Returns the class of the question.
    pub fn qclass(&self) -> Class {
        self.qclass
    }
}

//--- Display

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.qname, self.qclass, self.qtype)
    }
}
