//! Uncompressed, absolute domain names.

use super::label::{Label, LabelType, MAX_LABEL_LEN};
use crate::base::wire::ParseError;
use core::{fmt, hash, str};
use octseq::parse::Parser;

//------------ Dname ---------------------------------------------------------

/// An uncompressed, absolute domain name.
///
/// The name is kept in its wire-format representation: a sequence of
/// length-prefixed labels ending in the root label. The type guarantees
/// that the sequence is well-formed and at most [`Dname::MAX_LEN`] octets
/// long.
///
/// Comparison and hashing ignore ASCII case, as required for domain names.
/// Use [`as_slice`][Self::as_slice] for an exact comparison.
#[derive(Clone)]
pub struct Dname {
    octets: Vec<u8>,
}

impl Dname {
    /// The maximum length of a domain name in wire format.
    pub const MAX_LEN: usize = 255;

    /// Creates a domain name representing the root.
    pub fn root() -> Self {
        Dname { octets: vec![0] }
    }

    /// Creates a domain name from a wire-format octets slice.
    ///
    /// The slice must contain exactly one uncompressed absolute name.
    pub fn from_slice(slice: &[u8]) -> Result<Self, DnameError> {
        let mut pos = 0;
        loop {
            let len = match slice.get(pos) {
                Some(&len) => len,
                None => return Err(DnameError::ShortInput),
            };
            match len {
                0 => break,
                1..=0x3F => {}
                0xC0..=0xFF => return Err(DnameError::CompressedName),
                _ => return Err(DnameError::BadLabel),
            }
            pos += usize::from(len) + 1;
            if pos >= Self::MAX_LEN {
                return Err(DnameError::LongName);
            }
        }
        if pos + 1 != slice.len() {
            return Err(DnameError::TrailingData);
        }
        Ok(Dname {
            octets: slice.into(),
        })
    }

    /// Creates a domain name from a sequence of label contents.
    ///
    /// The root label is added at the end and must not be part of `labels`.
    pub fn from_labels<'a>(
        labels: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<Self, DnameError> {
        let mut octets = Vec::new();
        for label in labels {
            push_label(&mut octets, label)?;
        }
        octets.push(0);
        Ok(Dname { octets })
    }

    /// Parses a possibly compressed name from the start of `parser`.
    ///
    /// All compression pointers are followed. Pointers must point backwards
    /// from the position they are found at, which rules out loops. The
    /// parser is left right behind the name as it appears at its original
    /// position.
    pub fn parse(parser: &mut Parser<[u8]>) -> Result<Self, ParseError> {
        let mut octets = Vec::new();

        // Phase One: No compression pointers have been found yet.
        let mut ptr = loop {
            match LabelType::parse(parser)? {
                LabelType::Normal(0) => {
                    octets.push(0);
                    return Ok(Dname { octets });
                }
                LabelType::Normal(label_len) => {
                    append_label(&mut octets, parser, label_len)?;
                }
                LabelType::Compressed(ptr) => break ptr,
            }
        };

        // Phase Two: Compression has occured.
        //
        // We work on a copy of the parser so we can jump around. The actual
        // parser already is at the end of the name.
        let mut parser = *parser;
        loop {
            // The pointer must point to before its own two octets.
            if ptr + 2 >= parser.pos() {
                return Err(ParseError::form_error("compression loop"));
            }
            parser.seek(ptr)?;
            loop {
                match LabelType::parse(&mut parser)? {
                    LabelType::Normal(0) => {
                        octets.push(0);
                        return Ok(Dname { octets });
                    }
                    LabelType::Normal(label_len) => {
                        append_label(&mut octets, &mut parser, label_len)?;
                    }
                    LabelType::Compressed(new_ptr) => {
                        ptr = new_ptr;
                        break;
                    }
                }
            }
        }
    }

    /// Returns the wire-format representation of the name.
    pub fn as_slice(&self) -> &[u8] {
        &self.octets
    }

    /// Returns the length of the wire-format representation.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.octets.len()
    }

    /// Returns whether the name is the root name.
    pub fn is_root(&self) -> bool {
        self.octets.len() == 1
    }

    /// Returns an iterator over the normal labels of the name.
    ///
    /// The root label is not included.
    pub fn iter(&self) -> DnameIter {
        DnameIter {
            octets: &self.octets,
            pos: 0,
        }
    }

    /// Returns a copy of the name with all ASCII letters lowercased.
    #[must_use]
    pub fn to_lowercase(&self) -> Self {
        Dname {
            octets: self.octets.to_ascii_lowercase(),
        }
    }
}

fn push_label(octets: &mut Vec<u8>, label: &[u8]) -> Result<(), DnameError> {
    if label.is_empty() {
        return Err(DnameError::EmptyLabel);
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(DnameError::LongLabel);
    }
    if octets.len() + label.len() + 2 > Dname::MAX_LEN {
        return Err(DnameError::LongName);
    }
    octets.push(label.len() as u8);
    octets.extend_from_slice(label);
    Ok(())
}

fn append_label(
    octets: &mut Vec<u8>,
    parser: &mut Parser<[u8]>,
    label_len: usize,
) -> Result<(), ParseError> {
    if octets.len() + label_len + 2 > Dname::MAX_LEN {
        return Err(ParseError::form_error("long domain name"));
    }
    octets.push(label_len as u8);
    octets.extend_from_slice(parser.peek(label_len)?);
    parser.advance(label_len)?;
    Ok(())
}

//--- FromStr

impl str::FromStr for Dname {
    type Err = DnameError;

    /// Parses a name in presentation format.
    ///
    /// A name without a trailing dot is taken to be relative to the root.
    /// Escapes of the form `\X` and `\DDD` are recognized.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DnameError::EmptyString);
        }
        if s == "." {
            return Ok(Dname::root());
        }
        let mut octets = Vec::new();
        let mut label = Vec::new();
        let mut chars = s.bytes();
        while let Some(ch) = chars.next() {
            match ch {
                b'.' => {
                    push_label(&mut octets, &label)?;
                    label.clear();
                }
                b'\\' => {
                    let ch = chars.next().ok_or(DnameError::BadEscape)?;
                    if ch.is_ascii_digit() {
                        let d2 = chars.next().ok_or(DnameError::BadEscape)?;
                        let d3 = chars.next().ok_or(DnameError::BadEscape)?;
                        if !d2.is_ascii_digit() || !d3.is_ascii_digit() {
                            return Err(DnameError::BadEscape);
                        }
                        let value = u16::from(ch - b'0') * 100
                            + u16::from(d2 - b'0') * 10
                            + u16::from(d3 - b'0');
                        let value = u8::try_from(value)
                            .map_err(|_| DnameError::BadEscape)?;
                        label.push(value);
                    } else {
                        label.push(ch);
                    }
                }
                _ => label.push(ch),
            }
        }
        if !label.is_empty() {
            push_label(&mut octets, &label)?;
        }
        octets.push(0);
        Ok(Dname { octets })
    }
}

//--- PartialEq, Eq, and Hash

impl PartialEq for Dname {
    fn eq(&self, other: &Self) -> bool {
        // Length octets are at most 63 and thus never ASCII letters.
        self.octets.eq_ignore_ascii_case(&other.octets)
    }
}

impl Eq for Dname {}

impl hash::Hash for Dname {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        for ch in &self.octets {
            ch.to_ascii_lowercase().hash(state)
        }
    }
}

//--- Display and Debug

impl fmt::Display for Dname {
    /// Formats the domain name.
    ///
    /// This produces the absolute name including the trailing dot.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.iter() {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Dname {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Dname({})", self)
    }
}

//------------ DnameIter -----------------------------------------------------

/// An iterator over the normal labels of a [`Dname`].
#[derive(Clone, Debug)]
pub struct DnameIter<'a> {
    octets: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for DnameIter<'a> {
    type Item = &'a Label;

    fn next(&mut self) -> Option<Self::Item> {
        let len = usize::from(*self.octets.get(self.pos)?);
        if len == 0 {
            return None;
        }
        let start = self.pos + 1;
        self.pos = start + len;
        self.octets
            .get(start..self.pos)
            .map(Label::from_slice_unchecked)
    }
}

//------------ DnameError ----------------------------------------------------

/// A domain name could not be created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DnameError {
    /// The string was empty.
    EmptyString,

    /// An escape sequence was malformed.
    BadEscape,

    /// A label other than the root label was empty.
    EmptyLabel,

    /// A label was longer than 63 octets.
    LongLabel,

    /// The name was longer than 255 octets.
    LongName,

    /// The wire data contained a compression pointer.
    CompressedName,

    /// The wire data contained an unknown label type.
    BadLabel,

    /// There was data after the root label.
    TrailingData,

    /// The wire data ended before the root label.
    ShortInput,
}

impl fmt::Display for DnameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            DnameError::EmptyString => "empty string",
            DnameError::BadEscape => "illegal escape sequence",
            DnameError::EmptyLabel => "an empty label was encountered",
            DnameError::LongLabel => "label too long",
            DnameError::LongName => "long domain name",
            DnameError::CompressedName => "compressed domain name",
            DnameError::BadLabel => "invalid label type",
            DnameError::TrailingData => "trailing data",
            DnameError::ShortInput => "unexpected end of input",
        })
    }
}

impl std::error::Error for DnameError {}

//============ Testing =======================================================
