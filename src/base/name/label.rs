//! Domain name labels.

use crate::base::wire::{FormError, ParseError};
use core::fmt;
use octseq::parse::Parser;

/// The maximum length of the content of a normal label.
pub const MAX_LABEL_LEN: usize = 63;

//------------ Label ---------------------------------------------------------

/// The content of a single normal label.
///
/// This is an unsized wrapper around the label’s octets without the length
/// octet. Labels are obtained by iterating over a [`Dname`].
///
/// [`Dname`]: super::Dname
#[derive(Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct Label([u8]);

impl Label {
    pub(super) fn from_slice_unchecked(slice: &[u8]) -> &Self {
        // SAFETY: Label has repr(transparent) over [u8].
        unsafe { &*(slice as *const [u8] as *const Label) }
    }

    /// Returns the content of the label.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the label’s content.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Compares two labels ignoring ASCII case.
    pub fn eq_ignore_case(&self, other: &Label) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

//--- Display

impl fmt::Display for Label {
    /// Formats the label in presentation format.
    ///
    /// Dots and backslashes are escaped with a backslash, octets outside of
    /// printable ASCII use the `\DDD` decimal escape.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for &ch in self.as_slice() {
            if ch == b' ' || ch == b'.' || ch == b'\\' {
                write!(f, "\\{}", ch as char)?;
            } else if !(0x20..0x7F).contains(&ch) {
                write!(f, "\\{:03}", ch)?;
            } else {
                write!(f, "{}", ch as char)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Label({})", self)
    }
}

//------------ LabelType -----------------------------------------------------

/// The type of a label header octet as found in wire-format data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LabelType {
    /// A normal label with its size in octets.
    Normal(usize),

    /// A compressed label with the position of where to continue.
    Compressed(usize),
}

impl LabelType {
    /// Parses the label type from the start of `parser`.
    pub fn parse(parser: &mut Parser<[u8]>) -> Result<Self, ParseError> {
        let ltype = parser.parse_u8()?;
        match ltype {
            0..=0x3F => Ok(LabelType::Normal(ltype.into())),
            0xC0..=0xFF => {
                let res = usize::from(parser.parse_u8()?);
                let res = res | ((usize::from(ltype) & 0x3F) << 8);
                Ok(LabelType::Compressed(res))
            }
            _ => Err(ParseError::Form(FormError::new("invalid label type"))),
        }
    }
}
