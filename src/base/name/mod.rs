//! Domain names.
//!
//! Domain names are a sequence of *labels* which are in turn a sequence of
//! up to 63 octets. While they are limited to a subset of ASCII by
//! convention, all octet values are allowed. In their wire-format
//! representation labels are prefixed with an octet containing the number
//! of octets in the label. The labels in a domain name are nominally
//! arranged backwards. That is, the ‘most significant’ label is the last
//! one. In an *absolute* domain name, this last label is an empty label,
//! called the *root label*. Only absolute names can appear inside DNS
//! messages.
//!
//! In order to save space in DNS messages, a name can end in a pointer to
//! another name stored elsewhere in the message. The query engine never
//! keeps such compressed names around: [`Dname::parse`] follows all
//! pointers and produces a self-contained name.
//!
//! Domain names compare ignoring ASCII case.

pub use self::dname::{Dname, DnameError};
pub use self::label::{Label, LabelType};

mod dname;
mod label;
