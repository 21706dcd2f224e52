//! EDNS padding of outgoing queries.
//!
//! The padding option allows to increase the size of a DNS message so an
//! eavesdropper on an encrypted transport can’t determine information
//! from the size. The option is defined in [RFC 7830]; the strategy used
//! here, padding queries to a multiple of a block size, is the one
//! recommended for clients by [RFC 8467].
//!
//! [RFC 7830]: https://tools.ietf.org/html/rfc7830
//! [RFC 8467]: https://tools.ietf.org/html/rfc8467

use super::EdnsOption;
use crate::base::iana::OptionCode;
use core::cmp;

/// The block size queries are padded to.
pub const BLOCK_SIZE: usize = 128;

/// Returns the length of the padding data for a message.
///
/// `current` is the size the message would have with all other options
/// included, `bufsize` is the size the message must not exceed. The
/// padding option itself adds four octets of code and length.
///
/// Returns `None` if not even an empty padding option fits. Otherwise
/// returns the number of padding octets that make the message a multiple
/// of [`BLOCK_SIZE`] long or, if that doesn’t fit, as long as `bufsize`
/// allows.
pub fn block_padding_len(current: usize, bufsize: usize) -> Option<usize> {
    if current + 4 >= bufsize {
        return None;
    }
    let remaining = bufsize - (current + 4);
    let modulo = (current + 4) % BLOCK_SIZE;
    if modulo == 0 {
        Some(0)
    } else {
        Some(cmp::min(BLOCK_SIZE - modulo, remaining))
    }
}

/// Creates a padding option with `len` zero octets.
pub fn padding_option(len: usize) -> EdnsOption {
    EdnsOption::new(OptionCode::PADDING, vec![0; len])
}

//============ Testing =======================================================
