//! Error type for client transports.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use super::outcome::ResultKind;
use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::sync::Arc;

/// Error type for client transports.
///
/// I/O errors are kept behind an `Arc` so that the error can be cloned and
/// handed to all queries waiting for the same answer.
#[derive(Clone, Debug)]
pub enum Error {
    /// The query waited for went away without producing a result.
    ChainAbandoned,

    /// The message is too long for the 16 bit length of stream transports.
    MessageTooLarge,

    /// Establishing a stream connection gave an error.
    StreamConnect(Arc<io::Error>),

    /// Reading from stream gave an error.
    StreamReadError(Arc<io::Error>),

    /// Reading for a stream ended unexpectedly.
    StreamUnexpectedEndOfData,

    /// Writing to a stream gave an error.
    StreamWriteError(Arc<io::Error>),

    /// No response was received in time.
    Timeout,

    /// The TLS handshake failed.
    TlsHandshake(Arc<io::Error>),

    /// A TLS connection was requested but TLS is not configured.
    TlsUnavailable,

    /// Binding a UDP socket gave an error.
    UdpBind(Arc<io::Error>),

    /// Connecting a UDP socket gave an error.
    UdpConnect(Arc<io::Error>),

    /// Receiving from a UDP socket gave an error.
    UdpReceive(Arc<io::Error>),

    /// Sending over a UDP socket gaven an error.
    UdpSend(Arc<io::Error>),

    /// Sending over a UDP socket gave a partial result.
    UdpShortSend,
}

impl Error {
    /// Returns the result kind a query failing with this error has.
    ///
    /// Errors that indicate the local system has run out of resources are
    /// classified as [`ResultKind::OsLimitError`], expired timers as
    /// [`ResultKind::Timeout`], and everything else as
    /// [`ResultKind::PermanentError`].
    pub fn kind(&self) -> ResultKind {
        match self {
            Error::ChainAbandoned | Error::Timeout => ResultKind::Timeout,
            Error::MessageTooLarge
            | Error::StreamUnexpectedEndOfData
            | Error::TlsUnavailable
            | Error::UdpShortSend => ResultKind::PermanentError,
            Error::StreamConnect(err)
            | Error::StreamReadError(err)
            | Error::StreamWriteError(err)
            | Error::TlsHandshake(err)
            | Error::UdpBind(err)
            | Error::UdpConnect(err)
            | Error::UdpReceive(err)
            | Error::UdpSend(err) => io_error_kind(err),
        }
    }
}

/// Classifies an I/O error.
fn io_error_kind(err: &io::Error) -> ResultKind {
    match err.kind() {
        io::ErrorKind::TimedOut => return ResultKind::Timeout,
        io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::OutOfMemory => return ResultKind::OsLimitError,
        _ => {}
    }
    if is_os_limit(err.raw_os_error()) {
        ResultKind::OsLimitError
    } else {
        ResultKind::PermanentError
    }
}

/// Returns whether the OS error code signals exhausted local resources.
#[cfg(unix)]
fn is_os_limit(code: Option<i32>) -> bool {
    matches!(
        code,
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

/// Returns whether the OS error code signals exhausted local resources.
#[cfg(not(unix))]
fn is_os_limit(_code: Option<i32>) -> bool {
    false
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Error::ChainAbandoned => {
                write!(f, "query waited for was abandoned")
            }
            Error::MessageTooLarge => {
                write!(f, "message too large for stream transport")
            }
            Error::StreamConnect(err) => {
                write!(f, "error connecting stream: {}", err)
            }
            Error::StreamReadError(err) => {
                write!(f, "error reading from stream: {}", err)
            }
            Error::StreamUnexpectedEndOfData => {
                write!(f, "unexpected end of data")
            }
            Error::StreamWriteError(err) => {
                write!(f, "error writing to stream: {}", err)
            }
            Error::Timeout => write!(f, "timeout waiting for response"),
            Error::TlsHandshake(err) => {
                write!(f, "TLS handshake failed: {}", err)
            }
            Error::TlsUnavailable => write!(f, "TLS not available"),
            Error::UdpBind(err) => {
                write!(f, "error binding UDP socket: {}", err)
            }
            Error::UdpConnect(err) => {
                write!(f, "error connecting UDP socket: {}", err)
            }
            Error::UdpReceive(err) => {
                write!(f, "error receiving from UDP socket: {}", err)
            }
            Error::UdpSend(err) => {
                write!(f, "error sending to UDP socket: {}", err)
            }
            Error::UdpShortSend => write!(f, "partial sent to UDP socket"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ChainAbandoned => None,
            Error::MessageTooLarge => None,
            Error::StreamConnect(e) => Some(e),
            Error::StreamReadError(e) => Some(e),
            Error::StreamUnexpectedEndOfData => None,
            Error::StreamWriteError(e) => Some(e),
            Error::Timeout => None,
            Error::TlsHandshake(e) => Some(e),
            Error::TlsUnavailable => None,
            Error::UdpBind(e) => Some(e),
            Error::UdpConnect(e) => Some(e),
            Error::UdpReceive(e) => Some(e),
            Error::UdpSend(e) => Some(e),
            Error::UdpShortSend => None,
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn io(kind: io::ErrorKind) -> Arc<io::Error> {
        Arc::new(io::Error::from(kind))
    }

    #[test]
    fn classification() {
        assert_eq!(Error::Timeout.kind(), ResultKind::Timeout);
        assert_eq!(Error::ChainAbandoned.kind(), ResultKind::Timeout);
        assert_eq!(
            Error::StreamUnexpectedEndOfData.kind(),
            ResultKind::PermanentError
        );
        assert_eq!(
            Error::UdpBind(io(io::ErrorKind::AddrInUse)).kind(),
            ResultKind::OsLimitError
        );
        assert_eq!(
            Error::StreamConnect(io(io::ErrorKind::AddrNotAvailable)).kind(),
            ResultKind::OsLimitError
        );
        assert_eq!(
            Error::StreamConnect(io(io::ErrorKind::ConnectionRefused)).kind(),
            ResultKind::PermanentError
        );
        assert_eq!(
            Error::StreamReadError(io(io::ErrorKind::TimedOut)).kind(),
            ResultKind::Timeout
        );
    }

    #[cfg(unix)]
    #[test]
    fn os_limits() {
        for code in [libc::EMFILE, libc::ENFILE, libc::ENOBUFS, libc::ENOMEM] {
            let err = Error::UdpBind(Arc::new(io::Error::from_raw_os_error(code)));
            assert_eq!(err.kind(), ResultKind::OsLimitError);
        }
        let err = Error::UdpSend(Arc::new(io::Error::from_raw_os_error(
            libc::ENETUNREACH,
        )));
        assert_eq!(err.kind(), ResultKind::PermanentError);
    }
}
