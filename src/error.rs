// Hand-rolled error type, in the spirit of a debugger that can't afford to
// pull in a heavyweight error-handling crate for the handful of error shapes
// it actually produces: bad user input, lookup misses, protocol violations,
// and IO failures on the RSP socket.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Bad command syntax from the console or a malformed RSP request.
    Usage,
    // A symbol/file/line/function/breakpoint/watch lookup came up empty.
    // Never fatal - the caller prints a one-line message and keeps going.
    NotFound,
    // Requested a variable that isn't visible at the current cip.
    OutOfScope,
    // RSP packet framing/checksum/command violation.
    Protocol,
    // Socket or other IO failure.
    Io,
    // Debug metadata is corrupt or an invariant was violated.
    Internal,
}

#[derive(Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Error {
        Error { kind, msg: msg.into() }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.msg)
    }
}
impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::new(ErrorKind::Io, format!("{}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! err {
    ($kind:ident, $($arg:tt)*) => {
        Err($crate::error::Error::new($crate::error::ErrorKind::$kind, format!($($arg)*)))
    };
}
