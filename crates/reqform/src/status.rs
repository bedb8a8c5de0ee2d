//! Parse status codes shared by every parser in the crate.
//!
//! A [`Status`] is both the return value of a `feed` call and the sticky
//! state of the parser that produced it: once a parser reports a terminal
//! status, every later `feed` reports the same status without consuming
//! input.
//!
//! [`ParseError`] wraps an error-class status for APIs that speak `Result`.

use std::fmt;

/// Outcome of a parse operation.
///
/// `Ok` means the parser consumed its input to a terminal state.
/// `Incomplete` and `NoData` are the only non-terminal codes; everything
/// else is an error and sticks to the parser that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Input fully consumed, parser terminal.
    #[default]
    Ok,
    /// More bytes are required before progress can be made.
    Incomplete,
    /// No bytes were available to the parser.
    NoData,
    /// A byte was encountered that the grammar forbids at this position.
    BadChar,
    /// A malformed byte sequence (e.g. a broken percent escape).
    BadSeq,
    /// Structurally invalid data.
    BadData,
    /// A malformed or missing header.
    BadHeader,
    /// A malformed header attribute.
    BadAttr,
    /// Bytes claimed to be UTF-8 but failed validation.
    BadUtf8,
    /// Input did not match the expected construct.
    Mismatch,
    /// A configured limit was exceeded.
    OverLimit,
    /// A token was expected but not found.
    NoToken,
    /// An attribute was expected but not found.
    NoAttr,
    /// A header was expected but not found.
    NoHeader,
    /// No parser is available for the supplied content type.
    NoParser,
    /// An environment failure outside the grammar (e.g. spool I/O).
    Generic,
    /// A hook requested that parsing stop.
    Interrupt,
}

impl Status {
    /// Returns true for [`Status::Ok`].
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Returns true for every code other than `Ok`, `Incomplete` and `NoData`.
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(self, Status::Ok | Status::Incomplete | Status::NoData)
    }

    /// Returns true when the parser can make no further progress:
    /// either it finished cleanly or it failed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.is_ok() || self.is_error()
    }

    /// Short lowercase name of the code, used in log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Incomplete => "incomplete",
            Status::NoData => "nodata",
            Status::BadChar => "badchar",
            Status::BadSeq => "badseq",
            Status::BadData => "baddata",
            Status::BadHeader => "badheader",
            Status::BadAttr => "badattr",
            Status::BadUtf8 => "badutf8",
            Status::Mismatch => "mismatch",
            Status::OverLimit => "overlimit",
            Status::NoToken => "notoken",
            Status::NoAttr => "noattr",
            Status::NoHeader => "noheader",
            Status::NoParser => "noparser",
            Status::Generic => "generic",
            Status::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error-class [`Status`] packaged for `Result` seams.
///
/// The façade returns this from lookups whose responsible parser failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError(Status);

impl ParseError {
    /// Wrap a status. Callers are expected to pass an error-class code;
    /// the wrapper does not police this.
    #[must_use]
    pub const fn new(status: Status) -> Self {
        Self(status)
    }

    /// The underlying status code.
    #[must_use]
    pub const fn status(self) -> Status {
        self.0
    }
}

impl From<Status> for ParseError {
    fn from(status: Status) -> Self {
        Self(status)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Status::BadChar => write!(f, "disallowed byte in input"),
            Status::BadSeq => write!(f, "malformed byte sequence"),
            Status::BadData => write!(f, "structurally invalid data"),
            Status::BadHeader => write!(f, "malformed or missing header"),
            Status::BadAttr => write!(f, "malformed header attribute"),
            Status::BadUtf8 => write!(f, "invalid UTF-8"),
            Status::Mismatch => write!(f, "input did not match expected construct"),
            Status::OverLimit => write!(f, "configured limit exceeded"),
            Status::NoToken => write!(f, "expected token not found"),
            Status::NoAttr => write!(f, "expected attribute not found"),
            Status::NoHeader => write!(f, "expected header not found"),
            Status::NoParser => write!(f, "no parser for content type"),
            Status::Interrupt => write!(f, "parsing interrupted by hook"),
            Status::Generic => write!(f, "internal failure"),
            other => write!(f, "parse failed: {other}"),
        }
    }
}

impl std::error::Error for ParseError {}
