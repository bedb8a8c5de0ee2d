//! Common interface over the body parsers.
//!
//! [`BodyParser`] is a tagged union of the URL-encoded and multipart
//! parsers, selected from the request's Content-Type. Both variants share
//! the same contract: `feed(brigade, table) → Status`, sticky terminal
//! statuses, and a hook registry.

use std::fmt;

use tracing::debug;

use crate::brigade::Brigade;
use crate::config::ParserConfig;
use crate::header::{extract_boundary, parse_header_value};
use crate::multipart::MultipartParser;
use crate::spool::Upload;
use crate::status::Status;
use crate::table::Table;
use crate::urlencoded::UrlEncodedParser;

/// Callback invoked for each chunk of an upload part's body, before the
/// chunk is appended to the spool. Any state the callback needs is carried
/// by the closure itself.
pub type UploadHook = Box<dyn FnMut(&Upload, &[u8]) -> Status + Send>;

/// Ordered list of upload hooks.
///
/// Hooks run in registration order; the first non-`Ok` return halts the
/// chain and interrupts the parser.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<UploadHook>,
}

impl HookChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to the chain.
    pub fn push(&mut self, hook: impl FnMut(&Upload, &[u8]) -> Status + Send + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// True when no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the chain for one chunk. Returns the first non-`Ok` status, or
    /// `Ok` when every hook accepted the chunk.
    pub(crate) fn invoke(&mut self, upload: &Upload, chunk: &[u8]) -> Status {
        for hook in &mut self.hooks {
            let status = hook(upload, chunk);
            if !status.is_ok() {
                return status;
            }
        }
        Status::Ok
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// A body parser selected from the request's Content-Type.
#[derive(Debug)]
pub enum BodyParser {
    /// `application/x-www-form-urlencoded` bodies.
    UrlEncoded(UrlEncodedParser),
    /// `multipart/*` bodies.
    Multipart(MultipartParser),
}

impl BodyParser {
    /// Select and construct a parser for a Content-Type header value.
    ///
    /// # Errors
    ///
    /// `NoParser` for media types no parser handles (including an
    /// unparsable Content-Type); the tokenizer's code for a `multipart/*`
    /// type whose boundary is missing or invalid.
    pub fn for_content_type(content_type: &[u8], config: &ParserConfig) -> Result<Self, Status> {
        let media_type = match parse_header_value(content_type) {
            Ok(header) => header.value().to_ascii_lowercase(),
            Err(_) => return Err(Status::NoParser),
        };
        if media_type == b"application/x-www-form-urlencoded" {
            debug!("selected urlencoded body parser");
            return Ok(BodyParser::UrlEncoded(UrlEncodedParser::new(config.clone())));
        }
        if media_type.starts_with(b"multipart/") {
            let boundary = extract_boundary(content_type)?;
            debug!("selected multipart body parser");
            return Ok(BodyParser::Multipart(MultipartParser::new(
                config.clone(),
                boundary,
            )));
        }
        Err(Status::NoParser)
    }

    /// Consume available input, appending results to `table`.
    pub fn feed(&mut self, brigade: &mut Brigade, table: &mut Table) -> Status {
        match self {
            BodyParser::UrlEncoded(parser) => parser.feed(brigade, table),
            BodyParser::Multipart(parser) => parser.feed(brigade, table),
        }
    }

    /// Current (sticky) parser status.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            BodyParser::UrlEncoded(parser) => parser.status(),
            BodyParser::Multipart(parser) => parser.status(),
        }
    }

    /// Total bytes this parser has consumed.
    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        match self {
            BodyParser::UrlEncoded(parser) => parser.bytes_seen(),
            BodyParser::Multipart(parser) => parser.bytes_seen(),
        }
    }

    /// Register an upload hook.
    ///
    /// The URL-encoded parser produces no upload events, so hooks
    /// registered on it are accepted but never invoked.
    pub fn add_hook(&mut self, hook: impl FnMut(&Upload, &[u8]) -> Status + Send + 'static) {
        match self {
            BodyParser::UrlEncoded(_) => {}
            BodyParser::Multipart(parser) => parser.add_hook(hook),
        }
    }
}
