//! Tokenizer for structured header values.
//!
//! Implements the shared grammar behind `Cookie`, `Content-Type` and
//! `Content-Disposition`:
//!
//! ```text
//! value    := main-value ( OWS ";" OWS attr )*
//! attr     := token [ "=" token-or-quoted ]
//! token    := 1*<VCHAR except separators>
//! qstring  := DQUOTE *( qdtext | "\" CHAR ) DQUOTE
//! ```
//!
//! The main value is scanned liberally (anything up to the first unquoted
//! `;`, so media types like `text/plain` pass); attribute names are strict
//! tokens. Bytes inside quoted strings are preserved verbatim, with
//! backslash escapes resolved.

use std::borrow::Cow;

use bytes::Bytes;

use crate::status::Status;

const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";

#[inline]
pub(crate) fn is_token_char(b: u8) -> bool {
    (0x21..=0x7e).contains(&b) && !SEPARATORS.contains(&b)
}

#[inline]
fn is_ows(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Byte cursor shared by the header and cookie grammars.
pub(crate) struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub(crate) fn done(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) {
        self.pos += 1;
    }

    pub(crate) fn skip_ows(&mut self) {
        while matches!(self.peek(), Some(b) if is_ows(b)) {
            self.bump();
        }
    }

    /// Read one strict token. Empty input position yields `NoToken`.
    pub(crate) fn read_token(&mut self) -> Result<&'a [u8], Status> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_token_char(b)) {
            self.bump();
        }
        if self.pos == start {
            return Err(Status::NoToken);
        }
        Ok(&self.input[start..self.pos])
    }

    /// Read a quoted string, resolving `\` escapes. The opening quote must
    /// be the current byte. A missing closing quote is `BadSeq`.
    pub(crate) fn read_quoted(&mut self) -> Result<Vec<u8>, Status> {
        debug_assert_eq!(self.peek(), Some(b'"'));
        self.bump();
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => return Err(Status::BadSeq),
                Some(b'"') => {
                    self.bump();
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.bump();
                    match self.peek() {
                        None => return Err(Status::BadSeq),
                        Some(escaped) => {
                            out.push(escaped);
                            self.bump();
                        }
                    }
                }
                Some(b) => {
                    out.push(b);
                    self.bump();
                }
            }
        }
    }

    /// Read a token or quoted string, used in attribute-value position.
    pub(crate) fn read_token_or_quoted(&mut self) -> Result<Cow<'a, [u8]>, Status> {
        match self.peek() {
            Some(b'"') => Ok(Cow::Owned(self.read_quoted()?)),
            _ => Ok(Cow::Borrowed(self.read_token()?)),
        }
    }

    /// Read liberally until one of `stops` (outside quotes) or end of
    /// input; used for main values and for cookie values that are not
    /// strict tokens. Control bytes are rejected with `BadChar`.
    pub(crate) fn read_liberal(&mut self, stops: &[u8]) -> Result<&'a [u8], Status> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                break;
            }
            if b < 0x20 && !is_ows(b) {
                return Err(Status::BadChar);
            }
            self.bump();
        }
        let mut end = self.pos;
        while end > start && is_ows(self.input[end - 1]) {
            end -= 1;
        }
        Ok(&self.input[start..end])
    }
}

/// A parsed header value: the main value plus its `;`-separated attributes.
#[derive(Debug, Clone, Default)]
pub struct HeaderValue {
    value: Bytes,
    attrs: Vec<(Bytes, Bytes)>,
}

impl HeaderValue {
    /// The main value, OWS-trimmed.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Attributes in source order.
    #[must_use]
    pub fn attrs(&self) -> &[(Bytes, Bytes)] {
        &self.attrs
    }

    /// First attribute whose name matches, ASCII case-insensitive.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&[u8]> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, v)| &v[..])
    }
}

/// Tokenize a structured header value into its main value and attributes.
///
/// # Errors
///
/// `NoToken` on empty input, `BadSeq` on an unterminated quoted string,
/// `BadAttr` on a malformed attribute, `BadChar` on a control byte outside
/// a quoted string.
pub fn parse_header_value(input: &[u8]) -> Result<HeaderValue, Status> {
    let mut s = Scanner::new(input);
    s.skip_ows();
    if s.done() {
        return Err(Status::NoToken);
    }

    let value = if s.peek() == Some(b'"') {
        Bytes::from(s.read_quoted()?)
    } else {
        Bytes::copy_from_slice(s.read_liberal(b";")?)
    };

    let mut attrs = Vec::new();
    loop {
        s.skip_ows();
        match s.peek() {
            None => break,
            Some(b';') => s.bump(),
            Some(_) => return Err(Status::BadAttr),
        }
        s.skip_ows();
        if s.done() {
            // Trailing separator, common in the wild.
            break;
        }
        if s.peek() == Some(b';') {
            continue;
        }
        let name = s.read_token().map_err(|e| match e {
            Status::NoToken => Status::BadAttr,
            other => other,
        })?;
        s.skip_ows();
        let attr_value = if s.peek() == Some(b'=') {
            s.bump();
            s.skip_ows();
            match s.peek() {
                // `name=` with nothing after it: empty value.
                None | Some(b';') => Cow::Borrowed(&b""[..]),
                Some(b'"') => Cow::Owned(s.read_quoted()?),
                Some(b) if is_token_char(b) => Cow::Borrowed(s.read_token()?),
                Some(_) => return Err(Status::BadAttr),
            }
        } else {
            // Flag attribute such as `secure`.
            Cow::Borrowed(&b""[..])
        };
        attrs.push((
            Bytes::copy_from_slice(name),
            Bytes::copy_from_slice(&attr_value),
        ));
    }

    Ok(HeaderValue { value, attrs })
}

/// Split one `Name: value` header line. The name must be a strict token.
///
/// # Errors
///
/// `BadHeader` when the colon is missing or the name is not a token.
pub fn parse_header_line(line: &[u8]) -> Result<(&[u8], &[u8]), Status> {
    let colon = memchr::memchr(b':', line).ok_or(Status::BadHeader)?;
    let name = &line[..colon];
    if name.is_empty() || !name.iter().all(|&b| is_token_char(b)) {
        return Err(Status::BadHeader);
    }
    let mut value = &line[colon + 1..];
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    let mut end = value.len();
    while end > 0 && is_ows(value[end - 1]) {
        end -= 1;
    }
    Ok((name, &value[..end]))
}

/// Maximum boundary length permitted by the multipart grammar.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Extract the boundary parameter from a `multipart/*` Content-Type.
///
/// # Errors
///
/// `Mismatch` when the media type is not `multipart/*`, `NoAttr` when the
/// boundary parameter is absent, `BadData` when it is empty or longer than
/// [`MAX_BOUNDARY_LEN`].
pub fn extract_boundary(content_type: &[u8]) -> Result<Bytes, Status> {
    let header = parse_header_value(content_type)?;
    if !header
        .value()
        .to_ascii_lowercase()
        .starts_with(b"multipart/")
    {
        return Err(Status::Mismatch);
    }
    let boundary = header.attr("boundary").ok_or(Status::NoAttr)?;
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(Status::BadData);
    }
    Ok(Bytes::copy_from_slice(boundary))
}
