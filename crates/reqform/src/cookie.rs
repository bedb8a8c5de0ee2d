//! RFC 2109 and Netscape cookie parsing and serialization.
//!
//! A `Cookie:` request header is split at unquoted `;` and `,` into
//! `name=value` pairs. The RFC 2109 reserved attributes `$Path`, `$Domain`
//! and `$Port` attach to the most recent cookie; `$Version` may lead the
//! header, where it sets the version for every cookie that follows.
//!
//! Serialization renders the `Set-Cookie` form with a fixed attribute
//! order. Version-0 (Netscape) cookies never emit a `Version` attribute,
//! version-1 cookies always do, and version ≥ 1 prefers `max-age` over
//! `expires`.

use std::fmt;

use crate::header::Scanner;
use crate::status::Status;

/// Cookie specification dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// Original Netscape cookies.
    #[default]
    Netscape,
    /// RFC 2109 cookies (`Version=1`).
    Rfc2109,
}

impl Version {
    /// Numeric version as it appears on the wire.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Version::Netscape => 0,
            Version::Rfc2109 => 1,
        }
    }
}

/// A single cookie record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cookie {
    name: String,
    value: String,
    version: Version,
    path: Option<String>,
    domain: Option<String>,
    port: Option<String>,
    comment: Option<String>,
    comment_url: Option<String>,
    expires: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    /// Create a version-0 cookie with just a name and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value, with any quoting removed.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Dialect this cookie follows.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Path attribute.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Domain attribute.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Port attribute (RFC 2109).
    #[must_use]
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Comment attribute (RFC 2109).
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// CommentURL attribute (RFC 2965 compatibility).
    #[must_use]
    pub fn comment_url(&self) -> Option<&str> {
        self.comment_url.as_deref()
    }

    /// Expiry date, verbatim as received.
    #[must_use]
    pub fn expires(&self) -> Option<&str> {
        self.expires.as_deref()
    }

    /// Max-Age in seconds.
    #[must_use]
    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    /// Secure flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// HttpOnly flag.
    #[must_use]
    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Set the dialect.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Set the path attribute.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = Some(path.into());
    }

    /// Set the domain attribute.
    pub fn set_domain(&mut self, domain: impl Into<String>) {
        self.domain = Some(domain.into());
    }

    /// Set the port attribute.
    pub fn set_port(&mut self, port: impl Into<String>) {
        self.port = Some(port.into());
    }

    /// Set the comment attribute.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    /// Set the commentURL attribute.
    pub fn set_comment_url(&mut self, url: impl Into<String>) {
        self.comment_url = Some(url.into());
    }

    /// Set the expiry date string.
    pub fn set_expires(&mut self, expires: impl Into<String>) {
        self.expires = Some(expires.into());
    }

    /// Set Max-Age in seconds.
    pub fn set_max_age(&mut self, seconds: i64) {
        self.max_age = Some(seconds);
    }

    /// Set the secure flag.
    pub fn set_secure(&mut self, secure: bool) {
        self.secure = secure;
    }

    /// Set the HttpOnly flag.
    pub fn set_http_only(&mut self, http_only: bool) {
        self.http_only = http_only;
    }

    /// Render the `Cookie:` request-header form of this cookie.
    ///
    /// Version-1 cookies are prefixed with `$Version="1"` and carry their
    /// `$Path`/`$Domain`/`$Port` attributes; version-0 cookies are a bare
    /// `name=value`.
    #[must_use]
    pub fn wire_value(&self) -> String {
        match self.version {
            Version::Netscape => format!("{}={}", self.name, self.value),
            Version::Rfc2109 => {
                let mut out = format!("$Version=\"1\"; {}=\"{}\"", self.name, self.value);
                if let Some(path) = &self.path {
                    out.push_str(&format!("; $Path=\"{path}\""));
                }
                if let Some(domain) = &self.domain {
                    out.push_str(&format!("; $Domain=\"{domain}\""));
                }
                if let Some(port) = &self.port {
                    out.push_str(&format!("; $Port=\"{port}\""));
                }
                out
            }
        }
    }
}

impl fmt::Display for Cookie {
    /// The `Set-Cookie` form, attributes in the fixed order `Version`,
    /// `path`, `domain`, `port`, `comment`, `commentURL`,
    /// `max-age`/`expires`, `secure`, `HttpOnly`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v1 = self.version == Version::Rfc2109;
        if v1 {
            write!(f, "{}=\"{}\"; Version=1", self.name, self.value)?;
        } else {
            write!(f, "{}={}", self.name, self.value)?;
        }
        let quoted = |s: &str| {
            if v1 {
                format!("\"{s}\"")
            } else {
                s.to_string()
            }
        };
        if let Some(path) = &self.path {
            write!(f, "; path={}", quoted(path))?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; domain={}", quoted(domain))?;
        }
        if let Some(port) = &self.port {
            write!(f, "; port={}", quoted(port))?;
        }
        if let Some(comment) = &self.comment {
            write!(f, "; comment={}", quoted(comment))?;
        }
        if let Some(url) = &self.comment_url {
            write!(f, "; commentURL={}", quoted(url))?;
        }
        // Version >= 1 prefers max-age, Netscape prefers expires.
        match (v1, self.max_age, &self.expires) {
            (true, Some(age), _) | (false, Some(age), None) => write!(f, "; max-age={age}")?,
            (true, None, Some(expires)) | (false, _, Some(expires)) => {
                write!(f, "; expires={expires}")?;
            }
            _ => {}
        }
        if self.secure {
            write!(f, "; secure")?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8]) -> Result<String, Status> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| Status::BadUtf8)
}

/// Read one `name[=value]` segment; stops at any byte in `stops`.
fn read_pair<'a>(s: &mut Scanner<'a>, stops: &[u8]) -> Result<(&'a [u8], Vec<u8>), Status> {
    let mut name_stops = stops.to_vec();
    name_stops.push(b'=');
    let name = s.read_liberal(&name_stops)?;
    let value = if s.peek() == Some(b'=') {
        s.bump();
        s.skip_ows();
        if s.peek() == Some(b'"') {
            s.read_quoted()?
        } else {
            s.read_liberal(stops)?.to_vec()
        }
    } else {
        Vec::new()
    };
    Ok((name, value))
}

/// Parse a `Cookie:` request-header value into cookie records.
///
/// # Errors
///
/// `BadHeader` when a reserved attribute other than `$Version` precedes the
/// first cookie or a segment has no name; `BadSeq`/`BadChar` from the
/// shared tokenizer; `BadUtf8` on non-UTF-8 names or values.
pub fn parse_cookie_header(input: &[u8]) -> Result<Vec<Cookie>, Status> {
    let mut s = Scanner::new(input);
    let mut cookies: Vec<Cookie> = Vec::new();
    let mut header_version = Version::Netscape;

    loop {
        s.skip_ows();
        if s.done() {
            break;
        }
        if matches!(s.peek(), Some(b';' | b',')) {
            s.bump();
            continue;
        }
        let (raw_name, raw_value) = read_pair(&mut s, b";,")?;
        if raw_name.is_empty() {
            return Err(Status::BadHeader);
        }
        if raw_name[0] == b'$' {
            let attr = raw_name[1..].to_ascii_lowercase();
            let value = utf8(&raw_value)?;
            match (attr.as_slice(), cookies.last_mut()) {
                (b"version", None) => {
                    header_version = match value.trim() {
                        "0" => Version::Netscape,
                        _ => Version::Rfc2109,
                    };
                }
                (b"version", Some(last)) => {
                    last.version = if value.trim() == "0" {
                        Version::Netscape
                    } else {
                        Version::Rfc2109
                    };
                }
                (b"path", Some(last)) => last.path = Some(value),
                (b"domain", Some(last)) => last.domain = Some(value),
                (b"port", Some(last)) => last.port = Some(value),
                (b"path" | b"domain" | b"port", None) => return Err(Status::BadHeader),
                // Unrecognized reserved attributes are dropped.
                _ => {}
            }
        } else {
            let mut cookie = Cookie::new(utf8(raw_name)?, utf8(&raw_value)?);
            cookie.version = header_version;
            cookies.push(cookie);
        }
    }
    Ok(cookies)
}

/// Parse a `Set-Cookie:` response-header value into a cookie record.
///
/// Attribute segments are split at `;` only, so Netscape `expires` dates
/// containing commas survive. Unrecognized attributes are dropped.
///
/// # Errors
///
/// `BadHeader` when the leading `name=value` pair is missing, `BadAttr` on
/// an unparsable `max-age`, `BadUtf8` on non-UTF-8 content.
pub fn parse_set_cookie(input: &[u8]) -> Result<Cookie, Status> {
    let mut s = Scanner::new(input);
    s.skip_ows();
    let (raw_name, raw_value) = read_pair(&mut s, b";")?;
    if raw_name.is_empty() || raw_name[0] == b'$' {
        return Err(Status::BadHeader);
    }
    let mut cookie = Cookie::new(utf8(raw_name)?, utf8(&raw_value)?);

    loop {
        s.skip_ows();
        match s.peek() {
            None => break,
            Some(b';') => s.bump(),
            Some(_) => return Err(Status::BadAttr),
        }
        s.skip_ows();
        if s.done() {
            break;
        }
        let (raw_attr, raw_value) = read_pair(&mut s, b";")?;
        let attr = raw_attr.to_ascii_lowercase();
        let value = utf8(&raw_value)?;
        match attr.as_slice() {
            b"version" => {
                cookie.version = if value.trim() == "0" {
                    Version::Netscape
                } else {
                    Version::Rfc2109
                };
            }
            b"path" => cookie.path = Some(value),
            b"domain" => cookie.domain = Some(value),
            b"port" => cookie.port = Some(value),
            b"comment" => cookie.comment = Some(value),
            b"commenturl" => cookie.comment_url = Some(value),
            b"expires" => cookie.expires = Some(value),
            b"max-age" => {
                cookie.max_age = Some(value.trim().parse().map_err(|_| Status::BadAttr)?);
            }
            b"secure" => cookie.secure = true,
            b"httponly" => cookie.http_only = true,
            _ => {}
        }
    }
    Ok(cookie)
}
