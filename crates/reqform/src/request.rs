//! Request façade over the parsers.
//!
//! A [`Request`] owns everything one client request needs parsed: the raw
//! query string, the Content-Type and Cookie header values, the body byte
//! backlog, and the tables the parsers fill. Query-string parsing runs
//! synchronously on first access and is cached. Body parsing is lazy and
//! pull-based: a lookup feeds the body parser one read block at a time
//! until the requested name appears or the parser reaches a terminal
//! status. Once terminal, nothing ever re-parses.
//!
//! The query and body streams fail independently: an error in one never
//! prevents the other from parsing, and a lookup that finds its name
//! succeeds regardless of the other stream's status.

use bytes::Bytes;
use tracing::debug;

use crate::brigade::Brigade;
use crate::config::ParserConfig;
use crate::cookie::{parse_cookie_header, Cookie};
use crate::param::Param;
use crate::parser::{BodyParser, UploadHook};
use crate::spool::Upload;
use crate::status::{ParseError, Status};
use crate::table::Table;
use crate::urlencoded::parse_query_string;

/// Per-request parsing façade.
pub struct Request {
    config: ParserConfig,
    method: Option<Bytes>,
    query_string: Option<Bytes>,
    content_type: Option<Bytes>,
    cookie_header: Option<Bytes>,
    /// Body bytes the environment has delivered but no parser has seen.
    backlog: Brigade,
    /// Bytes handed to the body parser, including any unconsumable tail.
    pending: Brigade,
    args: Option<Table>,
    args_status: Status,
    body: Table,
    body_status: Status,
    body_parser: Option<BodyParser>,
    pending_hooks: Vec<UploadHook>,
    cookies: Option<Vec<Cookie>>,
    cookie_status: Status,
}

impl Request {
    /// Create a request façade with the given configuration.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            method: None,
            query_string: None,
            content_type: None,
            cookie_header: None,
            backlog: Brigade::new(),
            pending: Brigade::new(),
            args: None,
            args_status: Status::Incomplete,
            body: Table::new(),
            body_status: Status::Incomplete,
            body_parser: None,
            pending_hooks: Vec::new(),
            cookies: None,
            cookie_status: Status::Incomplete,
        }
    }

    /// Set the request method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<Bytes>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the raw query string (bytes after `?`, without the `?`).
    #[must_use]
    pub fn with_query_string(mut self, query: impl Into<Bytes>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    /// Set the Content-Type header value.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the Cookie header value.
    #[must_use]
    pub fn with_cookie_header(mut self, header: impl Into<Bytes>) -> Self {
        self.cookie_header = Some(header.into());
        self
    }

    /// Request method, when supplied.
    #[must_use]
    pub fn method(&self) -> Option<&[u8]> {
        self.method.as_deref()
    }

    /// Append body bytes from the environment.
    pub fn feed_body(&mut self, bytes: &[u8]) {
        self.backlog.append_slice(bytes);
    }

    /// Append an owned body segment without copying.
    pub fn append_body(&mut self, bytes: impl Into<Bytes>) {
        self.backlog.append(bytes.into());
    }

    /// Mark the body stream complete.
    pub fn finish_body(&mut self) {
        self.backlog.close();
    }

    /// Register an upload hook, invoked per body chunk of every file part.
    pub fn add_upload_hook(&mut self, hook: impl FnMut(&Upload, &[u8]) -> Status + Send + 'static) {
        match &mut self.body_parser {
            Some(parser) => parser.add_hook(hook),
            None => self.pending_hooks.push(Box::new(hook)),
        }
    }

    /// The parsed query-string table, parsed and cached on first access.
    pub fn args(&mut self) -> &Table {
        self.ensure_args();
        self.args.as_ref().expect("args parsed by ensure_args")
    }

    /// Status of the query-string parse (parses on first call).
    pub fn args_status(&mut self) -> Status {
        self.ensure_args();
        self.args_status
    }

    /// The body table, after driving the body parser as far as the
    /// available input allows.
    ///
    /// # Errors
    ///
    /// The parser's code when body parsing failed, or `Incomplete` when
    /// the environment has not yet delivered (and closed) the full body.
    pub fn body(&mut self) -> Result<&Table, ParseError> {
        self.drive_body(None);
        if self.body_status.is_ok() {
            Ok(&self.body)
        } else {
            Err(ParseError::new(self.body_status))
        }
    }

    /// Current body parse status without driving the parser.
    #[must_use]
    pub fn body_status(&self) -> Status {
        self.body_status
    }

    /// Look up a parameter by name in args ∪ body.
    ///
    /// Body parsing advances only as far as needed: input is fed to the
    /// body parser block by block until the name appears or the parser
    /// terminates.
    ///
    /// # Errors
    ///
    /// When the name is found nowhere and a responsible parser has
    /// failed, that parser's error (query stream first).
    pub fn param(&mut self, name: impl AsRef<[u8]>) -> Result<Option<&Param>, ParseError> {
        let name = name.as_ref();
        self.ensure_args();
        let in_args = self
            .args
            .as_ref()
            .is_some_and(|table| table.contains(name));
        if !in_args {
            self.drive_body(Some(name));
        }

        let args = self.args.as_ref().expect("args parsed by ensure_args");
        if let Some(param) = args.first(name) {
            return Ok(Some(param));
        }
        if let Some(param) = self.body.first(name) {
            return Ok(Some(param));
        }
        if self.args_status.is_error() {
            return Err(ParseError::new(self.args_status));
        }
        if self.body_status.is_error() {
            return Err(ParseError::new(self.body_status));
        }
        Ok(None)
    }

    /// Fresh overlay table of args followed by body entries.
    ///
    /// Drives body parsing to completion first. The overlay is derived:
    /// inserting into it affects neither source table.
    pub fn params(&mut self) -> Table {
        self.ensure_args();
        self.drive_body(None);
        let args = self.args.as_ref().expect("args parsed by ensure_args");
        args.merge_overlay(&self.body)
    }

    /// Parsed cookie records from the Cookie header, cached on first use.
    ///
    /// # Errors
    ///
    /// The cookie parser's code when the header is malformed.
    pub fn cookies(&mut self) -> Result<&[Cookie], ParseError> {
        if self.cookies.is_none() {
            let (list, status) = match &self.cookie_header {
                None => (Vec::new(), Status::Ok),
                Some(header) => match parse_cookie_header(header) {
                    Ok(list) => (list, Status::Ok),
                    Err(code) => (Vec::new(), code),
                },
            };
            debug!(cookies = list.len(), status = %status, "cookie header parsed");
            self.cookies = Some(list);
            self.cookie_status = status;
        }
        if self.cookie_status.is_error() {
            return Err(ParseError::new(self.cookie_status));
        }
        Ok(self.cookies.as_ref().expect("cookies cached above"))
    }

    /// First cookie with the given name, if the header parsed cleanly.
    pub fn cookie(&mut self, name: &str) -> Option<&Cookie> {
        self.cookies().ok()?.iter().find(|c| c.name() == name)
    }

    fn ensure_args(&mut self) {
        if self.args.is_some() {
            return;
        }
        let mut table = Table::new();
        self.args_status = match &self.query_string {
            Some(query) => parse_query_string(query, &self.config, &mut table),
            None => Status::Ok,
        };
        debug!(entries = table.len(), status = %self.args_status, "query string parsed");
        self.args = Some(table);
    }

    fn ensure_parser(&mut self) {
        if self.body_parser.is_some() || self.body_status.is_terminal() {
            return;
        }
        let Some(content_type) = &self.content_type else {
            // No Content-Type means no body to parse; that is not a failure.
            self.body_status = Status::Ok;
            return;
        };
        match BodyParser::for_content_type(content_type, &self.config) {
            Ok(mut parser) => {
                for hook in self.pending_hooks.drain(..) {
                    parser.add_hook(hook);
                }
                self.body_parser = Some(parser);
            }
            Err(code) => {
                debug!(status = %code, "no body parser for content type");
                self.body_status = code;
            }
        }
    }

    /// Feed the body parser block by block until terminal, starved, or
    /// (when `stop_at` is set) the named parameter shows up.
    fn drive_body(&mut self, stop_at: Option<&[u8]>) {
        if self.body_status.is_terminal() {
            return;
        }
        self.ensure_parser();
        let Some(parser) = self.body_parser.as_mut() else {
            return;
        };
        let block = self.config.read_block_size() as usize;
        loop {
            if self.body_status.is_terminal() {
                break;
            }
            if let Some(name) = stop_at {
                if self.body.contains(name) {
                    break;
                }
            }
            let mut advanced = false;
            if !self.backlog.is_empty() {
                let chunk = self.backlog.split_to(block);
                self.pending.append_brigade(chunk);
                advanced = true;
            } else if self.backlog.is_closed() && !self.pending.is_closed() {
                self.pending.close();
                advanced = true;
            }
            if !advanced {
                // Starved: nothing new to offer the parser.
                break;
            }
            self.body_status = parser.feed(&mut self.pending, &mut self.body);
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("args_status", &self.args_status)
            .field("body_status", &self.body_status)
            .field("body_entries", &self.body.len())
            .field("backlog", &self.backlog.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLENCODED: &[u8] = b"application/x-www-form-urlencoded";

    fn urlencoded_request(body: &[u8]) -> Request {
        let mut req = Request::new(ParserConfig::default()).with_content_type(URLENCODED);
        req.feed_body(body);
        req.finish_body();
        req
    }

    #[test]
    fn test_args_parsed_lazily_and_cached() {
        let mut req = Request::new(ParserConfig::default()).with_query_string(&b"a=1&b=2&a=3"[..]);
        let args = req.args();
        assert_eq!(args.len(), 3);
        assert_eq!(args.first("a").unwrap().value(), b"1");
        let all: Vec<_> = args.all("a").map(|p| p.value().to_vec()).collect();
        assert_eq!(all, vec![b"1".to_vec(), b"3".to_vec()]);
        assert_eq!(req.args_status(), Status::Ok);
        // Second access hits the cache.
        assert_eq!(req.args().len(), 3);
    }

    #[test]
    fn test_no_query_string_is_empty_ok() {
        let mut req = Request::new(ParserConfig::default());
        assert!(req.args().is_empty());
        assert_eq!(req.args_status(), Status::Ok);
    }

    #[test]
    fn test_body_lookup_drives_parser() {
        let mut req = urlencoded_request(b"x=10&y=20");
        assert_eq!(req.param("y").unwrap().unwrap().value(), b"20");
        assert_eq!(req.body_status(), Status::Ok);
    }

    #[test]
    fn test_lookup_stops_before_malformed_tail() {
        // `early` is decodable long before the malformed escape at the
        // end; a targeted lookup must not surface the later failure.
        let mut body = Vec::new();
        body.extend_from_slice(b"early=yes&");
        body.extend_from_slice("filler=x".repeat(200).as_bytes());
        body.extend_from_slice(b"&broken=%ZZ");
        let mut req = Request::new(ParserConfig::new().with_read_block_size(16))
            .with_content_type(URLENCODED);
        req.feed_body(&body);
        req.finish_body();

        assert_eq!(req.param("early").unwrap().unwrap().value(), b"yes");
        assert!(!req.body_status().is_terminal());

        // A miss now drives to the failure and surfaces it.
        let err = req.param("absent").unwrap_err();
        assert_eq!(err.status(), Status::BadSeq);
        assert_eq!(req.body_status(), Status::BadSeq);
        // The early parameter stays accessible after the failure.
        assert_eq!(req.param("early").unwrap().unwrap().value(), b"yes");
    }

    #[test]
    fn test_streams_fail_independently() {
        let mut req = Request::new(ParserConfig::default())
            .with_query_string(&b"bad=%GG"[..])
            .with_content_type(URLENCODED);
        req.feed_body(b"fine=1");
        req.finish_body();

        assert_eq!(req.args_status(), Status::BadSeq);
        // Body parses despite the query failure.
        assert_eq!(req.param("fine").unwrap().unwrap().value(), b"1");
        assert_eq!(req.body_status(), Status::Ok);
        // A miss surfaces the query stream's error.
        assert_eq!(req.param("nowhere").unwrap_err().status(), Status::BadSeq);
    }

    #[test]
    fn test_params_overlay() {
        let mut req = Request::new(ParserConfig::default())
            .with_query_string(&b"a=1&b=2"[..])
            .with_content_type(URLENCODED);
        req.feed_body(b"a=3&c=4");
        req.finish_body();

        let params = req.params();
        let names: Vec<_> = params.iter().map(|p| p.value().to_vec()).collect();
        assert_eq!(
            names,
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec(), b"4".to_vec()]
        );
        // Derived table: inserting does not touch args or body.
        let mut derived = params;
        derived.insert(Param::new(b"z".to_vec(), b"9".to_vec()));
        assert_eq!(req.args().len(), 2);
        assert_eq!(req.body().unwrap().len(), 2);
    }

    #[test]
    fn test_multipart_body_through_facade() {
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"note\"\r\n\
            \r\n\
            hello\r\n\
            --B\r\n\
            Content-Disposition: form-data; name=\"up\"; filename=\"u.bin\"\r\n\
            \r\n\
            \x00\x01\x02\r\n\
            --B--\r\n";
        let mut req = Request::new(ParserConfig::default())
            .with_content_type(&b"multipart/form-data; boundary=B"[..]);
        req.feed_body(body);
        req.finish_body();

        let table = req.body().unwrap();
        assert_eq!(table.first("note").unwrap().value(), b"hello");
        let upload = table.first("up").unwrap().upload().unwrap();
        assert_eq!(upload.size(), 3);
        assert_eq!(upload.spool().bytes(), Some(&[0u8, 1, 2][..]));
    }

    #[test]
    fn test_upload_hook_via_facade() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0u64));
        let sink = std::sync::Arc::clone(&seen);
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"f\"; filename=\"f\"\r\n\
            \r\n\
            123456\r\n\
            --B--\r\n";
        let mut req = Request::new(ParserConfig::default())
            .with_content_type(&b"multipart/form-data; boundary=B"[..]);
        req.add_upload_hook(move |_, chunk| {
            *sink.lock().unwrap() += chunk.len() as u64;
            Status::Ok
        });
        req.feed_body(body);
        req.finish_body();
        req.body().unwrap();
        assert_eq!(*seen.lock().unwrap(), 6);
    }

    #[test]
    fn test_no_content_type_means_empty_body() {
        let mut req = Request::new(ParserConfig::default());
        req.finish_body();
        assert!(req.body().unwrap().is_empty());
        assert_eq!(req.body_status(), Status::Ok);
        assert!(req.param("anything").unwrap().is_none());
    }

    #[test]
    fn test_unhandled_content_type_is_noparser() {
        let mut req =
            Request::new(ParserConfig::default()).with_content_type(&b"application/json"[..]);
        req.feed_body(b"{}");
        req.finish_body();
        assert_eq!(req.body().unwrap_err().status(), Status::NoParser);
        assert_eq!(req.param("x").unwrap_err().status(), Status::NoParser);
    }

    #[test]
    fn test_starved_body_is_incomplete() {
        let mut req = urlencoded_request(b"");
        let mut open = Request::new(ParserConfig::default()).with_content_type(URLENCODED);
        open.feed_body(b"partial=");
        // Stream not closed: body() cannot finish.
        assert_eq!(open.body().unwrap_err().status(), Status::Incomplete);
        // Closed empty body parses to an empty table.
        assert!(req.body().unwrap().is_empty());
    }

    #[test]
    fn test_cookies_via_facade() {
        let mut req = Request::new(ParserConfig::default())
            .with_cookie_header(&b"$Version=\"1\"; foo=\"bar\"; $Path=/; baz=qux"[..]);
        let cookies = req.cookies().unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(req.cookie("foo").unwrap().path(), Some("/"));
        assert!(req.cookie("missing").is_none());

        let mut bad = Request::new(ParserConfig::default())
            .with_cookie_header(&b"$Path=/; orphan=1"[..]);
        assert_eq!(bad.cookies().unwrap_err().status(), Status::BadHeader);
    }
}
