//! Incremental parser for `multipart/form-data` bodies.
//!
//! The parser walks the byte stream `PREAMBLE → PART_HEADERS → PART_BODY`
//! part by part, delimited by `CRLF "--" boundary`, until the terminal
//! `--boundary--` marker. It never commits bytes that could still turn out
//! to be the start of a delimiter: when the tail of the available input is
//! a possible delimiter prefix, the confirmed-safe prefix is emitted and
//! the parser reports `Incomplete`.
//!
//! Form fields accumulate in memory; file parts stream through the
//! registered upload hooks into a [`Spool`](crate::spool::Spool) that
//! spills to disk past the configured threshold. Parts whose Content-Type
//! is itself `multipart/*` are handled by a nested parser, bounded by the
//! configured nesting ceiling.

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::brigade::Brigade;
use crate::config::ParserConfig;
use crate::header::{extract_boundary, parse_header_line, parse_header_value};
use crate::param::Param;
use crate::parser::HookChain;
use crate::spool::{Spool, Upload};
use crate::status::Status;
use crate::table::Table;

/// Hard cap on the size of one part's header block.
const MAX_HEADER_BLOCK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MpState {
    /// Discarding bytes until the first delimiter.
    Preamble,
    /// Just consumed a delimiter; deciding between a new part and the end.
    AfterDelim,
    /// Accumulating a part's header block.
    PartHeaders,
    /// Streaming a part's body (or discarding, when no part is active).
    PartBody,
    /// A nested multipart part is being parsed.
    Nested,
    /// Terminal.
    Done,
}

#[derive(Debug)]
enum Sink {
    Field(Vec<u8>),
    Upload(Upload),
}

#[derive(Debug)]
struct PartInProgress {
    name: Bytes,
    info: Table,
    sink: Sink,
}

enum Classified {
    Field { name: Bytes },
    Upload {
        name: Bytes,
        filename: Bytes,
        content_type: Bytes,
    },
    Nested { boundary: Bytes },
}

enum StepOutcome {
    /// Progress was made; run the state machine again.
    Continue,
    /// Stop feeding and report this status.
    Stop(Status),
}

/// Streaming `multipart/form-data` parser.
pub struct MultipartParser {
    config: ParserConfig,
    /// Full delimiter, `CRLF "--" boundary`.
    delim: Vec<u8>,
    status: Status,
    state: MpState,
    part: Option<PartInProgress>,
    nested: Option<Box<MultipartParser>>,
    hooks: HookChain,
    depth: u8,
    part_count: u32,
    bytes_seen: u64,
    /// True once preamble bytes have been discarded, which rules out the
    /// no-leading-CRLF form of the first delimiter.
    preamble_skipped: bool,
}

impl std::fmt::Debug for MultipartParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartParser")
            .field("status", &self.status)
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("part_count", &self.part_count)
            .field("bytes_seen", &self.bytes_seen)
            .finish_non_exhaustive()
    }
}

impl MultipartParser {
    /// Create a parser for the given boundary token.
    ///
    /// The boundary is the bare token from the Content-Type header; the
    /// surrounding `--` dashes and CRLF are supplied by the parser.
    #[must_use]
    pub fn new(config: ParserConfig, boundary: impl AsRef<[u8]>) -> Self {
        Self::with_depth(config, boundary.as_ref(), 1)
    }

    fn with_depth(config: ParserConfig, boundary: &[u8], depth: u8) -> Self {
        let mut delim = Vec::with_capacity(boundary.len() + 4);
        delim.extend_from_slice(b"\r\n--");
        delim.extend_from_slice(boundary);
        Self {
            config,
            delim,
            status: Status::Incomplete,
            state: MpState::Preamble,
            part: None,
            nested: None,
            hooks: HookChain::new(),
            depth,
            part_count: 0,
            bytes_seen: 0,
            preamble_skipped: false,
        }
    }

    /// Register an upload hook, invoked for every body chunk of every file
    /// part before the chunk reaches the spool.
    pub fn add_hook(&mut self, hook: impl FnMut(&Upload, &[u8]) -> Status + Send + 'static) {
        self.hooks.push(hook);
    }

    /// Current (sticky) parser status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Total bytes this parser has consumed.
    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Consume available input, appending completed parts to `table`.
    ///
    /// Returns `Ok` once the terminal boundary has been seen, `Incomplete`
    /// when starved, `NoData` when called with nothing buffered on an open
    /// brigade, and an error code otherwise. Terminal statuses are sticky;
    /// on failure the in-progress part is committed to the table carrying
    /// the failure code.
    pub fn feed(&mut self, brigade: &mut Brigade, table: &mut Table) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }
        if brigade.is_empty() && !brigade.is_closed() {
            return Status::NoData;
        }

        let budget = self.config.max_body_bytes().saturating_sub(self.bytes_seen);
        let over_budget = brigade.len() as u64 > budget;
        self.status = if over_budget {
            let mut limited = brigade.split_to(budget as usize);
            let before = limited.len();
            let status = self.run(&mut limited, table);
            self.bytes_seen += (before - limited.len()) as u64;
            if status.is_terminal() {
                status
            } else {
                warn!(
                    limit = self.config.max_body_bytes(),
                    depth = self.depth,
                    "multipart body over byte limit"
                );
                self.fail(Status::OverLimit, table)
            }
        } else {
            let before = brigade.len();
            let status = self.run(brigade, table);
            self.bytes_seen += (before - brigade.len()) as u64;
            status
        };
        self.status
    }

    fn run(&mut self, brigade: &mut Brigade, table: &mut Table) -> Status {
        loop {
            let outcome = match self.state {
                MpState::Preamble => self.step_preamble(brigade, table),
                MpState::AfterDelim => self.step_after_delim(brigade, table),
                MpState::PartHeaders => self.step_part_headers(brigade, table),
                MpState::PartBody => self.step_part_body(brigade, table),
                MpState::Nested => self.step_nested(brigade, table),
                MpState::Done => StepOutcome::Stop(self.status),
            };
            match outcome {
                StepOutcome::Continue => {}
                StepOutcome::Stop(status) => return status,
            }
        }
    }

    /// Fail terminally, flushing the in-progress part with the failure code.
    fn fail(&mut self, code: Status, table: &mut Table) -> Status {
        debug!(%code, depth = self.depth, "multipart parse failed");
        if let Some(part) = self.part.take() {
            self.insert_part(part, code, table);
        }
        self.state = MpState::Done;
        self.status = code;
        code
    }

    fn step_preamble(&mut self, brigade: &mut Brigade, table: &mut Table) -> StepOutcome {
        // The very first delimiter may appear at the start of the stream
        // without its leading CRLF.
        if !self.preamble_skipped {
            let lead = &self.delim[2..];
            let head = brigade.peek(lead.len());
            if head.len() == lead.len() {
                if &head[..] == lead {
                    brigade.consume(lead.len());
                    self.state = MpState::AfterDelim;
                    return StepOutcome::Continue;
                }
            } else if lead.starts_with(&head[..]) {
                if brigade.is_closed() {
                    return StepOutcome::Stop(self.fail(Status::BadData, table));
                }
                return StepOutcome::Stop(Status::Incomplete);
            }
        }
        match brigade.find_delim(&self.delim) {
            Some(off) => {
                brigade.consume(off + self.delim.len());
                self.preamble_skipped = true;
                self.state = MpState::AfterDelim;
                StepOutcome::Continue
            }
            None => {
                if brigade.is_closed() {
                    return StepOutcome::Stop(self.fail(Status::BadData, table));
                }
                // Keep only the tail that could still begin a delimiter.
                let keep = self.delim.len() - 1;
                if brigade.len() > keep {
                    brigade.consume(brigade.len() - keep);
                    self.preamble_skipped = true;
                }
                StepOutcome::Stop(Status::Incomplete)
            }
        }
    }

    fn step_after_delim(&mut self, brigade: &mut Brigade, table: &mut Table) -> StepOutcome {
        // Skip transport padding between the delimiter and its CRLF.
        while matches!(brigade.peek(1).first().copied(), Some(b' ' | b'\t')) {
            brigade.consume(1);
        }
        if brigade.len() < 2 {
            if brigade.is_closed() {
                return StepOutcome::Stop(self.fail(Status::BadData, table));
            }
            return StepOutcome::Stop(Status::Incomplete);
        }
        let two = brigade.peek(2);
        if &two[..] == b"--" {
            brigade.consume(2);
            debug!(parts = self.part_count, depth = self.depth, "multipart complete");
            self.state = MpState::Done;
            self.status = Status::Ok;
            return StepOutcome::Stop(Status::Ok);
        }
        if &two[..] == b"\r\n" {
            brigade.consume(2);
            self.state = MpState::PartHeaders;
            return StepOutcome::Continue;
        }
        StepOutcome::Stop(self.fail(Status::Mismatch, table))
    }

    fn step_part_headers(&mut self, brigade: &mut Brigade, table: &mut Table) -> StepOutcome {
        // A part whose header block is empty starts with a bare CRLF; it
        // cannot carry the mandatory Content-Disposition.
        if brigade.len() >= 2 {
            if &brigade.peek(2)[..] == b"\r\n" {
                brigade.consume(2);
                return StepOutcome::Stop(self.fail(Status::BadHeader, table));
            }
        } else if !brigade.is_closed() {
            return StepOutcome::Stop(Status::Incomplete);
        }
        let Some(off) = brigade.find_delim(b"\r\n\r\n") else {
            if brigade.len() > MAX_HEADER_BLOCK {
                warn!(depth = self.depth, "part header block over size cap");
                return StepOutcome::Stop(self.fail(Status::OverLimit, table));
            }
            if brigade.is_closed() {
                return StepOutcome::Stop(self.fail(Status::BadHeader, table));
            }
            return StepOutcome::Stop(Status::Incomplete);
        };

        let block = brigade.take(off);
        brigade.consume(4);
        let info = match self.parse_part_headers(&block) {
            Ok(info) => info,
            Err(code) => return StepOutcome::Stop(self.fail(code, table)),
        };
        match self.classify(&info) {
            Ok(Classified::Field { name }) => {
                trace!(depth = self.depth, "form field part started");
                self.part = Some(PartInProgress {
                    name,
                    info,
                    sink: Sink::Field(Vec::new()),
                });
                self.state = MpState::PartBody;
                StepOutcome::Continue
            }
            Ok(Classified::Upload {
                name,
                filename,
                content_type,
            }) => {
                if self.config.disable_uploads() {
                    warn!(depth = self.depth, "upload part rejected, uploads disabled");
                    return StepOutcome::Stop(self.fail(Status::OverLimit, table));
                }
                trace!(depth = self.depth, "upload part started");
                let spool = Spool::new(self.config.max_brigade_bytes(), self.config.temp_dir());
                self.part = Some(PartInProgress {
                    name,
                    info,
                    sink: Sink::Upload(Upload::new(filename, content_type, spool)),
                });
                self.state = MpState::PartBody;
                StepOutcome::Continue
            }
            Ok(Classified::Nested { boundary }) => {
                if self.depth >= self.config.max_nesting() {
                    warn!(depth = self.depth, "multipart nesting ceiling hit");
                    return StepOutcome::Stop(self.fail(Status::OverLimit, table));
                }
                debug!(depth = self.depth, "entering nested multipart part");
                self.nested = Some(Box::new(Self::with_depth(
                    self.config.clone(),
                    &boundary,
                    self.depth + 1,
                )));
                self.state = MpState::Nested;
                StepOutcome::Continue
            }
            Err(code) => StepOutcome::Stop(self.fail(code, table)),
        }
    }

    fn step_part_body(&mut self, brigade: &mut Brigade, table: &mut Table) -> StepOutcome {
        match brigade.find_delim(&self.delim) {
            Some(off) => {
                if off > 0 {
                    let chunk = brigade.take(off);
                    if let Err(code) = self.emit(&chunk) {
                        return StepOutcome::Stop(self.fail(code, table));
                    }
                }
                brigade.consume(self.delim.len());
                if let Some(part) = self.part.take() {
                    if self.part_count >= self.config.max_params() {
                        warn!(limit = self.config.max_params(), "multipart part limit hit");
                        return StepOutcome::Stop(self.fail(Status::OverLimit, table));
                    }
                    self.insert_part(part, Status::Ok, table);
                }
                self.state = MpState::AfterDelim;
                StepOutcome::Continue
            }
            None => {
                // Emit everything that cannot be part of a delimiter.
                let safe = brigade.len().saturating_sub(self.delim.len());
                if safe > 0 {
                    let chunk = brigade.take(safe);
                    if let Err(code) = self.emit(&chunk) {
                        return StepOutcome::Stop(self.fail(code, table));
                    }
                }
                if brigade.is_closed() {
                    return StepOutcome::Stop(self.fail(Status::BadData, table));
                }
                StepOutcome::Stop(Status::Incomplete)
            }
        }
    }

    fn step_nested(&mut self, brigade: &mut Brigade, table: &mut Table) -> StepOutcome {
        let Some(nested) = self.nested.as_mut() else {
            return StepOutcome::Stop(self.fail(Status::Generic, table));
        };
        match nested.feed(brigade, table) {
            Status::Ok => {
                self.nested = None;
                // Discard the inner epilogue up to our own delimiter.
                self.state = MpState::PartBody;
                StepOutcome::Continue
            }
            Status::Incomplete | Status::NoData => StepOutcome::Stop(Status::Incomplete),
            error => StepOutcome::Stop(self.fail(error, table)),
        }
    }

    /// Deliver a body chunk to the active part, running upload hooks first.
    fn emit(&mut self, chunk: &[u8]) -> Result<(), Status> {
        match &mut self.part {
            None => Ok(()),
            Some(part) => match &mut part.sink {
                Sink::Field(buf) => {
                    buf.extend_from_slice(chunk);
                    Ok(())
                }
                Sink::Upload(upload) => {
                    if !self.hooks.invoke(upload, chunk).is_ok() {
                        debug!("upload hook interrupted parsing");
                        return Err(Status::Interrupt);
                    }
                    match upload.write(chunk) {
                        Status::Ok => Ok(()),
                        code => Err(code),
                    }
                }
            },
        }
    }

    fn insert_part(&mut self, part: PartInProgress, status: Status, table: &mut Table) {
        if self.part_count >= self.config.max_params() {
            return;
        }
        let PartInProgress { name, info, sink } = part;
        let param = match sink {
            Sink::Field(value) => Param::new(name, value),
            Sink::Upload(mut upload) => {
                upload.set_status(status);
                let filename = Bytes::copy_from_slice(upload.filename());
                debug!(size = upload.size(), "upload part committed");
                Param::new(name, filename).with_upload(upload)
            }
        };
        table.insert(param.with_info(info).with_status(status));
        self.part_count += 1;
    }

    /// Split a header block into logical lines, unfolding continuations,
    /// and parse each into the part's header bag.
    fn parse_part_headers(&self, block: &[u8]) -> Result<Table, Status> {
        let mut lines: Vec<Vec<u8>> = Vec::new();
        let mut rest = block;
        loop {
            let (line, next) = match memchr::memmem::find(rest, b"\r\n") {
                Some(i) => (&rest[..i], Some(&rest[i + 2..])),
                None => (rest, None),
            };
            if let [b' ' | b'\t', ..] = line {
                // Folded continuation: replace the fold with a single SP.
                let Some(prev) = lines.last_mut() else {
                    return Err(Status::BadHeader);
                };
                let mut content = line;
                while let [b' ' | b'\t', tail @ ..] = content {
                    content = tail;
                }
                prev.push(b' ');
                prev.extend_from_slice(content);
            } else {
                lines.push(line.to_vec());
            }
            match next {
                Some(n) => rest = n,
                None => break,
            }
        }

        let mut bag = Table::new();
        for line in &lines {
            if line.is_empty() {
                continue;
            }
            if bag.len() as u32 >= self.config.max_headers() {
                warn!(limit = self.config.max_headers(), "part header limit hit");
                return Err(Status::OverLimit);
            }
            let (name, value) = parse_header_line(line)?;
            bag.insert(Param::new(name.to_vec(), value.to_vec()));
        }
        Ok(bag)
    }

    fn classify(&self, info: &Table) -> Result<Classified, Status> {
        let disposition = info.first("content-disposition").ok_or(Status::BadHeader)?;
        let disposition = parse_header_value(disposition.value())?;
        let name = disposition.attr("name").ok_or(Status::BadHeader)?;
        let name = Bytes::copy_from_slice(name);

        if let Some(ct) = info.first("content-type") {
            if let Ok(boundary) = extract_boundary(ct.value()) {
                return Ok(Classified::Nested { boundary });
            }
        }
        if let Some(filename) = disposition.attr("filename") {
            let content_type = info
                .first("content-type")
                .map(|p| Bytes::copy_from_slice(p.value()))
                .unwrap_or_default();
            return Ok(Classified::Upload {
                name,
                filename: Bytes::copy_from_slice(filename),
                content_type,
            });
        }
        Ok(Classified::Field { name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const BOUNDARY: &str = "AaB03x";

    fn simple_body() -> Vec<u8> {
        b"--AaB03x\r\n\
          Content-Disposition: form-data; name=\"foo\"\r\n\
          \r\n\
          bar\r\n\
          --AaB03x\r\n\
          Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
          Content-Type: text/plain\r\n\
          \r\n\
          contents of a.txt\r\n\
          --AaB03x--\r\n"
            .to_vec()
    }

    fn run(body: &[u8], boundary: &str, config: ParserConfig, chunk: usize) -> (Table, Status) {
        let mut parser = MultipartParser::new(config, boundary.as_bytes());
        run_with(&mut parser, body, chunk)
    }

    fn run_with(parser: &mut MultipartParser, body: &[u8], chunk: usize) -> (Table, Status) {
        let mut table = Table::new();
        let mut brigade = Brigade::new();
        if chunk == 0 {
            brigade.append_slice(body);
        } else {
            for piece in body.chunks(chunk) {
                brigade.append_slice(piece);
                let _ = parser.feed(&mut brigade, &mut table);
            }
        }
        brigade.close();
        let status = parser.feed(&mut brigade, &mut table);
        (table, status)
    }

    #[test]
    fn test_two_part_form() {
        let (table, status) = run(&simple_body(), BOUNDARY, ParserConfig::default(), 0);
        assert_eq!(status, Status::Ok);
        assert_eq!(table.len(), 2);

        let foo = table.first("foo").unwrap();
        assert_eq!(foo.value(), b"bar");
        assert_eq!(foo.status(), Status::Ok);
        assert!(foo.upload().is_none());
        assert_eq!(
            foo.info().unwrap().first("content-disposition").unwrap().value(),
            b"form-data; name=\"foo\""
        );

        let file = table.first("file").unwrap();
        assert_eq!(file.value(), b"a.txt");
        let upload = file.upload().unwrap();
        assert_eq!(upload.filename(), b"a.txt");
        assert_eq!(upload.content_type(), b"text/plain");
        assert_eq!(upload.size(), 17);
        assert_eq!(upload.status(), Status::Ok);
        assert_eq!(upload.spool().bytes(), Some(&b"contents of a.txt"[..]));
    }

    #[test]
    fn test_byte_at_a_time_matches_single_feed() {
        let body = simple_body();
        let (whole, whole_status) = run(&body, BOUNDARY, ParserConfig::default(), 0);
        let (chunked, chunked_status) = run(&body, BOUNDARY, ParserConfig::default(), 1);

        assert_eq!(chunked_status, whole_status);
        assert_eq!(chunked.len(), whole.len());
        for (a, b) in chunked.iter().zip(whole.iter()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.value(), b.value());
            assert_eq!(a.status(), b.status());
        }
        let upload = chunked.first("file").unwrap().upload().unwrap();
        assert_eq!(upload.spool().read_to_vec().unwrap(), b"contents of a.txt");
    }

    #[test]
    fn test_preamble_and_epilogue_ignored() {
        let mut body = b"This preamble is ignored by conforming readers.\r\n".to_vec();
        body.extend_from_slice(&simple_body());
        body.extend_from_slice(b"trailing epilogue junk");
        let (table, status) = run(&body, BOUNDARY, ParserConfig::default(), 7);
        assert_eq!(status, Status::Ok);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_body_never_contains_delimiter() {
        // A value full of near-delimiters must come through intact.
        let tricky = b"\r\n--AaB0--\r\n--AaB03 x\r\n-";
        let mut body = Vec::new();
        body.extend_from_slice(b"--AaB03x\r\nContent-Disposition: form-data; name=\"t\"\r\n\r\n");
        body.extend_from_slice(tricky);
        body.extend_from_slice(b"\r\n--AaB03x--\r\n");
        for chunk in [0, 1, 3] {
            let (table, status) = run(&body, BOUNDARY, ParserConfig::default(), chunk);
            assert_eq!(status, Status::Ok);
            assert_eq!(table.first("t").unwrap().value(), &tricky[..]);
        }
    }

    #[test]
    fn test_missing_name_is_badheader() {
        let body = b"--AaB03x\r\nContent-Disposition: form-data\r\n\r\nx\r\n--AaB03x--\r\n";
        let (_, status) = run(body, BOUNDARY, ParserConfig::default(), 0);
        assert_eq!(status, Status::BadHeader);
    }

    #[test]
    fn test_missing_disposition_is_badheader() {
        let body = b"--AaB03x\r\nContent-Type: text/plain\r\n\r\nx\r\n--AaB03x--\r\n";
        let (_, status) = run(body, BOUNDARY, ParserConfig::default(), 0);
        assert_eq!(status, Status::BadHeader);
    }

    #[test]
    fn test_folded_header_unfolds_to_single_space() {
        let body = b"--AaB03x\r\n\
            Content-Disposition: form-data;\r\n \t name=\"folded\"\r\n\
            \r\n\
            v\r\n\
            --AaB03x--\r\n";
        let (table, status) = run(body, BOUNDARY, ParserConfig::default(), 0);
        assert_eq!(status, Status::Ok);
        let p = table.first("folded").unwrap();
        assert_eq!(
            p.info().unwrap().first("content-disposition").unwrap().value(),
            b"form-data; name=\"folded\""
        );
    }

    #[test]
    fn test_disable_uploads() {
        let config = ParserConfig::new().with_disable_uploads(true);
        let (table, status) = run(&simple_body(), BOUNDARY, config, 0);
        assert_eq!(status, Status::OverLimit);
        // The field part before the upload was committed.
        assert_eq!(table.len(), 1);
        assert!(table.contains("foo"));
    }

    #[test]
    fn test_spool_spills_to_disk() {
        let config = ParserConfig::new().with_max_brigade_bytes(4);
        let (table, status) = run(&simple_body(), BOUNDARY, config, 0);
        assert_eq!(status, Status::Ok);
        let upload = table.first("file").unwrap().upload().unwrap();
        assert!(!upload.spool().in_memory());
        assert!(upload.spool().path().is_some());
        assert_eq!(upload.spool().read_to_vec().unwrap(), b"contents of a.txt");
    }

    #[test]
    fn test_upload_hook_sees_every_chunk_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut parser = MultipartParser::new(ParserConfig::default(), BOUNDARY.as_bytes());
        parser.add_hook(move |upload, chunk| {
            assert_eq!(upload.filename(), b"a.txt");
            sink.lock().unwrap().extend_from_slice(chunk);
            Status::Ok
        });
        let (_, status) = run_with(&mut parser, &simple_body(), 5);
        assert_eq!(status, Status::Ok);
        assert_eq!(&seen.lock().unwrap()[..], b"contents of a.txt");
    }

    #[test]
    fn test_hook_abort_interrupts_parser() {
        let mut parser = MultipartParser::new(ParserConfig::default(), BOUNDARY.as_bytes());
        parser.add_hook(|_, _| Status::Interrupt);
        let (table, status) = run_with(&mut parser, &simple_body(), 0);
        assert_eq!(status, Status::Interrupt);
        // The aborted part is committed carrying the interrupt status.
        let file = table.first("file").unwrap();
        assert_eq!(file.status(), Status::Interrupt);
        assert_eq!(file.upload().unwrap().status(), Status::Interrupt);
        // Sticky.
        let mut brigade = Brigade::new();
        brigade.append_slice(b"more");
        let mut table = Table::new();
        assert_eq!(parser.feed(&mut brigade, &mut table), Status::Interrupt);
        assert_eq!(brigade.len(), 4);
    }

    #[test]
    fn test_nested_multipart() {
        let body = b"--outer\r\n\
            Content-Disposition: form-data; name=\"files\"\r\n\
            Content-Type: multipart/mixed; boundary=inner\r\n\
            \r\n\
            --inner\r\n\
            Content-Disposition: form-data; name=\"a\"\r\n\
            \r\n\
            1\r\n\
            --inner--\r\n\
            \r\n--outer\r\n\
            Content-Disposition: form-data; name=\"b\"\r\n\
            \r\n\
            2\r\n\
            --outer--\r\n";
        for chunk in [0, 1, 11] {
            let (table, status) = run(body, "outer", ParserConfig::default(), chunk);
            assert_eq!(status, Status::Ok);
            assert_eq!(table.first("a").unwrap().value(), b"1");
            assert_eq!(table.first("b").unwrap().value(), b"2");
        }
    }

    #[test]
    fn test_nesting_ceiling() {
        let body = b"--outer\r\n\
            Content-Disposition: form-data; name=\"files\"\r\n\
            Content-Type: multipart/mixed; boundary=inner\r\n\
            \r\n\
            --inner--\r\n\
            \r\n--outer--\r\n";
        let config = ParserConfig::new().with_max_nesting(1);
        let (_, status) = run(body, "outer", config, 0);
        assert_eq!(status, Status::OverLimit);
    }

    #[test]
    fn test_truncated_stream_marks_partial_part() {
        let body = b"--AaB03x\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
            \r\n\
            partial conte";
        let (table, status) = run(body, BOUNDARY, ParserConfig::default(), 0);
        assert_eq!(status, Status::BadData);
        let file = table.first("file").unwrap();
        assert_eq!(file.status(), Status::BadData);
        assert_eq!(file.upload().unwrap().status(), Status::BadData);
    }

    #[test]
    fn test_body_over_byte_limit_keeps_earlier_parts() {
        // Generous enough for the first part, too small for the second.
        let config = ParserConfig::new().with_max_body_bytes(80);
        let (table, status) = run(&simple_body(), BOUNDARY, config.clone(), 0);
        assert_eq!(status, Status::OverLimit);
        assert_eq!(table.len(), 1);
        let foo = table.first("foo").unwrap();
        assert_eq!(foo.value(), b"bar");
        assert_eq!(foo.status(), Status::Ok);

        // Same outcome fed in read-block-sized pieces.
        let (chunked, chunked_status) = run(&simple_body(), BOUNDARY, config, 16);
        assert_eq!(chunked_status, Status::OverLimit);
        assert_eq!(chunked.len(), 1);
    }

    #[test]
    fn test_max_params_limits_part_count() {
        let config = ParserConfig::new().with_max_params(1);
        let (table, status) = run(&simple_body(), BOUNDARY, config, 0);
        assert_eq!(status, Status::OverLimit);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_garbage_without_boundary_is_baddata() {
        let (_, status) = run(b"no delimiters here at all", BOUNDARY, ParserConfig::default(), 0);
        assert_eq!(status, Status::BadData);
    }
}
