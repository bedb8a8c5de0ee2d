//! Incremental parser for `application/x-www-form-urlencoded` data.
//!
//! The parser is fed from a [`Brigade`] and commits one table entry per
//! `&`- or `;`-separated pair. It is fully resumable: a pair or percent
//! escape split across arbitrary chunk boundaries decodes identically to
//! the unsplit input.
//!
//! `+` decodes to a space in the value portion only; `%HH` decodes in both
//! portions. A `%` followed by a non-hex byte is `BadSeq`. A `%` (or `%H`)
//! at the end of the available input is `Incomplete` while the stream is
//! open and `BadSeq` once it is closed.

use tracing::{debug, trace};

use crate::brigade::Brigade;
use crate::config::ParserConfig;
use crate::param::Param;
use crate::status::Status;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlState {
    Key,
    Value,
}

/// Pending percent escape carried across chunk boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    /// Seen `%`.
    Start,
    /// Seen `%` and one hex digit.
    High(u8),
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Streaming `application/x-www-form-urlencoded` parser.
#[derive(Debug)]
pub struct UrlEncodedParser {
    config: ParserConfig,
    status: Status,
    state: UrlState,
    key: Vec<u8>,
    value: Vec<u8>,
    escape: Escape,
    bytes_seen: u64,
    saw_input: bool,
    pairs: u32,
}

impl UrlEncodedParser {
    /// Create a parser using the given limits.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            status: Status::Incomplete,
            state: UrlState::Key,
            key: Vec::new(),
            value: Vec::new(),
            escape: Escape::None,
            bytes_seen: 0,
            saw_input: false,
            pairs: 0,
        }
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

    /// Consume available input, appending completed pairs to `table`.
    ///
    /// Returns `Ok` once the brigade is closed and fully consumed,
    /// `Incomplete` when starved, `NoData` when called with nothing
    /// buffered on an open brigade, and an error code on malformed input
    /// or limit violation. Terminal statuses are sticky.
    pub fn feed(&mut self, brigade: &mut Brigade, table: &mut Table) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }
        if brigade.is_empty() && !brigade.is_closed() {
            return Status::NoData;
        }

        let budget = self.config.max_body_bytes().saturating_sub(self.bytes_seen);
        let over_budget = brigade.len() as u64 > budget;
        let mut allowed = budget.min(brigade.len() as u64) as usize;

        while allowed > 0 {
            let chunk = brigade.take(allowed.min(self.config.read_block_size() as usize));
            allowed -= chunk.len();
            self.bytes_seen += chunk.len() as u64;
            self.saw_input = true;
            for &b in chunk.iter() {
                if let Err(status) = self.step(b, table) {
                    debug!(%status, pairs = self.pairs, "urlencoded parse failed");
                    self.status = status;
                    return self.status;
                }
            }
        }

        if over_budget {
            debug!(
                limit = self.config.max_body_bytes(),
                "urlencoded body over byte limit"
            );
            self.status = Status::OverLimit;
        } else if brigade.is_closed() && brigade.is_empty() {
            self.status = self.finish(table);
        } else {
            self.status = Status::Incomplete;
        }
        self.status
    }

    fn step(&mut self, b: u8, table: &mut Table) -> Result<(), Status> {
        match self.escape {
            Escape::Start => match hex_value(b) {
                Some(high) => self.escape = Escape::High(high),
                None => return Err(Status::BadSeq),
            },
            Escape::High(high) => match hex_value(b) {
                Some(low) => {
                    self.push_decoded((high << 4) | low);
                    self.escape = Escape::None;
                }
                None => return Err(Status::BadSeq),
            },
            Escape::None => match b {
                b'%' => self.escape = Escape::Start,
                b'&' | b';' => self.commit_pair(table)?,
                b'=' if self.state == UrlState::Key => self.state = UrlState::Value,
                b'+' if self.state == UrlState::Value => self.value.push(b' '),
                _ => self.push_decoded(b),
            },
        }
        Ok(())
    }

    fn push_decoded(&mut self, b: u8) {
        match self.state {
            UrlState::Key => self.key.push(b),
            UrlState::Value => self.value.push(b),
        }
    }

    fn commit_pair(&mut self, table: &mut Table) -> Result<(), Status> {
        if self.pairs >= self.config.max_params() {
            debug!(limit = self.config.max_params(), "urlencoded pair limit hit");
            return Err(Status::OverLimit);
        }
        let key = std::mem::take(&mut self.key);
        let value = std::mem::take(&mut self.value);
        trace!(key_len = key.len(), value_len = value.len(), "pair committed");
        table.insert(Param::new(key, value));
        self.pairs += 1;
        self.state = UrlState::Key;
        Ok(())
    }

    /// End of stream: flush the final pair and settle the status.
    fn finish(&mut self, table: &mut Table) -> Status {
        if self.escape != Escape::None {
            // A percent escape was cut off by end of stream.
            return Status::BadSeq;
        }
        if self.saw_input {
            if let Err(status) = self.commit_pair(table) {
                return status;
            }
        }
        debug!(pairs = self.pairs, "urlencoded body complete");
        Status::Ok
    }
}

/// Parse a complete query string in one call.
///
/// Convenience wrapper used for query-string parsing, where the full byte
/// string is already in hand.
pub fn parse_query_string(query: &[u8], config: &ParserConfig, table: &mut Table) -> Status {
    let mut parser = UrlEncodedParser::new(config.clone());
    let mut brigade = Brigade::new();
    brigade.append_slice(query);
    brigade.close();
    parser.feed(&mut brigade, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> (Table, Status) {
        let mut table = Table::new();
        let status = parse_query_string(input, &ParserConfig::default(), &mut table);
        (table, status)
    }

    #[test]
    fn test_basic_pairs_with_duplicates() {
        let (t, status) = parse(b"a=1&b=2&a=3");
        assert_eq!(status, Status::Ok);
        assert_eq!(t.len(), 3);
        assert_eq!(t.first("a").unwrap().value(), b"1");
        let all: Vec<_> = t.all("a").map(|p| p.value().to_vec()).collect();
        assert_eq!(all, vec![b"1".to_vec(), b"3".to_vec()]);
        assert_eq!(t.first("b").unwrap().value(), b"2");
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        let (t, status) = parse(b"name=Hello%20World&q=a+b");
        assert_eq!(status, Status::Ok);
        assert_eq!(t.first("name").unwrap().value(), b"Hello World");
        assert_eq!(t.first("q").unwrap().value(), b"a b");
    }

    #[test]
    fn test_plus_is_literal_in_key() {
        let (t, status) = parse(b"a+b=c+d");
        assert_eq!(status, Status::Ok);
        assert_eq!(t.first("a+b").unwrap().value(), b"c d");
    }

    #[test]
    fn test_percent_decodes_in_key() {
        let (t, _) = parse(b"a%26b=1");
        assert_eq!(t.first("a&b").unwrap().value(), b"1");
    }

    #[test]
    fn test_semicolon_separator() {
        let (t, status) = parse(b"a=1;b=2");
        assert_eq!(status, Status::Ok);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_bad_escape_commits_earlier_pairs() {
        let (t, status) = parse(b"name=Hello%20World&x=%ZZ");
        assert_eq!(status, Status::BadSeq);
        assert_eq!(t.len(), 1);
        assert_eq!(t.first("name").unwrap().value(), b"Hello World");
        assert!(t.first("x").is_none());
    }

    #[test]
    fn test_entry_count_matches_separators() {
        // Every separator commits a pair, even an empty one.
        let (t, status) = parse(b"a=1&&b=2&");
        assert_eq!(status, Status::Ok);
        assert_eq!(t.len(), 4);
        assert_eq!(t.get(1).unwrap().name(), b"");
        assert_eq!(t.get(3).unwrap().name(), b"");
    }

    #[test]
    fn test_empty_input_produces_no_entries() {
        let (t, status) = parse(b"");
        assert_eq!(status, Status::Ok);
        assert!(t.is_empty());
    }

    #[test]
    fn test_key_without_value() {
        let (t, status) = parse(b"flag");
        assert_eq!(status, Status::Ok);
        assert_eq!(t.first("flag").unwrap().value(), b"");
    }

    #[test]
    fn test_trailing_percent_at_eos_is_badseq() {
        let (_, status) = parse(b"a=1%");
        assert_eq!(status, Status::BadSeq);
        let (_, status) = parse(b"a=1%4");
        assert_eq!(status, Status::BadSeq);
    }

    #[test]
    fn test_incomplete_escape_resumes_across_chunks() {
        let mut parser = UrlEncodedParser::new(ParserConfig::default());
        let mut table = Table::new();
        let mut brigade = Brigade::new();

        brigade.append_slice(b"a=%4");
        assert_eq!(parser.feed(&mut brigade, &mut table), Status::Incomplete);
        brigade.append_slice(b"1");
        brigade.close();
        assert_eq!(parser.feed(&mut brigade, &mut table), Status::Ok);
        assert_eq!(table.first("a").unwrap().value(), b"A");
    }

    #[test]
    fn test_nodata_on_empty_open_brigade() {
        let mut parser = UrlEncodedParser::new(ParserConfig::default());
        let mut table = Table::new();
        let mut brigade = Brigade::new();
        assert_eq!(parser.feed(&mut brigade, &mut table), Status::NoData);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut parser = UrlEncodedParser::new(ParserConfig::default());
        let mut table = Table::new();
        let mut brigade = Brigade::new();
        brigade.append_slice(b"x=%Q");
        assert_eq!(parser.feed(&mut brigade, &mut table), Status::BadSeq);
        brigade.append_slice(b"rest=fine");
        assert_eq!(parser.feed(&mut brigade, &mut table), Status::BadSeq);
        assert!(table.is_empty());
    }

    #[test]
    fn test_max_params_overlimit() {
        let config = ParserConfig::new().with_max_params(2);
        let mut table = Table::new();
        let status = parse_query_string(b"a=1&b=2&c=3", &config, &mut table);
        assert_eq!(status, Status::OverLimit);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_max_body_bytes_overlimit() {
        let config = ParserConfig::new().with_max_body_bytes(7);
        let mut table = Table::new();
        let status = parse_query_string(b"a=1&b=22", &config, &mut table);
        assert_eq!(status, Status::OverLimit);
        // The pair completed inside the budget is kept.
        assert_eq!(table.len(), 1);
        assert_eq!(table.first("a").unwrap().value(), b"1");
    }

    #[test]
    fn test_charset_and_taint() {
        let (t, _) = parse(b"u=%C3%A9&bad=%FF");
        assert!(!t.first("u").unwrap().is_tainted());
        assert!(t.first("bad").unwrap().is_tainted());
    }

    #[test]
    fn test_chunked_equals_unchunked() {
        let input = b"first=one&second=t%77o;third=a+b%25";
        let (whole, whole_status) = parse(input);

        let mut parser = UrlEncodedParser::new(ParserConfig::default());
        let mut table = Table::new();
        let mut brigade = Brigade::new();
        for &b in input.iter() {
            brigade.append_slice(&[b]);
            let _ = parser.feed(&mut brigade, &mut table);
        }
        brigade.close();
        let status = parser.feed(&mut brigade, &mut table);

        assert_eq!(status, whole_status);
        assert_eq!(table.len(), whole.len());
        for (a, b) in table.iter().zip(whole.iter()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.value(), b.value());
        }
    }
}
