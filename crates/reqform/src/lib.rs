//! Incremental parsing of HTTP client-request data.
//!
//! This crate parses the data a server-side application receives from a
//! client (cookies, URL-encoded query strings and bodies,
//! `multipart/form-data` bodies with file uploads, and structured header
//! values) without ever requiring the full input up front.
//!
//! # Features
//!
//! - Pull-based incremental parsers: input arrives in arbitrary chunks
//!   through a segmented byte queue, parsers report `Incomplete` when
//!   starved and never block
//! - Insertion-ordered parameter tables with case-insensitive lookup and
//!   duplicate names preserved
//! - Upload spooling: file parts buffer in memory and spill to uniquely
//!   named temp files past a configurable threshold, with a per-chunk
//!   hook chain for progress tracking or cancellation
//! - Strict, configurable limits on body size, parameter count, header
//!   count and multipart nesting depth; limit violations and malformed
//!   input are sticky per-parser statuses
//! - RFC 2109 and Netscape cookie parsing and serialization
//!
//! # Example
//!
//! ```
//! use reqform::{ParserConfig, Request};
//!
//! let mut req = Request::new(ParserConfig::default())
//!     .with_query_string(&b"user=alice&page=2"[..])
//!     .with_content_type(&b"application/x-www-form-urlencoded"[..]);
//! req.feed_body(b"comment=hello+world");
//! req.finish_body();
//!
//! assert_eq!(req.args().first("user").unwrap().value(), b"alice");
//! let body = req.body().unwrap();
//! assert_eq!(body.first("comment").unwrap().value(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

pub mod brigade;
pub mod config;
pub mod cookie;
pub mod header;
pub mod multipart;
pub mod param;
pub mod parser;
pub mod request;
pub mod spool;
pub mod status;
pub mod table;
pub mod urlencoded;

pub use brigade::Brigade;
pub use config::{
    ParserConfig, DEFAULT_MAX_BRIGADE_BYTES, DEFAULT_MAX_HEADERS, DEFAULT_MAX_NESTING,
    DEFAULT_MAX_PARAMS, DEFAULT_READ_BLOCK_SIZE,
};
pub use cookie::{parse_cookie_header, parse_set_cookie, Cookie, Version};
pub use header::{
    extract_boundary, parse_header_line, parse_header_value, HeaderValue, MAX_BOUNDARY_LEN,
};
pub use multipart::MultipartParser;
pub use param::{Charset, Param};
pub use parser::{BodyParser, HookChain, UploadHook};
pub use request::Request;
pub use spool::{Spool, Upload};
pub use status::{ParseError, Status};
pub use table::Table;
pub use urlencoded::{parse_query_string, UrlEncodedParser};
