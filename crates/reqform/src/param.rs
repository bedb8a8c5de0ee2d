//! Parsed parameter values and their charset classification.

use bytes::Bytes;

use crate::spool::Upload;
use crate::status::Status;
use crate::table::Table;

/// Character encoding attributed to a decoded byte string.
///
/// Detection is structural: pure seven-bit input is `Ascii`, input that
/// validates as UTF-8 is `Utf8`, anything else is `Unknown`. `Latin1` and
/// `Cp1252` cannot be detected (every byte sequence is valid in both);
/// callers that know the encoding out of band declare it with
/// [`Param::with_charset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// Seven-bit ASCII.
    Ascii,
    /// Valid UTF-8.
    #[default]
    Utf8,
    /// ISO-8859-1, declared by the caller.
    Latin1,
    /// Windows-1252, declared by the caller.
    Cp1252,
    /// Not validated as any known encoding.
    Unknown,
}

impl Charset {
    /// Classify a byte string.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.iter().all(|&b| b < 0x80) {
            Charset::Ascii
        } else if std::str::from_utf8(bytes).is_ok() {
            Charset::Utf8
        } else {
            Charset::Unknown
        }
    }

    /// True when `bytes` are valid in this encoding. Every byte sequence
    /// is valid `Latin1` and `Cp1252`; nothing is valid `Unknown`.
    #[must_use]
    pub fn validates(self, bytes: &[u8]) -> bool {
        match self {
            Charset::Ascii => bytes.iter().all(|&b| b < 0x80),
            Charset::Utf8 => std::str::from_utf8(bytes).is_ok(),
            Charset::Latin1 | Charset::Cp1252 => true,
            Charset::Unknown => false,
        }
    }
}

/// One parsed parameter: a name, a value, and optional part metadata.
///
/// Parameters are immutable once inserted into a [`Table`]; the parsers
/// construct them, downstream code only reads them.
#[derive(Debug)]
pub struct Param {
    name: Bytes,
    value: Bytes,
    charset: Charset,
    tainted: bool,
    info: Option<Table>,
    upload: Option<Upload>,
    status: Status,
}

impl Param {
    /// Build a parameter, classifying the value's charset.
    ///
    /// Both the name and the value bytes are detected; the parameter is
    /// tainted when either fails to validate as any known charset.
    #[must_use]
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        let name = name.into();
        let value = value.into();
        let charset = Charset::detect(&value);
        let tainted = charset == Charset::Unknown || Charset::detect(&name) == Charset::Unknown;
        Self {
            name,
            value,
            charset,
            tainted,
            info: None,
            upload: None,
            status: Status::Ok,
        }
    }

    /// Declare the value's encoding out of band, overriding detection.
    ///
    /// The taint flag is recomputed against the declared encoding: the
    /// parameter is tainted when the value does not validate as `charset`
    /// or the name does not validate as any known charset.
    #[must_use]
    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self.tainted =
            !charset.validates(&self.value) || Charset::detect(&self.name) == Charset::Unknown;
        self
    }

    pub(crate) fn with_info(mut self, info: Table) -> Self {
        self.info = Some(info);
        self
    }

    pub(crate) fn with_upload(mut self, upload: Upload) -> Self {
        self.upload = Some(upload);
        self
    }

    pub(crate) fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Parameter name, original casing preserved.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Parameter name as UTF-8, when it is valid UTF-8.
    #[must_use]
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// Decoded value bytes.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Decoded value as UTF-8, when it is valid UTF-8.
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Charset attributed to the value.
    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// True when the value bytes were not validated as the claimed charset.
    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Header bag of the multipart part this parameter came from, if any.
    #[must_use]
    pub fn info(&self) -> Option<&Table> {
        self.info.as_ref()
    }

    /// Upload handle, when the parameter is a file part.
    #[must_use]
    pub fn upload(&self) -> Option<&Upload> {
        self.upload.as_ref()
    }

    /// Per-parameter status: `Ok` for fully parsed entries, the parser's
    /// failure code for entries committed while truncated.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }
}
