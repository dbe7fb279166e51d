use std::backtrace::Backtrace;
use std::fmt;
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Why a download failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    InvalidUrl,
    UnsupportedScheme,
    Connect,
    Timeout,
    /// Server answered with a non-success status
    Status,
    Body,
    TooLarge,
    File,
    Request,
}

impl FetchErrorKind {
    /// Category name reported as `exc_type`
    pub fn exc_type(&self) -> &'static str {
        match self {
            FetchErrorKind::InvalidUrl => "InvalidUrl",
            FetchErrorKind::UnsupportedScheme => "UnsupportedScheme",
            FetchErrorKind::Connect => "ConnectError",
            FetchErrorKind::Timeout => "TimeoutError",
            FetchErrorKind::Status => "HTTPError",
            FetchErrorKind::Body => "BodyError",
            FetchErrorKind::TooLarge => "PayloadTooLarge",
            FetchErrorKind::File => "FileError",
            FetchErrorKind::Request => "RequestError",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.exc_type())
    }
}

/// A failed download, with the trace captured where it happened
#[derive(Error, Debug)]
#[error("{message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    traceback: Vec<String>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let traceback = capture_traceback(kind, &message, None);
        FetchError {
            kind,
            message,
            traceback,
        }
    }

    /// Wrap an underlying error, keeping its source chain in the traceback
    pub fn with_source(kind: FetchErrorKind, source: &(dyn std::error::Error + 'static)) -> Self {
        let message = source.to_string();
        let traceback = capture_traceback(kind, &message, source.source());
        FetchError {
            kind,
            message,
            traceback,
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn exc_type(&self) -> &'static str {
        self.kind.exc_type()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn traceback(&self) -> &[String] {
        &self.traceback
    }
}

fn capture_traceback(
    kind: FetchErrorKind,
    message: &str,
    mut cause: Option<&(dyn std::error::Error + 'static)>,
) -> Vec<String> {
    let mut lines = vec![format!("{}: {}", kind.exc_type(), message)];

    while let Some(err) = cause {
        lines.push(format!("Caused by: {}", err));
        cause = err.source();
    }

    let backtrace = Backtrace::force_capture().to_string();
    lines.extend(
        backtrace
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string),
    );

    lines
}

/// Why the downloaded bytes could not be measured
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error while reading audio: {0}")]
    Io(String),

    #[error("Malformed audio stream: {0}")]
    Decode(String),

    #[error("Seek failed: {0}")]
    Seek(String),

    #[error("Unsupported audio: {0}")]
    Unsupported(String),

    #[error("Decoder limit reached: {0}")]
    Limit(String),

    #[error("Decoder requires a reset")]
    ResetRequired,

    #[error("No decodable audio track found")]
    NoAudioTrack,

    #[error("Sample rate is unknown")]
    UnknownSampleRate,

    #[error("Decoder panicked: {0}")]
    DecoderPanic(String),
}

impl DecodeError {
    /// Category name reported as `exc_type`
    pub fn exc_type(&self) -> &'static str {
        match self {
            DecodeError::Io(_) => "IoError",
            DecodeError::Decode(_) => "DecodeError",
            DecodeError::Seek(_) => "SeekError",
            DecodeError::Unsupported(_) => "UnsupportedError",
            DecodeError::Limit(_) => "LimitError",
            DecodeError::ResetRequired => "ResetRequired",
            DecodeError::NoAudioTrack => "NoAudioTrack",
            DecodeError::UnknownSampleRate => "UnknownSampleRate",
            DecodeError::DecoderPanic(_) => "DecoderPanic",
        }
    }
}

impl From<SymphoniaError> for DecodeError {
    fn from(err: SymphoniaError) -> Self {
        match err {
            SymphoniaError::IoError(e) => DecodeError::Io(e.to_string()),
            SymphoniaError::DecodeError(msg) => DecodeError::Decode(msg.to_string()),
            SymphoniaError::SeekError(kind) => DecodeError::Seek(format!("{:?}", kind)),
            SymphoniaError::Unsupported(msg) => DecodeError::Unsupported(msg.to_string()),
            SymphoniaError::LimitError(msg) => DecodeError::Limit(msg.to_string()),
            SymphoniaError::ResetRequired => DecodeError::ResetRequired,
        }
    }
}
