//! Error types.
//!
//! Two families live here:
//!
//! - [`Error`] surfaces infrastructure failures of the transport: binding to
//!   a port, accepting a connection, a malformed listen address.
//! - [`ApiError`] is the structured, request-time error a handler (or the
//!   pipeline itself) turns into an HTTP error payload. It never escapes the
//!   pipeline as a Rust error; it always becomes a response.
//!
//! Registration-time failures have their own type,
//! [`RegistryError`](crate::RegistryError), next to the registry.

use serde::Serialize;
use tracing::{Level, event};

use crate::response::Response;
use crate::status::Status;

/// Numeric diagnostic codes carried in error payloads emitted by the pipeline.
pub mod codes {
    /// Generic malformed request.
    pub const BAD_REQUEST: i64 = 4_000_000_000;
    /// The request target does not follow `/v<N>/<entity>[/...]`.
    pub const BAD_REQUEST_SYNTAX: i64 = 4_000_000_001;
    /// No route is bound for the method and path.
    pub const NOT_FOUND: i64 = 4_040_000_404;
    /// The transport received a method outside RFC 9110.
    pub const METHOD_NOT_ALLOWED: i64 = 4_050_000_405;
    /// A handler finished without producing a response.
    pub const INVALID_HANDLER_RESPONSE: i64 = 2_302_586_595;
    /// The pipeline ended without any stage writing a response.
    pub const NO_RESPONSE: i64 = 5_000_000_000;
    /// A success payload could not be serialized.
    pub const PAYLOAD_SERIALIZATION: i64 = 5_000_000_001;
}

// ── Transport errors ──────────────────────────────────────────────────────────

/// The error type returned by the server's fallible operations.
///
/// Application-level errors (404, 401, etc.) are expressed as HTTP
/// [`Response`] values, not as `Error`s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// ── Request-time errors ───────────────────────────────────────────────────────

/// How loudly an [`ApiError`] is logged when the pipeline emits it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    #[default]
    Error,
    Critical,
}

/// A structured request-time error: HTTP status, numeric diagnostic code,
/// human-readable message and log severity.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{status} [{code}] {message}")]
pub struct ApiError {
    status: u16,
    code: i64,
    message: String,
    severity: Severity,
}

impl ApiError {
    pub fn new(status: impl Into<u16>, code: i64, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            code,
            message: message.into(),
            severity: Severity::default(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// `400 Bad Request`.
    pub fn bad_request(code: i64, message: impl Into<String>) -> Self {
        Self::new(Status::BadRequest, code, message).with_severity(Severity::Info)
    }

    /// `401 Unauthorized`.
    pub fn unauthorized(code: i64, message: impl Into<String>) -> Self {
        Self::new(Status::Unauthorized, code, message).with_severity(Severity::Info)
    }

    /// `404 Not Found`.
    pub fn not_found(code: i64, message: impl Into<String>) -> Self {
        Self::new(Status::NotFound, code, message).with_severity(Severity::Info)
    }

    /// `500 Internal Server Error`.
    pub fn internal(code: i64, message: impl Into<String>) -> Self {
        Self::new(Status::InternalServerError, code, message)
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn code(&self) -> i64 { self.code }
    pub fn message(&self) -> &str { &self.message }
    pub fn severity(&self) -> Severity { self.severity }

    /// Emits a `tracing` event at the level matching [`severity`](Self::severity).
    pub(crate) fn log(&self) {
        macro_rules! emit {
            ($level:expr) => {
                event!(
                    $level,
                    status = self.status,
                    code = self.code,
                    reason = %self.message,
                    severity = ?self.severity,
                    "request failed"
                )
            };
        }
        match self.severity {
            Severity::Debug => emit!(Level::DEBUG),
            Severity::Info => emit!(Level::INFO),
            Severity::Warn => emit!(Level::WARN),
            Severity::Error | Severity::Critical => emit!(Level::ERROR),
        }
    }

    /// Renders the error as a JSON error payload at its status.
    pub fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorInfo { code: self.code, message: &self.message },
        };
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Response::builder().status_code(self.status).json(bytes)
    }
}

/// Error payload wire shape: `{"error": {"code": N, "message": "..."}}`.
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorInfo<'a>,
}

#[derive(Serialize)]
struct ErrorInfo<'a> {
    code: i64,
    message: &'a str,
}
