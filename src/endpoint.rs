//! Request-target parsing.
//!
//! Before resolution, the pipeline asks a [`PathParser`] to classify the raw
//! target. The default, [`VersionedPathParser`], accepts
//! `{base}/v<N>/<entity>[/...]` and rejects everything else as a client
//! error, so malformed targets never reach the route trees.

use crate::error::{ApiError, codes};
use crate::method::Method;
use crate::route::segments;
use crate::status::Status;

/// The parsed request target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub method: Method,
    /// Version digits in canonical form, e.g. `"1"` for `/v1/...`.
    pub version: String,
    pub entity: String,
    /// The last path segment after the entity, or empty. Once a route is
    /// resolved the pipeline replaces it with the route's own action.
    pub action: String,
}

/// A classified path-parse failure.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PathError {
    /// The client sent a target that cannot be served (400 or 404).
    #[error("client error: {0}")]
    Client(ApiError),
    /// Parsing itself failed (500).
    #[error("server error: {0}")]
    Server(ApiError),
}

impl PathError {
    pub fn error(&self) -> &ApiError {
        match self {
            Self::Client(e) | Self::Server(e) => e,
        }
    }

    pub fn into_error(self) -> ApiError {
        match self {
            Self::Client(e) | Self::Server(e) => e,
        }
    }
}

/// Converts a raw request target into an [`Endpoint`].
pub trait PathParser: Send + Sync + 'static {
    fn parse(&self, method: Method, path: &str) -> Result<Endpoint, PathError>;

    /// The part of `path` the route trees are keyed on. Only called after
    /// [`parse`](Self::parse) succeeded.
    fn route_path<'p>(&self, path: &'p str) -> &'p str {
        path
    }
}

/// Parses `{base_path}/v<N>/<entity>[/...]`.
#[derive(Clone, Debug, Default)]
pub struct VersionedPathParser {
    base_path: String,
}

impl VersionedPathParser {
    /// `base_path` is either empty or starts with `/`; a trailing `/` is
    /// ignored.
    pub fn new(base_path: &str) -> Self {
        Self { base_path: base_path.trim_end_matches('/').to_owned() }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    fn strip_base<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = path.strip_prefix(self.base_path.as_str())?;
        // `/apifoo` must not match base `/api`.
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl PathParser for VersionedPathParser {
    fn parse(&self, method: Method, path: &str) -> Result<Endpoint, PathError> {
        let rest = self.strip_base(path).ok_or_else(|| {
            PathError::Client(ApiError::not_found(codes::NOT_FOUND, Status::NotFound.line()))
        })?;

        let syntax = |detail: &str| {
            PathError::Client(ApiError::bad_request(
                codes::BAD_REQUEST_SYNTAX,
                format!("{}: Syntax Error: {detail}", Status::BadRequest.line()),
            ))
        };

        let mut parts = segments(rest);
        let version = parts
            .next()
            .and_then(|seg| seg.strip_prefix('v'))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| syntax("expected a `v<N>` version segment"))?;
        // Routes are bound under canonical `v<N>` only.
        if version.starts_with('0') {
            return Err(syntax("version must not have leading zeros"));
        }
        if version.parse::<u16>().is_err() {
            return Err(syntax("version out of range"));
        }

        let entity = parts.next().ok_or_else(|| syntax("missing entity segment"))?;
        let action = parts.last().unwrap_or_default();

        Ok(Endpoint {
            method,
            version: version.to_owned(),
            entity: entity.to_owned(),
            action: action.to_owned(),
        })
    }

    fn route_path<'p>(&self, path: &'p str) -> &'p str {
        self.strip_base(path).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_target() {
        let parser = VersionedPathParser::default();
        let ep = parser.parse(Method::Get, "/v1/widget/42/list").unwrap();
        assert_eq!(
            ep,
            Endpoint {
                method: Method::Get,
                version: "1".to_owned(),
                entity: "widget".to_owned(),
                action: "list".to_owned(),
            }
        );
        assert_eq!(parser.parse(Method::Get, "/v2/widget").unwrap().action, "");
    }

    #[test]
    fn strips_base_path() {
        let parser = VersionedPathParser::new("/api/");
        assert_eq!(parser.base_path(), "/api");
        assert_eq!(parser.parse(Method::Get, "/api/v1/widget").unwrap().entity, "widget");
        assert_eq!(parser.route_path("/api/v1/widget"), "/v1/widget");
    }

    #[test]
    fn foreign_prefix_is_not_found() {
        let parser = VersionedPathParser::new("/api");
        for path in ["/other/v1/widget", "/apifoo/v1/widget"] {
            let err = parser.parse(Method::Get, path).unwrap_err();
            assert!(matches!(err, PathError::Client(_)));
            assert_eq!(err.error().status(), 404);
            assert_eq!(err.error().code(), codes::NOT_FOUND);
        }
    }

    #[test]
    fn malformed_targets_are_bad_requests() {
        let parser = VersionedPathParser::default();
        for path in ["/", "/widget/list", "/v/widget", "/vx/widget", "/v1", "/v0/widget", "/v01/widget", "/v70000/widget"] {
            let err = parser.parse(Method::Get, path).unwrap_err();
            assert_eq!(err.error().status(), 400, "{path}");
            assert_eq!(err.error().code(), codes::BAD_REQUEST_SYNTAX, "{path}");
        }
    }
}
