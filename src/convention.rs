//! The capability naming convention.
//!
//! A capability name encodes everything needed to route it:
//!
//! ```text
//! [Auth] <Verb>Handler V<digits> [Action]
//!
//! GetHandlerV1List          → GET    v1  "list"
//! AuthPostHandlerV2Create   → POST   v2  "create"  (auth required)
//! DeleteHandlerV003         → DELETE v3  ""        (default action)
//! ```
//!
//! [`parse`] is a pure function; it never touches a registry. Controllers
//! that prefer not to encode routing in strings declare a [`Convention`]
//! directly with [`Convention::new`], which carries the same data. Declared
//! conventions go through [`Convention::validate`] at registration, so both
//! styles obey the same version and action rules.

use std::fmt;

use crate::method::Method;

/// Leading marker on auth-required capability names.
pub const AUTH_MARKER: &str = "Auth";

/// Substring every route capability name contains. Names without it are
/// helpers, not routes.
pub const HANDLER_KEYWORD: &str = "Handler";

/// The six CRUD verbs a capability can map to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    /// read
    Get,
    /// create
    Post,
    /// replace
    Put,
    Delete,
    /// partial update
    Patch,
    /// existence check
    Head,
}

impl Verb {
    /// Prefix match order. The prefixes are mutually exclusive, so the order
    /// only fixes which check runs first.
    pub const ALL: [Verb; 6] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Delete,
        Verb::Patch,
        Verb::Head,
    ];

    pub fn method(self) -> Method {
        match self {
            Self::Get    => Method::Get,
            Self::Post   => Method::Post,
            Self::Put    => Method::Put,
            Self::Delete => Method::Delete,
            Self::Patch  => Method::Patch,
            Self::Head   => Method::Head,
        }
    }

    /// The name prefix for this verb, e.g. `"GetHandler"`.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Get    => "GetHandler",
            Self::Post   => "PostHandler",
            Self::Put    => "PutHandler",
            Self::Delete => "DeleteHandler",
            Self::Patch  => "PatchHandler",
            Self::Head   => "HeadHandler",
        }
    }
}

/// Why a capability name is not a route.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("name does not contain `Handler`")]
    MissingKeyword,

    #[error("name does not start with a known verb prefix")]
    UnknownVerb,

    #[error("expected `V<digits><Action>` after the verb prefix, found `{0}`")]
    MalformedVersion(String),

    #[error("version `{0}` is outside 1..=65535")]
    VersionOutOfRange(String),

    #[error("action `{0}` contains characters not allowed in a path segment")]
    InvalidAction(String),
}

/// Routing data derived from (or declared instead of) a capability name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Convention {
    pub verb: Verb,
    pub version: u16,
    /// Lower-cased; empty for the default action.
    pub action: String,
    pub requires_auth: bool,
}

impl Convention {
    /// Declares a route without a name string. The action is lower-cased.
    pub fn new(verb: Verb, version: u16, action: &str) -> Self {
        Self {
            verb,
            version,
            action: action.to_lowercase(),
            requires_auth: false,
        }
    }

    /// Marks the route as auth-required.
    #[must_use]
    pub fn auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn method(&self) -> Method {
        self.verb.method()
    }

    /// Checks the rules a parsed name obeys: version `1..=65535`, action
    /// limited to `[a-z0-9_-]`.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.version == 0 {
            return Err(ParseError::VersionOutOfRange(self.version.to_string()));
        }
        check_action(&self.action)
    }

    /// The canonical capability name for this convention, e.g.
    /// `AuthPostHandlerV2Create`. Used as the diagnostic handler label for
    /// declared capabilities.
    pub fn handler_name(&self) -> String {
        let auth = if self.requires_auth { AUTH_MARKER } else { "" };
        let mut action = self.action.chars();
        let action = match action.next() {
            Some(first) => first.to_uppercase().chain(action).collect(),
            None => String::new(),
        };
        format!("{auth}{}V{}{action}", self.verb.prefix(), self.version)
    }

    /// `/v{N}/{entity}[/{action}]`
    pub fn collection_path(&self, entity: &str) -> String {
        self.path_with(entity, None)
    }

    /// `/v{N}/{entity}/:id[/{action}]`
    pub fn member_path(&self, entity: &str) -> String {
        self.path_with(entity, Some(":id"))
    }

    fn path_with(&self, entity: &str, param: Option<&str>) -> String {
        let mut path = format!("/v{}/{entity}", self.version);
        if let Some(param) = param {
            path.push('/');
            path.push_str(param);
        }
        if !self.action.is_empty() {
            path.push('/');
            path.push_str(&self.action);
        }
        path
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.handler_name())
    }
}

/// Parses a capability name into its [`Convention`].
pub fn parse(name: &str) -> Result<Convention, ParseError> {
    if !name.contains(HANDLER_KEYWORD) {
        return Err(ParseError::MissingKeyword);
    }

    let (requires_auth, rest) = match name.strip_prefix(AUTH_MARKER) {
        Some(rest) => (true, rest),
        None => (false, name),
    };

    let (verb, rest) = Verb::ALL
        .iter()
        .find_map(|verb| rest.strip_prefix(verb.prefix()).map(|rest| (*verb, rest)))
        .ok_or(ParseError::UnknownVerb)?;

    let (version, action) = parse_version_action(rest)?;

    Ok(Convention { verb, version, action, requires_auth })
}

/// `V<digits><Action>` → (version, lower-cased action).
fn parse_version_action(s: &str) -> Result<(u16, String), ParseError> {
    let malformed = || ParseError::MalformedVersion(s.to_owned());

    let body = s.strip_prefix('V').ok_or_else(malformed)?;
    let digits_end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    if digits_end == 0 {
        return Err(malformed());
    }
    let (digits, action) = body.split_at(digits_end);

    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Err(ParseError::VersionOutOfRange(digits.to_owned()));
    }
    let version = trimmed
        .parse::<u16>()
        .map_err(|_| ParseError::VersionOutOfRange(digits.to_owned()))?;

    let action = action.to_lowercase();
    check_action(&action)?;

    Ok((version, action))
}

fn check_action(action: &str) -> Result<(), ParseError> {
    if action.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(ParseError::InvalidAction(action.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_get() {
        let c = parse("GetHandlerV1List").unwrap();
        assert_eq!(c, Convention::new(Verb::Get, 1, "list"));
        assert_eq!(c.collection_path("widget"), "/v1/widget/list");
        assert_eq!(c.member_path("widget"), "/v1/widget/:id/list");
    }

    #[test]
    fn parses_auth_marker() {
        let c = parse("AuthPostHandlerV2Create").unwrap();
        assert!(c.requires_auth);
        assert_eq!(c.method(), Method::Post);
        assert_eq!(c.version, 2);
        assert_eq!(c.action, "create");
    }

    #[test]
    fn maps_every_verb() {
        let cases = [
            ("GetHandlerV1", Method::Get),
            ("PostHandlerV1", Method::Post),
            ("PutHandlerV1", Method::Put),
            ("DeleteHandlerV1", Method::Delete),
            ("PatchHandlerV1", Method::Patch),
            ("HeadHandlerV1", Method::Head),
        ];
        for (name, method) in cases {
            assert_eq!(parse(name).unwrap().method(), method, "{name}");
        }
    }

    #[test]
    fn empty_action_is_the_default_route() {
        let c = parse("DeleteHandlerV3").unwrap();
        assert_eq!(c.action, "");
        assert_eq!(c.collection_path("widget"), "/v3/widget");
        assert_eq!(c.member_path("widget"), "/v3/widget/:id");
    }

    #[test]
    fn leading_zeros_normalize() {
        for name in ["GetHandlerV01List", "GetHandlerV1List", "GetHandlerV0001List"] {
            assert_eq!(parse(name).unwrap().version, 1, "{name}");
        }
    }

    #[test]
    fn rejects_out_of_range_versions() {
        assert_eq!(parse("GetHandlerV65535").unwrap().version, 65535);
        assert_eq!(
            parse("GetHandlerV65536"),
            Err(ParseError::VersionOutOfRange("65536".to_owned()))
        );
        assert!(matches!(
            parse("GetHandlerV99999999999999999999List"),
            Err(ParseError::VersionOutOfRange(_))
        ));
        assert!(matches!(parse("GetHandlerV000"), Err(ParseError::VersionOutOfRange(_))));
    }

    #[test]
    fn rejects_non_routes() {
        assert_eq!(parse("ComputeTotals"), Err(ParseError::MissingKeyword));
        assert_eq!(parse("ListHandlerV1"), Err(ParseError::UnknownVerb));
        assert_eq!(parse("AuthHandlerHelper"), Err(ParseError::UnknownVerb));
        assert!(matches!(parse("GetHandlerList"), Err(ParseError::MalformedVersion(_))));
        assert!(matches!(parse("GetHandlerVx"), Err(ParseError::MalformedVersion(_))));
        assert!(matches!(parse("GetHandlerV1Foo/Bar"), Err(ParseError::InvalidAction(_))));
    }

    #[test]
    fn handler_name_renders_canonical_form() {
        let c = Convention::new(Verb::Post, 2, "Create").auth();
        assert_eq!(c.handler_name(), "AuthPostHandlerV2Create");
        assert_eq!(parse(&c.handler_name()).unwrap(), c);
        assert_eq!(Convention::new(Verb::Head, 4, "").to_string(), "HeadHandlerV4");
    }

    #[test]
    fn declared_conventions_follow_the_name_rules() {
        assert_eq!(Convention::new(Verb::Get, 1, "List").validate(), Ok(()));
        assert_eq!(
            Convention::new(Verb::Get, 0, "zero").validate(),
            Err(ParseError::VersionOutOfRange("0".to_owned()))
        );
        for action in ["a/b", "a b", "ünï"] {
            assert!(
                matches!(Convention::new(Verb::Get, 1, action).validate(), Err(ParseError::InvalidAction(_))),
                "{action}"
            );
        }
    }
}
