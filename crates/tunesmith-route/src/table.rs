//! The declarative route table.
//!
//! ```text
//!   "/tracks/42/?tab=stems"
//!          │ normalize: drop query/fragment, trailing '/'
//!          ▼
//!   ["tracks", "42"]  ──match──▶  "/tracks/:id"  { id = "42" }
//!                                        │
//!                                        ▼
//!                          requirement: Realm(User)
//! ```
//!
//! Routes are tried in declaration order and the first match wins. A path
//! that matches nothing resolves to the table's default route, which is
//! required to be public.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tunesmith_protocol::Realm;

use crate::{GuardDecision, RouteError, Sessions};

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteRequirement {
    Public,
    Realm(Realm),
}

impl RouteRequirement {
    pub fn realm(self) -> Option<Realm> {
        match self {
            Self::Public => None,
            Self::Realm(realm) => Some(realm),
        }
    }
}

/// Serializable route declaration, the shape a table is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_realm: Option<Realm>,
}

impl RouteSpec {
    pub fn requirement(&self) -> RouteRequirement {
        self.required_realm
            .map_or(RouteRequirement::Public, RouteRequirement::Realm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// One compiled route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pattern: String,
    requirement: RouteRequirement,
    segments: Vec<Segment>,
}

impl RouteEntry {
    fn compile(pattern: &str, requirement: RouteRequirement) -> Result<Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::NotAbsolute(pattern.to_string()));
        }
        let normalized = normalize(pattern);
        let segments = split(&normalized)
            .map(|seg| match seg.strip_prefix(':') {
                Some("") => Err(RouteError::UnnamedParam(pattern.to_string())),
                Some(name) => Ok(Segment::Param(name.to_string())),
                None => Ok(Segment::Literal(seg.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pattern: normalized.to_string(),
            requirement,
            segments,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn requirement(&self) -> RouteRequirement {
        self.requirement
    }

    /// Matches a normalized path, returning the captured parameters.
    fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let mut params = Vec::new();
        let mut parts = split(path);
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push((name.clone(), part.to_string())),
            }
        }
        // Leftover segments mean the path is longer than the pattern.
        parts.next().is_none().then_some(params)
    }
}

/// Strips query, fragment and trailing slashes. The root stays `/`.
fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|seg| !seg.is_empty())
}

/// The outcome of resolving a path and guarding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Pattern of the route that answered.
    pub route: String,
    /// Values captured by `:param` segments, in pattern order.
    pub params: Vec<(String, String)>,
    /// `true` when nothing matched and the default route answered.
    pub fallback: bool,
    pub decision: GuardDecision,
}

impl Navigation {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Ordered set of routes plus a public default route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    default_index: usize,
}

impl RouteTable {
    pub fn builder(default_route: impl Into<String>) -> RouteTableBuilder {
        RouteTableBuilder {
            default_route: default_route.into(),
            routes: Vec::new(),
        }
    }

    /// Builds a table from serializable declarations.
    pub fn from_specs(
        default_route: impl Into<String>,
        specs: impl IntoIterator<Item = RouteSpec>,
    ) -> Result<Self, RouteError> {
        specs
            .into_iter()
            .fold(Self::builder(default_route), |builder, spec| {
                let requirement = spec.requirement();
                builder.route(spec.path, requirement)
            })
            .build()
    }

    /// The Tunesmith application's routes.
    ///
    /// | path                                   | requirement |
    /// |----------------------------------------|-------------|
    /// | `/` (default), `/login`, `/signup`, `/tutorials`, `/admin/login` | public |
    /// | `/generate`, `/tracks`, `/tracks/:id`, `/profile` | user |
    /// | `/admin`, `/admin/users`, `/admin/users/:id`, `/admin/tracks`, `/admin/tracks/:id` | admin |
    pub fn tunesmith() -> Self {
        let built = Self::builder("/")
            .public("/")
            .public(Realm::User.login_path())
            .public("/signup")
            .public("/tutorials")
            .public(Realm::Admin.login_path())
            .user("/generate")
            .user("/tracks")
            .user("/tracks/:id")
            .user("/profile")
            .admin("/admin")
            .admin("/admin/users")
            .admin("/admin/users/:id")
            .admin("/admin/tracks")
            .admin("/admin/tracks/:id")
            .build();
        match built {
            Ok(table) => table,
            Err(e) => unreachable!("built-in route table is invalid: {e}"),
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn default_route(&self) -> &RouteEntry {
        &self.entries[self.default_index]
    }

    /// Finds the route answering `path`, with its captured parameters.
    ///
    /// Returns the default route and `fallback = true` when nothing matches.
    pub fn resolve(&self, path: &str) -> (&RouteEntry, Vec<(String, String)>, bool) {
        let path = normalize(path);
        self.entries
            .iter()
            .find_map(|entry| entry.matches(path).map(|params| (entry, params, false)))
            .unwrap_or_else(|| (self.default_route(), Vec::new(), true))
    }

    /// Resolves `path` and runs the guard against both realms' sessions.
    pub fn navigate(&self, path: &str, sessions: &Sessions<'_>) -> Navigation {
        let (entry, params, fallback) = self.resolve(path);
        if fallback {
            tracing::debug!(path, fallback = entry.pattern(), "unknown route");
        }
        Navigation {
            route: entry.pattern.clone(),
            params,
            fallback,
            decision: sessions.decide(entry.requirement),
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::tunesmith()
    }
}

/// Collects route declarations and validates them in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RouteTableBuilder {
    default_route: String,
    routes: Vec<(String, RouteRequirement)>,
}

impl RouteTableBuilder {
    pub fn route(mut self, path: impl Into<String>, requirement: RouteRequirement) -> Self {
        self.routes.push((path.into(), requirement));
        self
    }

    pub fn public(self, path: impl Into<String>) -> Self {
        self.route(path, RouteRequirement::Public)
    }

    pub fn user(self, path: impl Into<String>) -> Self {
        self.route(path, RouteRequirement::Realm(Realm::User))
    }

    pub fn admin(self, path: impl Into<String>) -> Self {
        self.route(path, RouteRequirement::Realm(Realm::Admin))
    }

    pub fn build(self) -> Result<RouteTable, RouteError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.routes.len());
        for (path, requirement) in &self.routes {
            let entry = RouteEntry::compile(path, *requirement)?;
            if !seen.insert(entry.pattern.clone()) {
                return Err(RouteError::Duplicate(entry.pattern));
            }
            entries.push(entry);
        }

        let default_pattern = normalize(&self.default_route);
        let default_index = entries
            .iter()
            .position(|entry| entry.pattern == default_pattern)
            .ok_or_else(|| RouteError::UnknownDefault(self.default_route.clone()))?;
        if entries[default_index].requirement != RouteRequirement::Public {
            return Err(RouteError::ProtectedDefault(self.default_route));
        }

        Ok(RouteTable {
            entries,
            default_index,
        })
    }
}
