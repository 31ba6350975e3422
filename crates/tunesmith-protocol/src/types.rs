//! Core types shared by every layer of the client core.
//!
//! Everything here is realm-scoped: a [`Token`] or [`Identity`] always
//! belongs to exactly one [`Realm`], and the two realms never share values.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Realm
// ---------------------------------------------------------------------------

/// One of the two independent identity domains.
///
/// The realm decides where requests go (`api_prefix`), where the token is
/// persisted (`storage_key`) and where an anonymous visitor is sent
/// (`login_path`). Two realms never share any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Realm {
    /// End users generating music.
    User,
    /// Back-office administrators.
    Admin,
}

impl Realm {
    /// Both realms, in bootstrap order.
    pub const ALL: [Realm; 2] = [Realm::User, Realm::Admin];

    /// Short lowercase name, used in logs and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Path prefix of this realm's auth endpoints on the backend.
    pub fn api_prefix(self) -> &'static str {
        match self {
            Self::User => "/api/users",
            Self::Admin => "/api/admin",
        }
    }

    /// Key under which this realm's token is persisted.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::User => "token",
            Self::Admin => "adminToken",
        }
    }

    /// Client route that hosts this realm's login form.
    pub fn login_path(self) -> &'static str {
        match self {
            Self::User => "/login",
            Self::Admin => "/admin/login",
        }
    }

    /// Message shown when a login fails and the backend gave no reason.
    pub fn login_failed_message(self) -> &'static str {
        match self {
            Self::User => "Login failed",
            Self::Admin => "Admin login failed",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// An opaque bearer credential issued by the backend.
///
/// `Debug` is implemented by hand and never prints the value, so a token
/// can't leak through `tracing` fields or panic messages. There is no
/// `Display` impl on purpose; use [`Token::as_str`] where the raw value is
/// really needed (the `Authorization` header, the token store).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wraps a raw token string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if the token is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(***, {} chars)", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The verified profile behind a token.
///
/// Backends disagree on field names, so decoding is lenient: the id may
/// arrive as `id` or `_id` (string or number) and the handle as `handle`,
/// `username` or `name`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier.
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,

    /// Display handle (username for admins, display name for users).
    #[serde(default, alias = "username", alias = "name")]
    pub handle: String,

    /// Contact email, user realm only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the account has a premium subscription.
    #[serde(default, alias = "isPremium")]
    pub premium: bool,

    /// Administrative role, e.g. `"admin"` or `"superadmin"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Identity {
    /// Creates an identity with just an id and handle.
    pub fn new(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            email: None,
            premium: false,
            role: None,
        }
    }

    /// `true` when the backend attached any administrative role.
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Accepts `"42"` and `42` alike for identifier fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// What a visitor types into a login form.
///
/// Shapes differ per realm: users sign in with an email, admins with a
/// username. Serialized untagged, so the body is exactly
/// `{"email": .., "password": ..}` or `{"username": .., "password": ..}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credentials {
    /// End-user login.
    User { email: String, password: String },
    /// Administrator login.
    Admin { username: String, password: String },
}

impl Credentials {
    /// End-user credentials.
    pub fn user(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::User {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Administrator credentials.
    pub fn admin(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Admin {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The realm these credentials belong to.
    pub fn realm(&self) -> Realm {
        match self {
            Self::User { .. } => Realm::User,
            Self::Admin { .. } => Realm::Admin,
        }
    }

    /// The login name (email or username), safe to log.
    pub fn principal(&self) -> &str {
        match self {
            Self::User { email, .. } => email,
            Self::Admin { username, .. } => username,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("realm", &self.realm())
            .field("principal", &self.principal())
            .field("password", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wire bodies
// ---------------------------------------------------------------------------

/// Body of a successful `POST <realm>/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: Token,

    /// The user endpoint calls this `user`, the admin endpoint `admin`.
    #[serde(alias = "user", alias = "admin")]
    pub identity: Identity,
}

/// Body of a successful `GET <realm>/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(alias = "user", alias = "admin")]
    pub identity: Identity,
}

/// Body of a non-2xx response. Either field may carry the reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// The server-provided reason, if any non-blank one was sent.
    pub fn into_message(self) -> Option<String> {
        self.message
            .into_iter()
            .chain(self.error)
            .find(|m| !m.trim().is_empty())
    }
}

// =========================================================================
// Tests
// =========================================================================
