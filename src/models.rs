use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Closed Enumerations ---

/// Role
///
/// The two account roles. Permission checks match on this enum exhaustively
/// (see `access`), never on the raw string stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Parent,
    Educator,
}

/// MaterialType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MaterialType {
    Worksheet,
    ActivityBook,
    Drawing,
    Puzzle,
    Game,
}

/// GradeLevel
///
/// Kindergarten through fifth grade. Declaration order is the school order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum GradeLevel {
    Kindergarten,
    Grade1,
    Grade2,
    Grade3,
    Grade4,
    Grade5,
}

/// UnknownVariant
///
/// Returned when a stored or supplied string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(Role, "role", {
    Parent => "parent",
    Educator => "educator",
});

string_enum!(MaterialType, "material type", {
    Worksheet => "worksheet",
    ActivityBook => "activity_book",
    Drawing => "drawing",
    Puzzle => "puzzle",
    Game => "game",
});

string_enum!(GradeLevel, "grade level", {
    Kindergarten => "kindergarten",
    Grade1 => "grade1",
    Grade2 => "grade2",
    Grade3 => "grade3",
    Grade4 => "grade4",
    Grade5 => "grade5",
});

impl Role {
    /// Avatar glyph assigned at registration when none is supplied.
    pub fn default_avatar(self) -> &'static str {
        match self {
            Role::Parent => "👨‍👩‍👧",
            Role::Educator => "👨‍🏫",
        }
    }
}

// --- Core Records ---

/// User
///
/// The public view of an account. The password hash is held separately in
/// `UserAccount` so it cannot end up in a response body by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserAccount
///
/// A user together with the stored Argon2 hash. Only the repository and the
/// login handler ever see this type.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user: User,
    pub password_hash: String,
}

/// NewUser
///
/// Everything the User Directory needs to insert an account. The password is
/// already hashed by the time this struct exists.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub password_hash: String,
}

/// Material
///
/// A single catalog entry. `type` is a reserved word in Rust, so the field is
/// `material_type` internally and `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Material {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    pub grade_level: GradeLevel,
    pub thumbnail: String,
    pub download_url: Option<String>,
    pub is_interactive: bool,
    pub author_id: Uuid,
    pub author_name: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub downloads: i64,
    pub likes: i64,
    pub tags: Vec<String>,
}

/// NewMaterial
///
/// Input to `Repository::create_material`. Author fields come from the
/// authenticated identity, never from the request body.
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub author_id: Uuid,
    pub author_name: String,
    pub title: String,
    pub description: String,
    pub material_type: MaterialType,
    pub grade_level: GradeLevel,
    pub is_interactive: bool,
    pub tags: Vec<String>,
    pub download_url: Option<String>,
}

// --- Request Payloads ---

pub const MIN_PASSWORD_LEN: usize = 8;
pub const TITLE_LEN: (usize, usize) = (3, 100);
pub const DESCRIPTION_LEN: (usize, usize) = (10, 500);
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 30;

/// RegisterUserRequest
///
/// Input payload for POST /auth/register. The password is hashed immediately
/// and never persisted or logged in plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[schema(example = "teacher@example.com")]
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !is_plausible_email(&self.email) {
            return Err(ApiError::Validation("email: not a valid email address".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "password: must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("name: must not be empty".into()));
        }
        Ok(())
    }
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// CreateMaterialRequest
///
/// Input payload for POST /materials (educators only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateMaterialRequest {
    #[schema(example = "Fractions 101")]
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub material_type: MaterialType,
    pub grade_level: GradeLevel,
    #[serde(default)]
    pub is_interactive: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl CreateMaterialRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("title", &self.title, TITLE_LEN)?;
        check_len("description", &self.description, DESCRIPTION_LEN)?;
        if self.tags.len() > MAX_TAGS {
            return Err(ApiError::Validation(format!(
                "tags: at most {} tags are allowed",
                MAX_TAGS
            )));
        }
        for tag in &self.tags {
            check_len("tags", tag, (1, MAX_TAG_LEN))?;
        }
        Ok(())
    }

    pub fn into_new_material(self, author: &User) -> NewMaterial {
        NewMaterial {
            author_id: author.id,
            author_name: author.name.clone(),
            title: self.title,
            description: self.description,
            material_type: self.material_type,
            grade_level: self.grade_level,
            is_interactive: self.is_interactive,
            tags: self.tags,
            download_url: self.download_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ApiError::Validation(format!(
            "{}: length must be between {} and {} characters (got {})",
            field, min, max, len
        )));
    }
    Ok(())
}

/// Minimal shape check: one '@', non-empty local part, dotted domain, no spaces.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

// --- Response Payloads ---

/// AuthResponse
///
/// Returned by both register and login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub token_type: String,
}

impl AuthResponse {
    pub fn bearer(user: User, access_token: String) -> Self {
        Self {
            user,
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// MaterialList
///
/// One page of materials plus the number of matches before pagination.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MaterialList {
    pub items: Vec<Material>,
    pub total: i64,
}

/// CatalogStats
///
/// Output of GET /stats. Always computed from live data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CatalogStats {
    pub total_materials: i64,
    pub total_downloads: i64,
    pub total_users: i64,
    /// Material count per grade level; grades without materials are absent.
    pub grade_breakdown: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DownloadResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LikeResponse {
    pub likes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogoutResponse {
    pub success: bool,
}
