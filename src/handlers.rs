use crate::{
    AppState,
    access::{self, Action},
    auth::{AuthUser, password},
    catalog::{self, MaterialQuery},
    error::{ApiError, ApiResult, ErrorResponse},
    models::{
        AuthResponse, CatalogStats, CreateMaterialRequest, DownloadResponse, GradeLevel,
        LikeResponse, LoginRequest, LogoutResponse, Material, MaterialList, MaterialType, NewUser,
        RegisterUserRequest, User,
    },
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Filter Structs ---

/// MaterialFilter
///
/// Query parameters accepted by GET /materials. Unknown enum values and
/// negative numbers are rejected by the extractor (422).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialFilter {
    /// Only materials of this type.
    #[serde(rename = "type")]
    #[param(inline)]
    pub material_type: Option<MaterialType>,
    /// Only materials for this grade level.
    #[serde(rename = "gradeLevel", alias = "grade_level")]
    #[param(inline)]
    pub grade_level: Option<GradeLevel>,
    /// Case-insensitive substring of title, description or any tag.
    pub search: Option<String>,
    /// Page size, 1-100 (default 50).
    pub limit: Option<u32>,
    /// Number of matches to skip (default 0).
    pub offset: Option<u32>,
}

impl MaterialFilter {
    pub fn into_query(self) -> ApiResult<MaterialQuery> {
        MaterialQuery::new(
            self.material_type,
            self.grade_level,
            self.search,
            self.limit,
            self.offset,
        )
    }
}

/// ServiceInfo
///
/// Body of GET /, pointing clients at the documentation.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub docs: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub status: String,
}

/// Material ids are opaque strings on the wire; one that is not a UUID
/// cannot name an existing material.
fn material_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found("Material"))
}

// --- Service Handlers ---

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service information", body = ServiceInfo))
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "KidLearn API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/swagger-ui".to_string(),
        status: "running".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Liveness probe", body = HealthStatus))
)]
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
    })
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates an account and signs the caller in.
///
/// The password is hashed off the async runtime before it reaches the store;
/// email uniqueness is decided by the store itself, so two concurrent
/// registrations for one address yield exactly one 201 and one 409.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Invalid input", body = ErrorResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    access::authorize(None, Action::Register)?;
    let Json(payload) = payload?;
    payload.validate()?;

    let password_hash = password::hash_blocking(payload.password).await?;
    let user = state
        .repo
        .create_user(NewUser {
            email: payload.email,
            name: payload.name.trim().to_string(),
            role: payload.role,
            avatar: None,
            password_hash,
        })
        .await?;

    let token = issue_token(&state, &user)?;
    tracing::info!(user_id = %user.id, role = %user.role, "user registered");

    Ok((StatusCode::CREATED, Json(AuthResponse::bearer(user, token))))
}

/// login
///
/// [Public Route] Exchanges email and password for a bearer token. An unknown
/// email and a wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    access::authorize(None, Action::Login)?;
    let Json(payload) = payload?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let Some(account) = state.repo.find_user_by_email(&payload.email).await? else {
        tracing::debug!("login attempt for unknown email");
        return Err(invalid());
    };

    if !password::verify_blocking(payload.password, account.password_hash).await? {
        tracing::debug!(user_id = %account.user.id, "login attempt with wrong password");
        return Err(invalid());
    }

    let token = issue_token(&state, &account.user)?;
    tracing::info!(user_id = %account.user.id, "user signed in");
    Ok(Json(AuthResponse::bearer(account.user, token)))
}

/// logout
///
/// [Authenticated Route] Acknowledges a sign-out. Tokens are self-contained,
/// so the client discarding it is what ends the session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = LogoutResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn logout(AuthUser { user }: AuthUser) -> ApiResult<Json<LogoutResponse>> {
    access::authorize(Some(user.role), Action::Logout)?;
    tracing::info!(user_id = %user.id, "user signed out");
    Ok(Json(LogoutResponse { success: true }))
}

/// get_me
///
/// [Authenticated Route] The profile of the token's subject.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_me(AuthUser { user }: AuthUser) -> ApiResult<Json<User>> {
    access::authorize(Some(user.role), Action::ViewProfile)?;
    Ok(Json(user))
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    state
        .tokens
        .issue_default(user.id)
        .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
}

// --- Catalog Handlers ---

/// list_materials
///
/// [Public Route] Filtered, searched and paginated catalog listing. `total`
/// is the match count before paging.
#[utoipa::path(
    get,
    path = "/api/v1/materials",
    params(MaterialFilter),
    responses(
        (status = 200, description = "One page of materials", body = MaterialList),
        (status = 422, description = "Invalid filter", body = ErrorResponse)
    )
)]
pub async fn list_materials(
    State(state): State<AppState>,
    filter: Result<Query<MaterialFilter>, QueryRejection>,
) -> ApiResult<Json<MaterialList>> {
    access::authorize(None, Action::BrowseCatalog)?;
    let Query(filter) = filter?;
    let query = filter.into_query()?;

    let (items, total) = state.repo.query_materials(&query).await?;
    Ok(Json(MaterialList { items, total }))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    params(("id" = String, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material", body = Material),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Material>> {
    access::authorize(None, Action::ViewMaterial)?;
    let id = material_id(&id)?;
    state
        .repo
        .get_material(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Material"))
}

/// submit_material
///
/// [Authenticated Route] Educators add a material to the catalog. The author
/// is always the caller; thumbnail, counters and timestamp are set server-side.
#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Created", body = Material),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not an educator", body = ErrorResponse),
        (status = 422, description = "Invalid input", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn submit_material(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateMaterialRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Material>)> {
    access::authorize(Some(user.role), Action::SubmitMaterial)?;
    let Json(payload) = payload?;
    payload.validate()?;

    let material = state
        .repo
        .create_material(payload.into_new_material(&user))
        .await?;

    tracing::info!(material_id = %material.id, author_id = %user.id, "material submitted");
    Ok((StatusCode::CREATED, Json(material)))
}

/// download_material
///
/// [Public Route] Counts a download and returns where to fetch the file.
#[utoipa::path(
    post,
    path = "/api/v1/materials/{id}/download",
    params(("id" = String, Path, description = "Material id")),
    responses(
        (status = 200, description = "Download location", body = DownloadResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    )
)]
pub async fn download_material(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DownloadResponse>> {
    access::authorize(None, Action::DownloadMaterial)?;
    let id = material_id(&id)?;

    let material = state
        .repo
        .get_material(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Material"))?;
    let downloads = state
        .repo
        .increment_downloads(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Material"))?;

    tracing::debug!(material_id = %id, downloads, "download counted");
    Ok(Json(DownloadResponse {
        url: catalog::download_url(&material),
    }))
}

/// like_material
///
/// [Authenticated Route] Adds one like and returns the new count. Likes are
/// not tracked per user, so repeated calls keep counting.
#[utoipa::path(
    post,
    path = "/api/v1/materials/{id}/like",
    params(("id" = String, Path, description = "Material id")),
    responses(
        (status = 200, description = "New like count", body = LikeResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Not Found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn like_material(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LikeResponse>> {
    access::authorize(Some(user.role), Action::LikeMaterial)?;
    let id = material_id(&id)?;

    let likes = state
        .repo
        .increment_likes(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Material"))?;
    Ok(Json(LikeResponse { likes }))
}

#[utoipa::path(
    get,
    path = "/api/v1/stats",
    responses((status = 200, description = "Platform statistics", body = CatalogStats))
)]
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<CatalogStats>> {
    access::authorize(None, Action::ViewStats)?;
    Ok(Json(state.repo.get_stats().await?))
}
