use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, Sqlite, SqlitePool,
    query_builder::QueryBuilder,
    sqlite::SqlitePoolOptions,
    types::Json,
};
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::{
    catalog::{self, MaterialQuery},
    models::{CatalogStats, Material, NewMaterial, NewUser, User, UserAccount},
};

const USER_COLUMNS: &str = "id, email, name, role, avatar, password_hash, created_at";

const MATERIAL_COLUMNS: &str = "id, title, description, type, grade_level, thumbnail, download_url, \
     is_interactive, author_id, author_name, created_at, downloads, likes, tags";

/// Written alongside `MATERIAL_COLUMNS` on insert, never read back.
const FOLDED_COLUMNS: &str = "title_folded, description_folded, tags_folded";

/// Listing order: creation time, then insertion sequence. Timestamps are
/// RFC 3339 text with a variable number of fractional digits, which does not
/// sort lexically, so the comparison goes through julianday().
const MATERIAL_ORDER: &str = " ORDER BY julianday(created_at) ASC, seq ASC";

// --- Row Mapping ---

/// UserRow
///
/// Raw `users` row. Enum columns are stored as text and parsed on the way out,
/// so an unexpected value surfaces as `RepositoryError::Corrupt` rather than a panic.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    avatar: Option<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e| RepositoryError::Corrupt(format!("user {}: {}", row.id, e)))?;
        Ok(UserAccount {
            user: User {
                id: row.id,
                email: row.email,
                name: row.name,
                role,
                avatar: row.avatar,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
        })
    }
}

/// MaterialRow
///
/// Raw `materials` row. `type` is a reserved word in Rust, hence the rename.
#[derive(Debug, FromRow)]
struct MaterialRow {
    id: Uuid,
    title: String,
    description: String,
    #[sqlx(rename = "type")]
    material_type: String,
    grade_level: String,
    thumbnail: String,
    download_url: Option<String>,
    is_interactive: bool,
    author_id: Uuid,
    author_name: String,
    created_at: DateTime<Utc>,
    downloads: i64,
    likes: i64,
    tags: Json<Vec<String>>,
}

impl TryFrom<MaterialRow> for Material {
    type Error = RepositoryError;

    fn try_from(row: MaterialRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::models::UnknownVariant| {
            RepositoryError::Corrupt(format!("material {}: {}", row.id, e))
        };
        let material_type = row.material_type.parse().map_err(corrupt)?;
        let grade_level = row.grade_level.parse().map_err(corrupt)?;

        Ok(Material {
            id: row.id,
            title: row.title,
            description: row.description,
            material_type,
            grade_level,
            thumbnail: row.thumbnail,
            download_url: row.download_url,
            is_interactive: row.is_interactive,
            author_id: row.author_id,
            author_name: row.author_name,
            created_at: row.created_at,
            downloads: row.downloads,
            likes: row.likes,
            tags: row.tags.0,
        })
    }
}

// Not logged here: the HTTP layer logs internal errors once, with the same detail.
fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| RepositoryError::Storage(format!("{}: {}", context, e))
}

/// Case-folded title, description and tags, in `FOLDED_COLUMNS` order.
fn folded(title: &str, description: &str, tags: &[String]) -> (String, String, Json<Vec<String>>) {
    (
        catalog::fold(title),
        catalog::fold(description),
        Json(tags.iter().map(|tag| catalog::fold(tag)).collect()),
    )
}

fn into_materials(rows: Vec<MaterialRow>) -> RepoResult<Vec<Material>> {
    rows.into_iter().map(Material::try_from).collect()
}

/// Appends the WHERE clause shared by the count and page queries.
fn push_filters<'q>(builder: &mut QueryBuilder<'q, Sqlite>, query: &'q MaterialQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(material_type) = query.material_type {
        builder.push(" AND type = ").push_bind(material_type.as_str());
    }

    if let Some(grade_level) = query.grade_level {
        builder.push(" AND grade_level = ").push_bind(grade_level.as_str());
    }

    if let Some(term) = query.search() {
        // instr() rather than LIKE so '%' and '_' in the term are literal.
        // The term is already folded; compare against the folded copies.
        builder
            .push(" AND (instr(title_folded, ")
            .push_bind(term)
            .push(") > 0 OR instr(description_folded, ")
            .push_bind(term)
            .push(") > 0 OR EXISTS (SELECT 1 FROM json_each(materials.tags_folded) WHERE instr(json_each.value, ")
            .push_bind(term)
            .push(") > 0))");
    }
}

/// SqliteRepository
///
/// The relational implementation of `Repository`, backed by a SQLite pool.
/// Uniqueness and counter atomicity are delegated to single SQL statements.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using an initialized connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `url` and applies the embedded migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    /// A private in-memory database. A single connection that never expires,
    /// since every new SQLite memory connection would be an empty database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let repo = Self::new(pool);
        repo.migrate().await?;
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn increment_counter(&self, id: Uuid, column: &'static str) -> RepoResult<Option<i64>> {
        // Single statement: the read and the write cannot interleave with another increment.
        let sql = format!(
            "UPDATE materials SET {column} = {column} + 1 WHERE id = $1 RETURNING {column}"
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("increment_counter"))
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    /// find_user_by_email
    ///
    /// Exact byte comparison; the column uses SQLite's default BINARY collation.
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find_user_by_email"))?;
        row.map(UserAccount::try_from).transpose()
    }

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find_user_by_id"))?;
        Ok(row
            .map(UserAccount::try_from)
            .transpose()?
            .map(|account| account.user))
    }

    /// create_user
    ///
    /// Relies on the UNIQUE constraint on `users.email`: two concurrent
    /// registrations for one address cannot both succeed.
    async fn create_user(&self, new_user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        let avatar = new_user
            .avatar
            .unwrap_or_else(|| new_user.role.default_avatar().to_string());

        let result = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(new_user.role.as_str())
            .bind(avatar)
            .bind(&new_user.password_hash)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(UserAccount::try_from(row)?.user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepositoryError::DuplicateEmail)
            }
            Err(e) => Err(storage("create_user")(e)),
        }
    }

    /// query_materials
    ///
    /// Builds the filter with QueryBuilder so every user-supplied value is a
    /// bound parameter. Count and page run in one transaction so `total`
    /// describes the same snapshot as `items`.
    async fn query_materials(&self, query: &MaterialQuery) -> RepoResult<(Vec<Material>, i64)> {
        let mut tx = self.pool.begin().await.map_err(storage("query_materials"))?;

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM materials");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut *tx)
            .await
            .map_err(storage("query_materials count"))?;

        let mut page: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MATERIAL_COLUMNS} FROM materials"));
        push_filters(&mut page, query);
        page.push(MATERIAL_ORDER);
        page.push(" LIMIT ").push_bind(i64::from(query.limit));
        page.push(" OFFSET ").push_bind(i64::from(query.offset));
        let rows = page
            .build_query_as::<MaterialRow>()
            .fetch_all(&mut *tx)
            .await
            .map_err(storage("query_materials page"))?;

        tx.commit().await.map_err(storage("query_materials"))?;
        Ok((into_materials(rows)?, total))
    }

    async fn get_material(&self, id: Uuid) -> RepoResult<Option<Material>> {
        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1");
        let row = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("get_material"))?;
        row.map(Material::try_from).transpose()
    }

    /// create_material
    ///
    /// INSERT ... SELECT against `users` so the educator check and the insert
    /// are one statement. No row inserted means the author is not an educator.
    async fn create_material(&self, new_material: NewMaterial) -> RepoResult<Material> {
        let sql = format!(
            "INSERT INTO materials ({MATERIAL_COLUMNS}, {FOLDED_COLUMNS}) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, 0, $12, $13, $14, $15 \
             FROM users WHERE id = $9 AND role = 'educator' \
             RETURNING {MATERIAL_COLUMNS}"
        );
        let thumbnail = catalog::thumbnail_for(new_material.material_type);
        let (title_folded, description_folded, tags_folded) =
            folded(&new_material.title, &new_material.description, &new_material.tags);

        let row = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_material.title)
            .bind(&new_material.description)
            .bind(new_material.material_type.as_str())
            .bind(new_material.grade_level.as_str())
            .bind(thumbnail)
            .bind(&new_material.download_url)
            .bind(new_material.is_interactive)
            .bind(new_material.author_id)
            .bind(&new_material.author_name)
            .bind(Utc::now())
            .bind(Json(&new_material.tags))
            .bind(title_folded)
            .bind(description_folded)
            .bind(tags_folded)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("create_material"))?;

        match row {
            Some(row) => Material::try_from(row),
            None => Err(RepositoryError::InvalidAuthor),
        }
    }

    async fn increment_downloads(&self, id: Uuid) -> RepoResult<Option<i64>> {
        self.increment_counter(id, "downloads").await
    }

    async fn increment_likes(&self, id: Uuid) -> RepoResult<Option<i64>> {
        self.increment_counter(id, "likes").await
    }

    /// get_stats
    ///
    /// Recomputed on every call from live rows, inside one read transaction.
    async fn get_stats(&self) -> RepoResult<CatalogStats> {
        let mut tx = self.pool.begin().await.map_err(storage("get_stats"))?;

        let (total_materials, total_downloads) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(downloads), 0) FROM materials",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(storage("get_stats totals"))?;

        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await
            .map_err(storage("get_stats users"))?;

        let grades = sqlx::query_as::<_, (String, i64)>(
            "SELECT grade_level, COUNT(*) FROM materials GROUP BY grade_level",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(storage("get_stats grades"))?;

        tx.commit().await.map_err(storage("get_stats"))?;

        Ok(CatalogStats {
            total_materials,
            total_downloads,
            total_users,
            grade_breakdown: grades.into_iter().collect(),
        })
    }

    async fn import(&self, users: Vec<UserAccount>, materials: Vec<Material>) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage("import"))?;

        let user_sql = format!("INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)");
        for account in &users {
            let user = &account.user;
            let result = sqlx::query(&user_sql)
                .bind(user.id)
                .bind(&user.email)
                .bind(&user.name)
                .bind(user.role.as_str())
                .bind(&user.avatar)
                .bind(&account.password_hash)
                .bind(user.created_at)
                .execute(&mut *tx)
                .await;
            match result {
                Ok(_) => {}
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    return Err(RepositoryError::DuplicateEmail);
                }
                Err(e) => return Err(storage("import users")(e)),
            }
        }

        let material_sql = format!(
            "INSERT INTO materials ({MATERIAL_COLUMNS}, {FOLDED_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        );
        for material in &materials {
            let (title_folded, description_folded, tags_folded) =
                folded(&material.title, &material.description, &material.tags);
            sqlx::query(&material_sql)
                .bind(material.id)
                .bind(&material.title)
                .bind(&material.description)
                .bind(material.material_type.as_str())
                .bind(material.grade_level.as_str())
                .bind(&material.thumbnail)
                .bind(&material.download_url)
                .bind(material.is_interactive)
                .bind(material.author_id)
                .bind(&material.author_name)
                .bind(material.created_at)
                .bind(material.downloads)
                .bind(material.likes)
                .bind(Json(&material.tags))
                .bind(title_folded)
                .bind(description_folded)
                .bind(tags_folded)
                .execute(&mut *tx)
                .await
                .map_err(storage("import materials"))?;
        }

        tx.commit().await.map_err(storage("import"))?;
        tracing::info!(users = users.len(), materials = materials.len(), "imported records");
        Ok(())
    }
}
