use crate::{
    catalog::MaterialQuery,
    models::{CatalogStats, Material, NewMaterial, NewUser, User, UserAccount},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

/// RepositoryError
///
/// Storage failures, already translated to the nearest meaning the caller can
/// act on. Raw driver errors never leave this module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The email is already registered. Raised by the storage layer's
    /// uniqueness guarantee, not by a separate lookup.
    #[error("email already registered")]
    DuplicateEmail,
    /// The author of a new material does not exist or is not an educator.
    #[error("author must be an existing educator")]
    InvalidAuthor,
    /// A stored row could not be mapped back to a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The persistence contract for the two stores of the system: the User
/// Directory and the Catalog Store. Handlers only see `Arc<dyn Repository>`,
/// so the SQLite backend and the in-memory backend are interchangeable.
///
/// Every read-then-write operation (unique email insert, counter increments)
/// must be atomic inside the implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- User Directory ---
    /// Exact, case-sensitive email match.
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>>;
    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    /// Fails with `DuplicateEmail` when the address is taken.
    async fn create_user(&self, new_user: NewUser) -> RepoResult<User>;

    // --- Catalog Store ---
    /// Returns one page of matches and the total number of matches.
    async fn query_materials(&self, query: &MaterialQuery) -> RepoResult<(Vec<Material>, i64)>;
    async fn get_material(&self, id: Uuid) -> RepoResult<Option<Material>>;
    /// Fails with `InvalidAuthor` unless the author is an existing educator.
    async fn create_material(&self, new_material: NewMaterial) -> RepoResult<Material>;
    /// Atomic increment-and-return; `None` when the material does not exist.
    async fn increment_downloads(&self, id: Uuid) -> RepoResult<Option<i64>>;
    async fn increment_likes(&self, id: Uuid) -> RepoResult<Option<i64>>;
    async fn get_stats(&self) -> RepoResult<CatalogStats>;

    // --- Maintenance ---
    /// Bulk insert of fully formed records (ids, timestamps and counters
    /// included). Used by the demo seeder on an empty database.
    async fn import(&self, users: Vec<UserAccount>, materials: Vec<Material>) -> RepoResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
