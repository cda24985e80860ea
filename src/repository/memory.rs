use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::{
    catalog::{self, MaterialQuery},
    models::{CatalogStats, Material, NewMaterial, NewUser, Role, User, UserAccount},
};

/// MemoryState
///
/// Id-indexed slots. Records are appended and never removed, so a slot index
/// stays valid for the life of the store.
#[derive(Default)]
struct MemoryState {
    users: Vec<UserAccount>,
    user_by_id: HashMap<Uuid, usize>,
    user_by_email: HashMap<String, usize>,
    materials: Vec<Material>,
    material_by_id: HashMap<Uuid, usize>,
}

impl MemoryState {
    fn insert_user(&mut self, account: UserAccount) -> RepoResult<User> {
        if self.user_by_email.contains_key(&account.user.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        let slot = self.users.len();
        self.user_by_id.insert(account.user.id, slot);
        self.user_by_email.insert(account.user.email.clone(), slot);
        let user = account.user.clone();
        self.users.push(account);
        Ok(user)
    }

    fn insert_material(&mut self, material: Material) -> Material {
        let slot = self.materials.len();
        self.material_by_id.insert(material.id, slot);
        self.materials.push(material.clone());
        material
    }

    fn material_mut(&mut self, id: Uuid) -> Option<&mut Material> {
        let slot = *self.material_by_id.get(&id)?;
        self.materials.get_mut(slot)
    }

    /// Materials in listing order. The sort is stable, so insertion order
    /// breaks ties on `created_at`.
    fn ordered_materials(&self) -> Vec<&Material> {
        let mut ordered: Vec<&Material> = self.materials.iter().collect();
        ordered.sort_by_key(|m| m.created_at);
        ordered
    }
}

/// MemoryRepository
///
/// A `Repository` kept entirely in process memory. All state sits behind one
/// mutex, so each operation (including check-then-insert on email and
/// read-modify-write on counters) runs as a single critical section.
///
/// Used by the test suite and by `DATABASE_URL=memory` for quick local runs.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<UserAccount>> {
        let state = self.state.lock().await;
        Ok(state
            .user_by_email
            .get(email)
            .and_then(|slot| state.users.get(*slot))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .user_by_id
            .get(&id)
            .and_then(|slot| state.users.get(*slot))
            .map(|account| account.user.clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> RepoResult<User> {
        let avatar = new_user
            .avatar
            .unwrap_or_else(|| new_user.role.default_avatar().to_string());
        let account = UserAccount {
            user: User {
                id: Uuid::new_v4(),
                email: new_user.email,
                name: new_user.name,
                role: new_user.role,
                avatar: Some(avatar),
                created_at: Utc::now(),
            },
            password_hash: new_user.password_hash,
        };

        self.state.lock().await.insert_user(account)
    }

    async fn query_materials(&self, query: &MaterialQuery) -> RepoResult<(Vec<Material>, i64)> {
        let state = self.state.lock().await;
        Ok(query.apply(state.ordered_materials()))
    }

    async fn get_material(&self, id: Uuid) -> RepoResult<Option<Material>> {
        let state = self.state.lock().await;
        Ok(state
            .material_by_id
            .get(&id)
            .and_then(|slot| state.materials.get(*slot))
            .cloned())
    }

    async fn create_material(&self, new_material: NewMaterial) -> RepoResult<Material> {
        let mut state = self.state.lock().await;

        let author_is_educator = state
            .user_by_id
            .get(&new_material.author_id)
            .and_then(|slot| state.users.get(*slot))
            .is_some_and(|account| account.user.role == Role::Educator);
        if !author_is_educator {
            return Err(RepositoryError::InvalidAuthor);
        }

        let material = Material {
            id: Uuid::new_v4(),
            thumbnail: catalog::thumbnail_for(new_material.material_type).to_string(),
            title: new_material.title,
            description: new_material.description,
            material_type: new_material.material_type,
            grade_level: new_material.grade_level,
            download_url: new_material.download_url,
            is_interactive: new_material.is_interactive,
            author_id: new_material.author_id,
            author_name: new_material.author_name,
            created_at: Utc::now(),
            downloads: 0,
            likes: 0,
            tags: new_material.tags,
        };
        Ok(state.insert_material(material))
    }

    async fn increment_downloads(&self, id: Uuid) -> RepoResult<Option<i64>> {
        let mut state = self.state.lock().await;
        Ok(state.material_mut(id).map(|m| {
            m.downloads += 1;
            m.downloads
        }))
    }

    async fn increment_likes(&self, id: Uuid) -> RepoResult<Option<i64>> {
        let mut state = self.state.lock().await;
        Ok(state.material_mut(id).map(|m| {
            m.likes += 1;
            m.likes
        }))
    }

    async fn get_stats(&self) -> RepoResult<CatalogStats> {
        let state = self.state.lock().await;
        Ok(catalog::compute_stats(&state.materials, state.users.len() as i64))
    }

    async fn import(&self, users: Vec<UserAccount>, materials: Vec<Material>) -> RepoResult<()> {
        let mut state = self.state.lock().await;

        // Validate first so a duplicate leaves the store untouched.
        let mut seen: Vec<&str> = Vec::with_capacity(users.len());
        for account in &users {
            let email = account.user.email.as_str();
            if state.user_by_email.contains_key(email) || seen.contains(&email) {
                return Err(RepositoryError::DuplicateEmail);
            }
            seen.push(email);
        }

        for account in users {
            state.insert_user(account)?;
        }
        for material in materials {
            state.insert_material(material);
        }
        Ok(())
    }
}
