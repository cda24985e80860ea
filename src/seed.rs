//! Demo data for local runs: two accounts and a starter catalog.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    auth::password,
    models::{GradeLevel, Material, MaterialType, Role, User, UserAccount},
    repository::{Repository, RepositoryError},
};

/// Password shared by both demo accounts.
pub const DEMO_PASSWORD: &str = "password123";
pub const DEMO_PARENT_EMAIL: &str = "parent@example.com";
pub const DEMO_EDUCATOR_EMAIL: &str = "teacher@example.com";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Inserts the demo data when the store has no users yet.
///
/// Returns whether anything was written. A non-empty store is left alone.
pub async fn seed_if_empty(repo: &dyn Repository) -> Result<bool, SeedError> {
    if repo.get_stats().await?.total_users > 0 {
        tracing::debug!("store already populated; skipping demo data");
        return Ok(false);
    }

    let (users, materials) = demo_data()?;
    let (user_count, material_count) = (users.len(), materials.len());
    repo.import(users, materials).await?;

    tracing::info!(users = user_count, materials = material_count, "seeded demo data");
    Ok(true)
}

fn demo_data() -> Result<(Vec<UserAccount>, Vec<Material>), SeedError> {
    let parent = account(
        DEMO_PARENT_EMAIL,
        "Sarah Johnson",
        Role::Parent,
        "👩‍👧",
        date(2024, 1, 15),
    )?;
    let educator = account(
        DEMO_EDUCATOR_EMAIL,
        "Mr. Thompson",
        Role::Educator,
        "👨‍🏫",
        date(2024, 1, 10),
    )?;

    let author = &educator.user;
    let materials = vec![
        Seed {
            title: "ABC Tracing Fun",
            description: "Learn to trace letters A-Z with colorful guides and fun characters!",
            material_type: MaterialType::Worksheet,
            grade_level: GradeLevel::Kindergarten,
            thumbnail: "📝",
            download_url: Some("/materials/abc-tracing.pdf"),
            created_at: date(2024, 6, 1),
            downloads: 1250,
            likes: 89,
            tags: &["alphabet", "writing", "tracing"],
        },
        Seed {
            title: "Number Puzzle Adventure",
            description: "Solve puzzles while learning numbers 1-100!",
            material_type: MaterialType::Puzzle,
            grade_level: GradeLevel::Grade1,
            thumbnail: "🧩",
            download_url: None,
            created_at: date(2024, 5, 28),
            downloads: 890,
            likes: 156,
            tags: &["numbers", "math", "puzzle"],
        },
        Seed {
            title: "Animal Coloring Book",
            description: "Color beautiful animals from around the world!",
            material_type: MaterialType::Drawing,
            grade_level: GradeLevel::Kindergarten,
            thumbnail: "🎨",
            download_url: Some("/materials/animals-coloring.pdf"),
            created_at: date(2024, 5, 25),
            downloads: 2100,
            likes: 234,
            tags: &["animals", "coloring", "art"],
        },
        Seed {
            title: "Math Monsters Game",
            description: "Battle friendly monsters with your math skills!",
            material_type: MaterialType::Game,
            grade_level: GradeLevel::Grade2,
            thumbnail: "👾",
            download_url: None,
            created_at: date(2024, 5, 20),
            downloads: 3500,
            likes: 567,
            tags: &["math", "addition", "subtraction", "game"],
        },
        Seed {
            title: "Science Activity Book",
            description: "Explore the wonders of science with hands-on activities!",
            material_type: MaterialType::ActivityBook,
            grade_level: GradeLevel::Grade3,
            thumbnail: "🔬",
            download_url: Some("/materials/science-activities.pdf"),
            created_at: date(2024, 5, 15),
            downloads: 780,
            likes: 123,
            tags: &["science", "experiments", "activities"],
        },
        Seed {
            title: "Reading Comprehension Stories",
            description: "Fun stories with questions to boost reading skills!",
            material_type: MaterialType::Worksheet,
            grade_level: GradeLevel::Grade4,
            thumbnail: "📚",
            download_url: Some("/materials/reading-stories.pdf"),
            created_at: date(2024, 5, 10),
            downloads: 920,
            likes: 178,
            tags: &["reading", "comprehension", "stories"],
        },
        Seed {
            title: "Fraction Pizza Party",
            description: "Learn fractions by making virtual pizzas!",
            material_type: MaterialType::Game,
            grade_level: GradeLevel::Grade5,
            thumbnail: "🍕",
            download_url: None,
            created_at: date(2024, 5, 5),
            downloads: 1450,
            likes: 289,
            tags: &["fractions", "math", "game"],
        },
        Seed {
            title: "Shape Explorer Puzzle",
            description: "Match and learn geometric shapes through puzzles!",
            material_type: MaterialType::Puzzle,
            grade_level: GradeLevel::Grade1,
            thumbnail: "🔷",
            download_url: None,
            created_at: date(2024, 5, 1),
            downloads: 670,
            likes: 98,
            tags: &["shapes", "geometry", "puzzle"],
        },
    ]
    .into_iter()
    .map(|seed| seed.into_material(author))
    .collect();

    Ok((vec![parent, educator], materials))
}

struct Seed {
    title: &'static str,
    description: &'static str,
    material_type: MaterialType,
    grade_level: GradeLevel,
    thumbnail: &'static str,
    download_url: Option<&'static str>,
    created_at: DateTime<Utc>,
    downloads: i64,
    likes: i64,
    tags: &'static [&'static str],
}

impl Seed {
    fn into_material(self, author: &User) -> Material {
        Material {
            id: Uuid::new_v4(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            material_type: self.material_type,
            grade_level: self.grade_level,
            thumbnail: self.thumbnail.to_string(),
            download_url: self.download_url.map(String::from),
            // Downloadable files are static; everything else runs in the browser.
            is_interactive: self.download_url.is_none(),
            author_id: author.id,
            author_name: author.name.clone(),
            created_at: self.created_at,
            downloads: self.downloads,
            likes: self.likes,
            tags: self.tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

fn account(
    email: &str,
    name: &str,
    role: Role,
    avatar: &str,
    created_at: DateTime<Utc>,
) -> Result<UserAccount, SeedError> {
    let password_hash = password::hash(DEMO_PASSWORD).map_err(|e| SeedError::Hash(e.to_string()))?;
    Ok(UserAccount {
        user: User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            avatar: Some(avatar.to_string()),
            created_at,
        },
        password_hash,
    })
}

fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
