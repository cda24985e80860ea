use kidlearn_api::{
    SqliteRepository,
    catalog::MaterialQuery,
    models::{GradeLevel, Material, MaterialType, NewMaterial, NewUser, Role, User},
    repository::{Repository, RepositoryError},
    seed,
};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Setup ---

async fn repo() -> SqliteRepository {
    SqliteRepository::in_memory()
        .await
        .expect("in-memory SQLite should open and migrate")
}

async fn user(repo: &SqliteRepository, email: &str, role: Role) -> User {
    repo.create_user(NewUser {
        email: email.to_string(),
        name: format!("{} user", role),
        role,
        avatar: None,
        password_hash: "$argon2id$placeholder".to_string(),
    })
    .await
    .unwrap()
}

fn new_material(
    author: &User,
    title: &str,
    material_type: MaterialType,
    grade_level: GradeLevel,
    tags: &[&str],
) -> NewMaterial {
    NewMaterial {
        author_id: author.id,
        author_name: author.name.clone(),
        title: title.to_string(),
        description: format!("All about {}.", title.to_lowercase()),
        material_type,
        grade_level,
        is_interactive: false,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        download_url: None,
    }
}

async fn seeded_catalog(repo: &SqliteRepository) -> (User, Vec<Material>) {
    let educator = user(repo, "edu@example.com", Role::Educator).await;
    let specs = [
        ("Counting Stars", MaterialType::Worksheet, GradeLevel::Kindergarten, &["numbers"][..]),
        ("Math Monsters", MaterialType::Game, GradeLevel::Grade2, &["addition"][..]),
        ("Shape Hunt", MaterialType::Puzzle, GradeLevel::Grade1, &["Geometry", "MATH"][..]),
        ("Leaf Drawing", MaterialType::Drawing, GradeLevel::Grade1, &["nature"][..]),
        ("Fraction Pizza", MaterialType::Game, GradeLevel::Grade5, &["fractions"][..]),
    ];

    let mut created = Vec::new();
    for (title, material_type, grade_level, tags) in specs {
        created.push(
            repo.create_material(new_material(&educator, title, material_type, grade_level, tags))
                .await
                .unwrap(),
        );
    }
    (educator, created)
}

/// A file-backed store with several pooled connections, as the server runs
/// it. The directory must outlive the repository.
async fn file_repo() -> (SqliteRepository, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("kidlearn.db").display());
    let repo = SqliteRepository::connect(&url, 5)
        .await
        .expect("file SQLite should open and migrate");
    (repo, dir)
}

fn query(search: Option<&str>) -> MaterialQuery {
    MaterialQuery::new(None, None, search.map(String::from), None, None).unwrap()
}

fn page(limit: u32, offset: u32) -> MaterialQuery {
    MaterialQuery::new(None, None, None, Some(limit), Some(offset)).unwrap()
}

async fn race_registrations(repo: Arc<SqliteRepository>) -> usize {
    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.create_user(NewUser {
                email: "race@example.com".to_string(),
                name: format!("Racer {i}"),
                role: Role::Parent,
                avatar: None,
                password_hash: "x".to_string(),
            })
            .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert_eq!(e, RepositoryError::DuplicateEmail),
        }
    }
    ok
}

async fn race_increments(repo: Arc<SqliteRepository>, id: Uuid) {
    let mut handles = Vec::new();
    for _ in 0..50 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.increment_downloads(id).await.unwrap();
            repo.increment_likes(id).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

// --- User Directory ---

#[tokio::test]
async fn test_user_round_trip_and_default_avatar() {
    let repo = repo().await;
    let parent = user(&repo, "parent@example.com", Role::Parent).await;

    assert_eq!(parent.avatar.as_deref(), Some("👨‍👩‍👧"));
    assert_eq!(repo.find_user_by_id(parent.id).await.unwrap(), Some(parent.clone()));

    let account = repo.find_user_by_email("parent@example.com").await.unwrap().unwrap();
    assert_eq!(account.user.id, parent.id);
    assert_eq!(account.password_hash, "$argon2id$placeholder");
}

#[tokio::test]
async fn test_email_lookup_is_case_sensitive() {
    let repo = repo().await;
    user(&repo, "Parent@Example.com", Role::Parent).await;

    assert!(repo.find_user_by_email("parent@example.com").await.unwrap().is_none());
    assert!(repo.find_user_by_email("Parent@Example.com").await.unwrap().is_some());
}

#[tokio::test]
async fn test_duplicate_email_is_rejected_by_the_store() {
    let repo = repo().await;
    user(&repo, "dup@example.com", Role::Parent).await;

    let second = repo
        .create_user(NewUser {
            email: "dup@example.com".to_string(),
            name: "Other".to_string(),
            role: Role::Educator,
            avatar: None,
            password_hash: "x".to_string(),
        })
        .await;
    assert_eq!(second.unwrap_err(), RepositoryError::DuplicateEmail);
    assert_eq!(repo.get_stats().await.unwrap().total_users, 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_registrations_admit_one() {
    let repo = Arc::new(repo().await);
    assert_eq!(race_registrations(repo).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_registrations_across_connections() {
    let (repo, _dir) = file_repo().await;
    let repo = Arc::new(repo);
    assert_eq!(race_registrations(repo.clone()).await, 1);
    assert_eq!(repo.get_stats().await.unwrap().total_users, 1);
}

// --- Catalog Store ---

#[tokio::test]
async fn test_create_material_sets_server_fields() {
    let repo = repo().await;
    let educator = user(&repo, "edu@example.com", Role::Educator).await;

    let material = repo
        .create_material(new_material(
            &educator,
            "Fractions 101",
            MaterialType::Worksheet,
            GradeLevel::Grade3,
            &["fractions", "math"],
        ))
        .await
        .unwrap();

    assert_eq!(material.thumbnail, "📝");
    assert_eq!(material.downloads, 0);
    assert_eq!(material.likes, 0);
    // Tag order survives storage.
    assert_eq!(material.tags, vec!["fractions", "math"]);
    assert_eq!(repo.get_material(material.id).await.unwrap(), Some(material));
}

#[tokio::test]
async fn test_only_educators_author_materials() {
    let repo = repo().await;
    let parent = user(&repo, "parent@example.com", Role::Parent).await;

    let result = repo
        .create_material(new_material(&parent, "Sneaky", MaterialType::Drawing, GradeLevel::Grade1, &[]))
        .await;
    assert_eq!(result.unwrap_err(), RepositoryError::InvalidAuthor);

    let ghost = User {
        id: Uuid::new_v4(),
        ..parent
    };
    let result = repo
        .create_material(new_material(&ghost, "Ghost", MaterialType::Drawing, GradeLevel::Grade1, &[]))
        .await;
    assert_eq!(result.unwrap_err(), RepositoryError::InvalidAuthor);
}

#[tokio::test]
async fn test_filters_are_anded() {
    let repo = repo().await;
    seeded_catalog(&repo).await;

    let games = MaterialQuery::new(Some(MaterialType::Game), None, None, None, None).unwrap();
    assert_eq!(repo.query_materials(&games).await.unwrap().1, 2);

    let grade1 = MaterialQuery::new(None, Some(GradeLevel::Grade1), None, None, None).unwrap();
    assert_eq!(repo.query_materials(&grade1).await.unwrap().1, 2);

    let game_grade5 =
        MaterialQuery::new(Some(MaterialType::Game), Some(GradeLevel::Grade5), None, None, None).unwrap();
    let (items, total) = repo.query_materials(&game_grade5).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].title, "Fraction Pizza");
}

#[tokio::test]
async fn test_search_is_case_insensitive() {
    let repo = repo().await;
    seeded_catalog(&repo).await;

    let upper = repo.query_materials(&query(Some("MATH"))).await.unwrap();
    let lower = repo.query_materials(&query(Some("math"))).await.unwrap();
    let mixed = repo.query_materials(&query(Some("MaTh"))).await.unwrap();

    assert_eq!(upper, lower);
    assert_eq!(lower, mixed);
    // "Math Monsters" by title, "Shape Hunt" by its "MATH" tag.
    assert_eq!(lower.1, 2);
}

#[tokio::test]
async fn test_search_folds_non_ascii_text() {
    let repo = repo().await;
    let educator = user(&repo, "prof@example.com", Role::Educator).await;
    let mut ecole = new_material(&educator, "École des Lettres", MaterialType::Worksheet, GradeLevel::Grade1, &["Lecture"]);
    ecole.description = "Apprendre l'ÉCRITURE en s'amusant.".to_string();
    repo.create_material(ecole).await.unwrap();

    // Imported records are searchable the same way.
    let imported = Material {
        id: Uuid::new_v4(),
        title: "Über Zahlen".to_string(),
        description: "Rechnen bis zwanzig.".to_string(),
        material_type: MaterialType::Game,
        grade_level: GradeLevel::Grade2,
        thumbnail: "🎮".to_string(),
        download_url: None,
        is_interactive: true,
        author_id: educator.id,
        author_name: educator.name.clone(),
        created_at: chrono::Utc::now(),
        downloads: 0,
        likes: 0,
        tags: vec!["MÄRCHEN".to_string()],
    };
    repo.import(Vec::new(), vec![imported]).await.unwrap();

    for term in ["École", "école", "ÉCOLE", "écriture", "LECTURE"] {
        let (items, total) = repo.query_materials(&query(Some(term))).await.unwrap();
        assert_eq!(total, 1, "{term}");
        assert_eq!(items[0].title, "École des Lettres", "{term}");
    }
    for term in ["über", "ÜBER", "märchen"] {
        let (items, total) = repo.query_materials(&query(Some(term))).await.unwrap();
        assert_eq!(total, 1, "{term}");
        assert_eq!(items[0].title, "Über Zahlen", "{term}");
    }
}

#[tokio::test]
async fn test_search_matches_description_and_treats_wildcards_literally() {
    let repo = repo().await;
    seeded_catalog(&repo).await;

    let (items, _) = repo.query_materials(&query(Some("all about leaf"))).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Leaf Drawing");

    assert_eq!(repo.query_materials(&query(Some("%"))).await.unwrap().1, 0);
    assert_eq!(repo.query_materials(&query(Some("_"))).await.unwrap().1, 0);
}

#[tokio::test]
async fn test_total_is_stable_across_pages() {
    let repo = repo().await;
    let (_, created) = seeded_catalog(&repo).await;

    let mut seen = Vec::new();
    for offset in [0, 2, 4] {
        let (items, total) = repo.query_materials(&page(2, offset)).await.unwrap();
        assert_eq!(total, 5);
        seen.extend(items.into_iter().map(|m| m.id));
    }

    // Pages are disjoint and follow creation order.
    let expected: Vec<Uuid> = created.iter().map(|m| m.id).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_offset_at_total_yields_empty_page() {
    let repo = repo().await;
    seeded_catalog(&repo).await;

    let (items, total) = repo
        .query_materials(&page(10, 5))
        .await
        .unwrap();
    assert!(items.is_empty());
    assert_eq!(total, 5);
}

#[tokio::test]
async fn test_sequential_increments_add_up() {
    let repo = repo().await;
    let (_, created) = seeded_catalog(&repo).await;
    let id = created[0].id;

    assert_eq!(repo.increment_downloads(id).await.unwrap(), Some(1));
    assert_eq!(repo.increment_downloads(id).await.unwrap(), Some(2));
    assert_eq!(repo.increment_likes(id).await.unwrap(), Some(1));

    assert_eq!(repo.increment_downloads(Uuid::new_v4()).await.unwrap(), None);
    assert_eq!(repo.increment_likes(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let repo = Arc::new(repo().await);
    let (_, created) = seeded_catalog(&repo).await;
    let id = created[1].id;

    race_increments(repo.clone(), id).await;

    let material = repo.get_material(id).await.unwrap().unwrap();
    assert_eq!(material.downloads, 50);
    assert_eq!(material.likes, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_across_connections() {
    let (repo, _dir) = file_repo().await;
    let repo = Arc::new(repo);
    let (_, created) = seeded_catalog(&repo).await;
    let id = created[1].id;

    race_increments(repo.clone(), id).await;

    let material = repo.get_material(id).await.unwrap().unwrap();
    assert_eq!(material.downloads, 50);
    assert_eq!(material.likes, 50);
    assert_eq!(repo.get_stats().await.unwrap().total_downloads, 50);
}

#[tokio::test]
async fn test_stats_are_live() {
    let repo = repo().await;
    let (_, created) = seeded_catalog(&repo).await;
    user(&repo, "parent@example.com", Role::Parent).await;
    repo.increment_downloads(created[0].id).await.unwrap();
    repo.increment_downloads(created[4].id).await.unwrap();

    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_materials, 5);
    assert_eq!(stats.total_downloads, 2);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.grade_breakdown.get("grade1"), Some(&2));
    assert_eq!(stats.grade_breakdown.get("grade5"), Some(&1));
    assert!(!stats.grade_breakdown.contains_key("grade3"));
}

#[tokio::test]
async fn test_empty_store_stats() {
    let repo = repo().await;
    let stats = repo.get_stats().await.unwrap();
    assert_eq!(stats.total_materials, 0);
    assert_eq!(stats.total_downloads, 0);
    assert!(stats.grade_breakdown.is_empty());
}

#[tokio::test]
async fn test_demo_seed_orders_by_creation_date() {
    let repo = repo().await;
    assert!(seed::seed_if_empty(&repo).await.unwrap());
    assert!(!seed::seed_if_empty(&repo).await.unwrap());

    let (items, total) = repo.query_materials(&query(None)).await.unwrap();
    assert_eq!(total, 8);
    assert_eq!(items[0].title, "Shape Explorer Puzzle");
    assert_eq!(items[7].title, "ABC Tracing Fun");

    // Seeded dates predate anything created now.
    let educator = repo
        .find_user_by_email(seed::DEMO_EDUCATOR_EMAIL)
        .await
        .unwrap()
        .unwrap()
        .user;
    let fresh = repo
        .create_material(new_material(&educator, "Brand New", MaterialType::Game, GradeLevel::Grade4, &[]))
        .await
        .unwrap();
    let (items, _) = repo.query_materials(&query(None)).await.unwrap();
    assert_eq!(items.last().map(|m| m.id), Some(fresh.id));
}
