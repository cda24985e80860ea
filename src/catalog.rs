//! Catalog query engine.
//!
//! Filtering, search and pagination rules for the materials listing. The
//! in-memory repository evaluates `MaterialQuery` directly; the SQLite
//! repository translates the same rules into SQL. Both must agree on:
//!
//! * `type` and `grade_level` are independent equality filters, ANDed.
//! * `search` is a case-insensitive substring match against the title, the
//!   description, or any single tag, ANDed with the filters above.
//! * results are ordered by creation time ascending, ties broken by insertion
//!   order, so offset paging is deterministic between writes.
//! * `total` counts every match before `limit`/`offset` are applied.

use std::collections::BTreeMap;

use crate::{
    error::ApiError,
    models::{CatalogStats, GradeLevel, Material, MaterialType},
};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// Thumbnail glyph shown for a material of the given type.
pub fn thumbnail_for(material_type: MaterialType) -> &'static str {
    match material_type {
        MaterialType::Worksheet => "📝",
        MaterialType::ActivityBook => "📖",
        MaterialType::Drawing => "🎨",
        MaterialType::Puzzle => "🧩",
        MaterialType::Game => "🎮",
    }
}

/// Where POST /materials/{id}/download sends the client.
pub fn download_url(material: &Material) -> String {
    material
        .download_url
        .clone()
        .unwrap_or_else(|| format!("/materials/{}/download-file", material.id))
}

/// MaterialQuery
///
/// A validated listing request. Construct through `MaterialQuery::new` so the
/// limit bounds and search normalization are always applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialQuery {
    pub material_type: Option<MaterialType>,
    pub grade_level: Option<GradeLevel>,
    /// Lower-cased search term; `None` when absent or blank.
    search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for MaterialQuery {
    fn default() -> Self {
        Self {
            material_type: None,
            grade_level: None,
            search: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl MaterialQuery {
    pub fn new(
        material_type: Option<MaterialType>,
        grade_level: Option<GradeLevel>,
        search: Option<String>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Self, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::Validation(format!(
                "limit: must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        Ok(Self {
            material_type,
            grade_level,
            search: normalize_search(search),
            limit,
            offset: offset.unwrap_or(0),
        })
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// True when `material` passes every filter in this query.
    pub fn matches(&self, material: &Material) -> bool {
        if let Some(material_type) = self.material_type {
            if material.material_type != material_type {
                return false;
            }
        }
        if let Some(grade_level) = self.grade_level {
            if material.grade_level != grade_level {
                return false;
            }
        }
        match &self.search {
            Some(term) => {
                contains_folded(&material.title, term)
                    || contains_folded(&material.description, term)
                    || material.tags.iter().any(|tag| contains_folded(tag, term))
            }
            None => true,
        }
    }

    /// Filters and pages an already-ordered sequence of materials.
    pub fn apply<'a, I>(&self, ordered: I) -> (Vec<Material>, i64)
    where
        I: IntoIterator<Item = &'a Material>,
    {
        let matching: Vec<&Material> = ordered.into_iter().filter(|m| self.matches(m)).collect();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect();
        (items, total)
    }
}

/// Case folding used on both sides of a search comparison. Stores that
/// match in SQL keep a folded copy of each searchable field.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
}

fn normalize_search(search: Option<String>) -> Option<String> {
    search
        .map(|s| fold(s.trim()))
        .filter(|s| !s.is_empty())
}

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    fold(haystack).contains(folded_needle)
}

/// Computes platform statistics from the full material set.
pub fn compute_stats<'a, I>(materials: I, total_users: i64) -> CatalogStats
where
    I: IntoIterator<Item = &'a Material>,
{
    let mut stats = CatalogStats {
        total_users,
        ..CatalogStats::default()
    };
    let mut breakdown: BTreeMap<String, i64> = BTreeMap::new();

    for material in materials {
        stats.total_materials += 1;
        stats.total_downloads += material.downloads;
        *breakdown
            .entry(material.grade_level.as_str().to_string())
            .or_insert(0) += 1;
    }

    stats.grade_breakdown = breakdown;
    stats
}
