//! Compendium reference data: races, classes, skills, feats and powers.
//!
//! The data ships inside the crate and is copied into the store the first
//! time a given [`COMPENDIUM_VERSION`] is seen. Seeding is best effort: a
//! row that fails to insert is logged and skipped, and a seed that fails
//! outright leaves the store usable for characters and drafts.

use crate::store::{Store, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Version of the bundled compendium data.
pub const COMPENDIUM_VERSION: &str = "1.5";

/// Key in the `meta` table holding the seeded version.
const VERSION_KEY: &str = "compendium_version";

const BUNDLED_DATA: &str = include_str!("../data/compendium.json");

const CREATE_RACES: &str = r#"
    CREATE TABLE IF NOT EXISTS races (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        quote TEXT,
        description TEXT,
        ability_scores TEXT,
        size TEXT,
        speed TEXT,
        vision TEXT,
        languages TEXT,
        defense_bonuses TEXT
    )
"#;

pub(crate) const SCHEMA: &[&str] = &[
    CREATE_RACES,
    r#"
    CREATE TABLE IF NOT EXISTS race_traits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        race_id INTEGER,
        trait TEXT,
        FOREIGN KEY (race_id) REFERENCES races (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        role TEXT,
        source TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS skills (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        ability TEXT,
        trained INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        tier TEXT,
        prerequisite TEXT,
        benefit TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS powers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        level INTEGER,
        type TEXT,
        class TEXT,
        action TEXT,
        range TEXT
    )
    "#,
];

// ============================================================================
// Entries
// ============================================================================

/// A playable race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceEntry {
    pub name: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ability_scores: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub speed: String,
    #[serde(default)]
    pub vision: String,
    #[serde(default)]
    pub languages: String,
    #[serde(default)]
    pub defense_bonuses: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// A character class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub name: String,
    pub role: String,
    pub source: String,
}

/// A skill and its key ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub ability: String,
    /// Only usable when trained.
    pub trained: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatEntry {
    pub name: String,
    pub tier: String,
    pub prerequisite: String,
    pub benefit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerEntry {
    pub name: String,
    pub level: i32,
    #[serde(rename = "type")]
    pub usage: String,
    pub class: String,
    pub action: String,
    pub range: String,
}

/// The full set of reference data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompendiumData {
    #[serde(default)]
    pub races: Vec<RaceEntry>,
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub feats: Vec<FeatEntry>,
    #[serde(default)]
    pub powers: Vec<PowerEntry>,
}

impl CompendiumData {
    /// The data bundled with the crate.
    pub fn bundled() -> Result<Self, serde_json::Error> {
        serde_json::from_str(BUNDLED_DATA)
    }

    pub fn len(&self) -> usize {
        self.races.len() + self.classes.len() + self.skills.len() + self.feats.len() + self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Seeding
// ============================================================================

/// Result of a seeding attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The stored version already matches.
    UpToDate,
    /// Data was (re)loaded. `skipped` counts rows that failed to insert.
    Seeded { inserted: usize, skipped: usize },
    /// The seed transaction failed and was rolled back.
    Failed(String),
}

/// Seed the bundled compendium if the stored version differs.
pub async fn seed_compendium(store: &Store) -> SeedOutcome {
    let data = match CompendiumData::bundled() {
        Ok(data) => data,
        Err(e) => {
            error!(error = %e, "Bundled compendium data is malformed");
            return SeedOutcome::Failed(e.to_string());
        }
    };
    seed_with(store, &data, COMPENDIUM_VERSION).await
}

/// Seed `data` under `version` if the stored version differs.
pub async fn seed_with(store: &Store, data: &CompendiumData, version: &str) -> SeedOutcome {
    match stored_version(store).await {
        Ok(Some(current)) if current == version => {
            debug!(version, "Compendium already up to date");
            return SeedOutcome::UpToDate;
        }
        Ok(current) => info!(?current, version, "Seeding compendium"),
        Err(e) => {
            warn!(error = %e, "Could not read compendium version");
            return SeedOutcome::Failed(e.to_string());
        }
    }

    match reseed(store, data, version).await {
        Ok((inserted, skipped)) => {
            info!(inserted, skipped, "Compendium seeding complete");
            SeedOutcome::Seeded { inserted, skipped }
        }
        Err(e) => {
            error!(error = %e, "Compendium seeding failed");
            SeedOutcome::Failed(e.to_string())
        }
    }
}

/// Version recorded in the `meta` table, if any.
pub async fn stored_version(store: &Store) -> Result<Option<String>, StoreError> {
    let value: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
        .bind(VERSION_KEY)
        .fetch_optional(store.pool())
        .await?;
    Ok(value.and_then(|(v,)| v))
}

async fn reseed(
    store: &Store,
    data: &CompendiumData,
    version: &str,
) -> Result<(usize, usize), StoreError> {
    let mut tx = store.begin().await?;
    let mut tally = Tally::default();

    // Traits reference races, so clear them before dropping the parent table.
    sqlx::query("DELETE FROM race_traits").execute(&mut *tx).await?;
    sqlx::query("DROP TABLE IF EXISTS races").execute(&mut *tx).await?;
    sqlx::query(CREATE_RACES).execute(&mut *tx).await?;
    for table in ["classes", "skills", "feats", "powers"] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;
    }

    for race in &data.races {
        insert_race(&mut tx, race, &mut tally).await;
    }

    for class in &data.classes {
        let result = sqlx::query("INSERT INTO classes (name, role, source) VALUES (?, ?, ?)")
            .bind(&class.name)
            .bind(&class.role)
            .bind(&class.source)
            .execute(&mut *tx)
            .await;
        tally.record("class", &class.name, result);
    }

    for skill in &data.skills {
        let result = sqlx::query("INSERT INTO skills (name, ability, trained) VALUES (?, ?, ?)")
            .bind(&skill.name)
            .bind(&skill.ability)
            .bind(skill.trained)
            .execute(&mut *tx)
            .await;
        tally.record("skill", &skill.name, result);
    }

    for feat in &data.feats {
        let result = sqlx::query(
            "INSERT INTO feats (name, tier, prerequisite, benefit) VALUES (?, ?, ?, ?)",
        )
        .bind(&feat.name)
        .bind(&feat.tier)
        .bind(&feat.prerequisite)
        .bind(&feat.benefit)
        .execute(&mut *tx)
        .await;
        tally.record("feat", &feat.name, result);
    }

    for power in &data.powers {
        let result = sqlx::query(
            "INSERT INTO powers (name, level, type, class, action, range) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&power.name)
        .bind(power.level)
        .bind(&power.usage)
        .bind(&power.class)
        .bind(&power.action)
        .bind(&power.range)
        .execute(&mut *tx)
        .await;
        tally.record("power", &power.name, result);
    }

    sqlx::query("INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)")
        .bind(VERSION_KEY)
        .bind(version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok((tally.inserted, tally.skipped))
}

async fn insert_race(tx: &mut Transaction<'static, Sqlite>, race: &RaceEntry, tally: &mut Tally) {
    let result = sqlx::query(
        r#"
        INSERT INTO races (name, quote, description, ability_scores, size, speed, vision, languages, defense_bonuses)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&race.name)
    .bind(&race.quote)
    .bind(&race.description)
    .bind(&race.ability_scores)
    .bind(&race.size)
    .bind(&race.speed)
    .bind(&race.vision)
    .bind(&race.languages)
    .bind(&race.defense_bonuses)
    .execute(&mut **tx)
    .await;

    let race_id = match result {
        Ok(done) => {
            tally.inserted += 1;
            done.last_insert_rowid()
        }
        Err(e) => {
            warn!(race = %race.name, error = %e, "Skipping race");
            tally.skipped += 1;
            return;
        }
    };

    for race_trait in &race.traits {
        let result = sqlx::query("INSERT INTO race_traits (race_id, trait) VALUES (?, ?)")
            .bind(race_id)
            .bind(race_trait)
            .execute(&mut **tx)
            .await;
        tally.record("race trait", race_trait, result);
    }
}

#[derive(Default)]
struct Tally {
    inserted: usize,
    skipped: usize,
}

impl Tally {
    fn record<T>(&mut self, kind: &str, name: &str, result: Result<T, sqlx::Error>) {
        match result {
            Ok(_) => self.inserted += 1,
            Err(e) => {
                warn!(kind, name, error = %e, "Skipping compendium entry");
                self.skipped += 1;
            }
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Race names in alphabetical order, for the race picker.
pub async fn race_names(store: &Store) -> Result<Vec<String>, StoreError> {
    names(store, "SELECT name FROM races ORDER BY name").await
}

/// Class names in alphabetical order, for the class picker.
pub async fn class_names(store: &Store) -> Result<Vec<String>, StoreError> {
    names(store, "SELECT name FROM classes ORDER BY name").await
}

async fn names(store: &Store, sql: &str) -> Result<Vec<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as(sql).fetch_all(store.pool()).await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// All races with their traits.
pub async fn races(store: &Store) -> Result<Vec<RaceEntry>, StoreError> {
    let trait_rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT race_id, trait FROM race_traits ORDER BY id")
            .fetch_all(store.pool())
            .await?;
    let mut traits: HashMap<i64, Vec<String>> = HashMap::new();
    for (race_id, race_trait) in trait_rows {
        traits.entry(race_id).or_default().push(race_trait);
    }

    let rows = sqlx::query(
        r#"
        SELECT id, name, quote, description, ability_scores, size, speed, vision, languages, defense_bonuses
        FROM races
        ORDER BY name
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let mut races = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.try_get("id")?;
        let text = |column: &str| -> Result<String, sqlx::Error> {
            Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
        };
        races.push(RaceEntry {
            name: text("name")?,
            quote: text("quote")?,
            description: text("description")?,
            ability_scores: text("ability_scores")?,
            size: text("size")?,
            speed: text("speed")?,
            vision: text("vision")?,
            languages: text("languages")?,
            defense_bonuses: text("defense_bonuses")?,
            traits: traits.remove(&id).unwrap_or_default(),
        });
    }
    Ok(races)
}

pub async fn classes(store: &Store) -> Result<Vec<ClassEntry>, StoreError> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT name, role, source FROM classes ORDER BY name")
            .fetch_all(store.pool())
            .await?;
    Ok(rows
        .into_iter()
        .map(|(name, role, source)| ClassEntry { name, role, source })
        .collect())
}

pub async fn skills(store: &Store) -> Result<Vec<SkillEntry>, StoreError> {
    let rows: Vec<(String, String, bool)> =
        sqlx::query_as("SELECT name, ability, trained FROM skills ORDER BY name")
            .fetch_all(store.pool())
            .await?;
    Ok(rows
        .into_iter()
        .map(|(name, ability, trained)| SkillEntry {
            name,
            ability,
            trained,
        })
        .collect())
}

pub async fn feats(store: &Store) -> Result<Vec<FeatEntry>, StoreError> {
    let rows: Vec<(String, String, String, String)> =
        sqlx::query_as("SELECT name, tier, prerequisite, benefit FROM feats ORDER BY name")
            .fetch_all(store.pool())
            .await?;
    Ok(rows
        .into_iter()
        .map(|(name, tier, prerequisite, benefit)| FeatEntry {
            name,
            tier,
            prerequisite,
            benefit,
        })
        .collect())
}

/// Powers available to a class, lowest level first.
pub async fn powers_for_class(store: &Store, class: &str) -> Result<Vec<PowerEntry>, StoreError> {
    let rows: Vec<(String, i32, String, String, String, String)> = sqlx::query_as(
        r#"
        SELECT name, level, type, class, action, range
        FROM powers
        WHERE class = ? COLLATE NOCASE
        ORDER BY level, name
        "#,
    )
    .bind(class)
    .fetch_all(store.pool())
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, level, usage, class, action, range)| PowerEntry {
            name,
            level,
            usage,
            class,
            action,
            range,
        })
        .collect())
}
