//! Finished-character persistence.
//!
//! A character is stored as one row of the `characters` table: the fields
//! the list screens sort and filter by (id, name, level, race, class) get
//! their own columns, and everything else goes into a JSON remainder in
//! `data`. Loading merges the two back together.
//!
//! [`CharacterRepository`] also keeps the loaded list in memory along with
//! the active selection. The list is only a view: every write goes to the
//! store first and is reflected in memory only once it succeeds.

use crate::character::{create_default_character, Character, CharacterId, CharacterPatch};
use crate::store::{Store, StoreError};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use tracing::{debug, info, warn};

/// Top-level character keys stored as columns rather than in the remainder.
const COLUMN_KEYS: [&str; 5] = ["id", "name", "level", "race", "class"];

/// A character split into indexed columns and the serialized remainder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CharacterColumns {
    pub id: String,
    pub name: String,
    pub level: i32,
    pub race: String,
    pub class: String,
    pub data: String,
}

/// Split a character into columns plus remainder payload.
pub(crate) fn decompose(character: &Character) -> Result<CharacterColumns, serde_json::Error> {
    let mut value = serde_json::to_value(character)?;
    if let Value::Object(map) = &mut value {
        for key in COLUMN_KEYS {
            map.remove(key);
        }
    }

    Ok(CharacterColumns {
        id: character.id.to_string(),
        name: character.name.clone(),
        level: character.level,
        race: character.race.clone(),
        class: character.class.clone(),
        data: serde_json::to_string(&value)?,
    })
}

/// Rebuild a character from a `characters` row.
///
/// NULL columns and keys missing from the remainder fall back to the
/// default character's values.
pub(crate) fn recompose(row: &SqliteRow) -> Result<Character, StoreError> {
    let id: String = row.try_get("id")?;
    let name: Option<String> = row.try_get("name")?;
    let level: Option<i64> = row.try_get("level")?;
    let race: Option<String> = row.try_get("race")?;
    let class: Option<String> = row.try_get("class")?;
    let data: Option<String> = row.try_get("data")?;

    let mut map = match data.as_deref().map(serde_json::from_str::<Value>).transpose()? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let id: CharacterId = id.parse().map_err(|_| StoreError::InvalidId(id.clone()))?;
    map.insert("id".to_string(), Value::String(id.to_string()));
    if let Some(name) = name {
        map.insert("name".to_string(), Value::String(name));
    }
    if let Some(level) = level {
        map.insert("level".to_string(), Value::from(level));
    }
    if let Some(race) = race {
        map.insert("race".to_string(), Value::String(race));
    }
    if let Some(class) = class {
        map.insert("class".to_string(), Value::String(class));
    }

    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Insert a decomposed character. Fails if the id already exists.
pub(crate) async fn insert_columns<'e, E>(
    executor: E,
    columns: &CharacterColumns,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO characters (id, name, level, race, class, data) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&columns.id)
    .bind(&columns.name)
    .bind(columns.level)
    .bind(&columns.race)
    .bind(&columns.class)
    .bind(&columns.data)
    .execute(executor)
    .await?;
    Ok(())
}

/// Load every stored character, oldest first.
///
/// Rows with an unreadable id or payload are logged and skipped so one bad
/// row does not hide the rest of the roster.
pub async fn load_characters(store: &Store) -> Result<Vec<Character>, StoreError> {
    let rows = sqlx::query("SELECT id, name, level, race, class, data FROM characters ORDER BY id")
        .fetch_all(store.pool())
        .await?;

    let mut characters = Vec::with_capacity(rows.len());
    for row in &rows {
        match recompose(row) {
            Ok(character) => characters.push(character),
            Err(e @ (StoreError::InvalidId(_) | StoreError::Serialization(_))) => {
                let id: Option<String> = row.try_get("id").ok();
                warn!(id = ?id, error = %e, "Skipping unreadable character row");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(characters)
}

/// Load one stored character by id.
pub async fn load_character(store: &Store, id: CharacterId) -> Result<Option<Character>, StoreError> {
    let row = sqlx::query("SELECT id, name, level, race, class, data FROM characters WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(store.pool())
        .await?;
    row.as_ref().map(recompose).transpose()
}

/// Finished characters with an in-memory list and active selection.
#[derive(Debug)]
pub struct CharacterRepository {
    store: Store,
    characters: Vec<Character>,
    active: Option<CharacterId>,
}

impl CharacterRepository {
    /// Create a repository with an empty list. Call
    /// [`list_characters`](Self::list_characters) to populate it.
    pub fn new(store: Store) -> Self {
        Self {
            store,
            characters: Vec::new(),
            active: None,
        }
    }

    /// Create a repository and load the stored characters.
    pub async fn load(store: Store) -> Result<Self, StoreError> {
        let mut repo = Self::new(store);
        repo.list_characters().await?;
        Ok(repo)
    }

    /// Reload every character from the store, replacing the in-memory list.
    pub async fn list_characters(&mut self) -> Result<Vec<Character>, StoreError> {
        let characters = load_characters(&self.store).await?;
        debug!(count = characters.len(), "Loaded characters");

        if let Some(active) = self.active {
            if !characters.iter().any(|c| c.id == active) {
                self.active = None;
            }
        }
        self.characters = characters.clone();
        Ok(characters)
    }

    /// The in-memory list as of the last load or write.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn get_character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    /// Create a character from defaults plus `patch` and store it.
    pub async fn add_character(&mut self, patch: &CharacterPatch) -> Result<Character, StoreError> {
        let character = patch.merged(&create_default_character());
        self.insert_character(character).await
    }

    /// Store a complete character as given.
    pub async fn insert_character(&mut self, character: Character) -> Result<Character, StoreError> {
        let columns = decompose(&character)?;
        insert_columns(self.store.pool(), &columns).await?;
        info!(id = %character.id, name = %character.name, "Added character");

        self.characters.push(character.clone());
        Ok(character)
    }

    /// Apply a shallow update to a loaded character and store the result.
    ///
    /// Fails with `NotFound` if the id is not in the in-memory list. The list
    /// is only changed after the store accepts the write.
    pub async fn update_character(
        &mut self,
        id: CharacterId,
        patch: &CharacterPatch,
    ) -> Result<Character, StoreError> {
        let index = self
            .characters
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::character_not_found(id))?;

        let updated = patch.merged(&self.characters[index]);
        let columns = decompose(&updated)?;

        let result = sqlx::query(
            "UPDATE characters SET name = ?, level = ?, race = ?, class = ?, data = ? WHERE id = ?",
        )
        .bind(&columns.name)
        .bind(columns.level)
        .bind(&columns.race)
        .bind(&columns.class)
        .bind(&columns.data)
        .bind(&columns.id)
        .execute(self.store.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::character_not_found(id));
        }
        debug!(%id, "Updated character");

        self.characters[index] = updated.clone();
        Ok(updated)
    }

    /// Delete a character. Deleting an unknown id is not an error.
    pub async fn delete_character(&mut self, id: CharacterId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM characters WHERE id = ?")
            .bind(id.to_string())
            .execute(self.store.pool())
            .await?;
        info!(%id, "Deleted character");

        self.characters.retain(|c| c.id != id);
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(())
    }

    /// Make a loaded character the active one.
    pub fn select_character(&mut self, id: CharacterId) -> Option<&Character> {
        let found = self.characters.iter().position(|c| c.id == id)?;
        self.active = Some(id);
        self.characters.get(found)
    }

    pub fn active_character(&self) -> Option<&Character> {
        self.active.and_then(|id| self.get_character(id))
    }

    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
