//! In-progress characters for the creation wizard.
//!
//! A draft is a full [`Character`] plus the wizard phase the player last
//! reached. Each wizard screen saves its part of the character with
//! [`DraftManager::update_draft`], and the last screen promotes the draft
//! with [`DraftManager::finalize_draft`], which moves it into the
//! `characters` table in a single transaction.
//!
//! ```text
//! create_draft ──> phase 1 ──update──> phase k ──update──> ... ──finalize──> Character
//!                     │                                 │
//!                     └─────────────delete──────────────┴──> discarded
//! ```

use crate::character::{create_default_character, Character, CharacterId, CharacterPatch, WizardStep};
use crate::compendium;
use crate::repository::{decompose, insert_columns};
use crate::store::{Store, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info, warn};

/// A character in the middle of creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: CharacterId,
    /// Wizard phase, conventionally 1 through 9. Stored exactly as last set.
    pub phase: i64,
    pub data: Character,
}

impl Draft {
    /// The wizard step to resume at.
    pub fn step(&self) -> WizardStep {
        WizardStep::from_phase(self.phase)
    }
}

/// Draft lifecycle over the `character_drafts` table.
#[derive(Debug, Clone)]
pub struct DraftManager {
    store: Store,
}

impl DraftManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Start a new draft with a default character at phase 1.
    pub async fn create_draft(&self) -> Result<CharacterId, StoreError> {
        let mut character = create_default_character();
        let id = CharacterId::new();
        character.id = id;

        sqlx::query("INSERT INTO character_drafts (id, step, data) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(WizardStep::FIRST_PHASE)
            .bind(serde_json::to_string(&character)?)
            .execute(self.store.pool())
            .await?;

        info!(%id, "Created draft");
        Ok(id)
    }

    pub async fn get_draft(&self, id: CharacterId) -> Result<Option<Draft>, StoreError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT step, data FROM character_drafts WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(self.store.pool())
                .await?;

        row.map(|(phase, data)| parse_draft(id, phase, &data))
            .transpose()
    }

    /// All drafts, most recently created first.
    ///
    /// Rows with an unreadable id or payload are logged and skipped.
    pub async fn list_drafts(&self) -> Result<Vec<Draft>, StoreError> {
        let rows: Vec<(String, Option<i64>, Option<String>)> =
            sqlx::query_as("SELECT id, step, data FROM character_drafts ORDER BY id DESC")
                .fetch_all(self.store.pool())
                .await?;

        let mut drafts = Vec::with_capacity(rows.len());
        for (raw_id, phase, data) in rows {
            let Ok(id) = raw_id.parse::<CharacterId>() else {
                warn!(id = %raw_id, "Skipping draft with unreadable id");
                continue;
            };
            let phase = phase.unwrap_or(WizardStep::FIRST_PHASE);
            let Some(data) = data else {
                warn!(%id, "Skipping draft with no data");
                continue;
            };
            match parse_draft(id, phase, &data) {
                Ok(draft) => drafts.push(draft),
                Err(e) => warn!(%id, error = %e, "Skipping draft with unreadable data"),
            }
        }
        debug!(count = drafts.len(), "Listed drafts");
        Ok(drafts)
    }

    /// Load a draft together with the step the wizard should reopen at.
    pub async fn resume_draft(
        &self,
        id: CharacterId,
    ) -> Result<Option<(Draft, WizardStep)>, StoreError> {
        Ok(self.get_draft(id).await?.map(|draft| {
            let step = draft.step();
            (draft, step)
        }))
    }

    /// Merge `patch` into a draft and optionally move it to `phase`.
    ///
    /// The phase is stored exactly as given; moving backward is allowed.
    /// Concurrent updates to the same draft are last-write-wins.
    pub async fn update_draft(
        &self,
        id: CharacterId,
        patch: &CharacterPatch,
        phase: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut tx = self.store.begin().await?;

        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT step, data FROM character_drafts WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((current_phase, data)) = row else {
            return Err(StoreError::draft_not_found(id));
        };

        let draft = parse_draft(id, current_phase, &data)?;
        let merged = patch.merged(&draft.data);
        let phase = phase.unwrap_or(current_phase);

        sqlx::query("UPDATE character_drafts SET data = ?, step = ? WHERE id = ?")
            .bind(serde_json::to_string(&merged)?)
            .bind(phase)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(%id, phase, "Updated draft");
        Ok(())
    }

    /// Discard a draft. Unknown ids are ignored.
    pub async fn delete_draft(&self, id: CharacterId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM character_drafts WHERE id = ?")
            .bind(id.to_string())
            .execute(self.store.pool())
            .await?;
        info!(%id, "Deleted draft");
        Ok(())
    }

    /// Promote a draft into a finished character.
    ///
    /// The character insert and the draft delete commit together. If the
    /// insert fails (for example, a character with this id already exists)
    /// nothing is written and the draft stays where it was.
    pub async fn finalize_draft(&self, id: CharacterId) -> Result<Character, StoreError> {
        let mut tx = self.store.begin().await?;

        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT step, data FROM character_drafts WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((phase, data)) = row else {
            return Err(StoreError::draft_not_found(id));
        };
        let character = parse_draft(id, phase, &data)?.data;

        if let Err(e) = promote(&mut tx, &character).await {
            warn!(%id, error = %e, "Finalizing draft failed, rolling back");
            if let Err(rollback) = tx.rollback().await {
                warn!(%id, error = %rollback, "Rollback failed");
            }
            return Err(e);
        }
        tx.commit().await.map_err(StoreError::TransactionFailure)?;

        info!(%id, name = %character.name, "Finalized draft");
        Ok(character)
    }

    /// Race names to offer on the race step.
    pub async fn race_options(&self) -> Result<Vec<String>, StoreError> {
        compendium::race_names(&self.store).await
    }

    /// Class names to offer on the class step.
    pub async fn class_options(&self) -> Result<Vec<String>, StoreError> {
        compendium::class_names(&self.store).await
    }
}

/// Insert the character row and remove the draft inside `tx`.
async fn promote(tx: &mut Transaction<'static, Sqlite>, character: &Character) -> Result<(), StoreError> {
    let columns = decompose(character)?;
    insert_columns(&mut **tx, &columns)
        .await
        .map_err(StoreError::TransactionFailure)?;

    sqlx::query("DELETE FROM character_drafts WHERE id = ?")
        .bind(&columns.id)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::TransactionFailure)?;
    Ok(())
}

/// Decode a stored draft, keeping the embedded id in step with the row id.
fn parse_draft(id: CharacterId, phase: i64, data: &str) -> Result<Draft, StoreError> {
    let mut character: Character = serde_json::from_str(data)?;
    character.id = id;
    Ok(Draft {
        id,
        phase,
        data: character,
    })
}
