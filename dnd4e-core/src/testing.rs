//! Testing utilities for the character engine.
//!
//! This module provides tools for integration testing:
//! - `TestHarness` bundling an isolated store, draft manager and repository
//! - `sample_character` fixtures
//! - Assertion helpers for verifying stored state

use crate::character::{AbilityScores, Character, CharacterId, CharacterPatch};
use crate::drafts::{Draft, DraftManager};
use crate::repository::CharacterRepository;
use crate::store::{Store, StoreConfig, StoreError};
use std::path::Path;

/// A level 1 human fighter with a legal point-buy array.
pub fn sample_character(name: &str) -> Character {
    let mut character = Character::new(name);
    character.race = "Human".to_string();
    character.class = "Fighter".to_string();
    character.abilities = AbilityScores::new(16, 14, 14, 11, 10, 10);
    character
}

/// Open an isolated in-memory store.
pub async fn memory_store() -> Result<Store, StoreError> {
    Store::open(&StoreConfig::in_memory()).await
}

/// Test harness for running creation scenarios against one store.
pub struct TestHarness {
    /// The draft manager.
    pub drafts: DraftManager,
    /// The character repository.
    pub repository: CharacterRepository,
}

impl TestHarness {
    /// Create a harness over a fresh in-memory store.
    pub async fn new() -> Result<Self, StoreError> {
        Ok(Self::with_store(memory_store().await?))
    }

    /// Create a harness over a database file, e.g. inside a temp dir.
    pub async fn at_path(path: &Path) -> Result<Self, StoreError> {
        let url = format!("sqlite://{}", path.display());
        Ok(Self::with_store(Store::open(&StoreConfig::new(url)).await?))
    }

    /// Create a harness over an existing store.
    pub fn with_store(store: Store) -> Self {
        Self {
            drafts: DraftManager::new(store.clone()),
            repository: CharacterRepository::new(store),
        }
    }

    pub fn store(&self) -> &Store {
        self.repository.store()
    }

    /// Walk a draft through every wizard phase, applying `patch` at the
    /// details step, and leave it at phase 9.
    pub async fn complete_draft(&self, patch: &CharacterPatch) -> Result<CharacterId, StoreError> {
        let id = self.drafts.create_draft().await?;
        for phase in 2..=9 {
            let step_patch = if phase == 9 {
                patch.clone()
            } else {
                CharacterPatch::new()
            };
            self.drafts.update_draft(id, &step_patch, Some(phase)).await?;
        }
        Ok(id)
    }

    /// Fetch a draft that is expected to exist.
    pub async fn draft(&self, id: CharacterId) -> Draft {
        match self.drafts.get_draft(id).await {
            Ok(Some(draft)) => draft,
            Ok(None) => panic!("Expected draft {id} to exist"),
            Err(e) => panic!("Failed to read draft {id}: {e}"),
        }
    }

    /// Row count of `characters`, bypassing the repository cache.
    pub async fn stored_character_count(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM characters")
            .fetch_one(self.store().pool())
            .await
            .unwrap_or((-1,));
        count
    }

    /// Row count of `character_drafts`.
    pub async fn stored_draft_count(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM character_drafts")
            .fetch_one(self.store().pool())
            .await
            .unwrap_or((-1,));
        count
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert that no draft with this id is stored.
pub async fn assert_no_draft(harness: &TestHarness, id: CharacterId) {
    let draft = harness.drafts.get_draft(id).await;
    assert!(
        matches!(draft, Ok(None)),
        "Expected draft {id} to be gone, got {draft:?}"
    );
}

/// Assert that the repository lists a character with this name.
pub fn assert_has_character(harness: &TestHarness, name: &str) {
    assert!(
        harness.repository.characters().iter().any(|c| c.name == name),
        "Expected character '{}' in list",
        name
    );
}
