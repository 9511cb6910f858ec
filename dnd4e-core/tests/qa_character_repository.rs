//! QA tests for finished characters and the compendium.
//!
//! Run with: `cargo test -p dnd4e-core --test qa_character_repository`

use dnd4e_core::compendium::{self, CompendiumData, SeedOutcome, COMPENDIUM_VERSION};
use dnd4e_core::testing::{sample_character, TestHarness};
use dnd4e_core::{CharacterId, CharacterPatch, CharacterRepository, StoreError};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// TEST 1: A stored character comes back exactly
// =============================================================================

#[tokio::test]
async fn test_insert_then_list_round_trip() {
    let mut harness = TestHarness::new().await.unwrap();

    let mut character = sample_character("Valenae");
    character.paragon_path = Some("Kensei".to_string());
    character.powers = vec![json!({"name": "Cleave", "usage": "at-will"})];
    character.inventory = vec![json!({"name": "Longsword", "qty": 1})];
    harness.repository.insert_character(character.clone()).await.unwrap();

    let listed = harness.repository.list_characters().await.unwrap();
    assert!(listed.contains(&character));
    assert_eq!(harness.repository.get_character(character.id), Some(&character));
}

// =============================================================================
// TEST 2: Updating an unknown id fails and changes nothing
// =============================================================================

#[tokio::test]
async fn test_update_unknown_character() {
    let mut harness = TestHarness::new().await.unwrap();
    harness
        .repository
        .insert_character(sample_character("Keira"))
        .await
        .unwrap();
    let before = harness.repository.list_characters().await.unwrap();

    let err = harness
        .repository
        .update_character(CharacterId::new(), &CharacterPatch::new().name("Nobody"))
        .await
        .expect_err("unknown id");
    assert!(matches!(err, StoreError::NotFound { .. }));

    assert_eq!(harness.repository.characters(), before.as_slice());
    assert_eq!(harness.repository.list_characters().await.unwrap(), before);
}

// =============================================================================
// TEST 3: Update is shallow and persisted
// =============================================================================

#[tokio::test]
async fn test_update_character_persists() {
    let mut harness = TestHarness::new().await.unwrap();
    let character = harness
        .repository
        .add_character(&CharacterPatch::new().name("Bruenor").race("Dwarf"))
        .await
        .unwrap();

    let updated = harness
        .repository
        .update_character(character.id, &CharacterPatch::new().level(4))
        .await
        .unwrap();
    assert_eq!(updated.level, 4);
    assert_eq!(updated.race, "Dwarf");

    let mut fresh = CharacterRepository::load(harness.store().clone()).await.unwrap();
    assert_eq!(fresh.get_character(character.id), Some(&updated));
    assert_eq!(fresh.list_characters().await.unwrap(), vec![updated]);
}

// =============================================================================
// TEST 4: A row removed behind the repository's back is not resurrected
// =============================================================================

#[tokio::test]
async fn test_update_after_external_delete() {
    let mut harness = TestHarness::new().await.unwrap();
    let character = harness
        .repository
        .insert_character(sample_character("Ghost"))
        .await
        .unwrap();

    sqlx::query("DELETE FROM characters WHERE id = ?")
        .bind(character.id.to_string())
        .execute(harness.store().pool())
        .await
        .unwrap();

    let err = harness
        .repository
        .update_character(character.id, &CharacterPatch::new().name("Revenant"))
        .await
        .expect_err("row is gone");
    assert!(err.is_not_found(), "got {err:?}");

    assert_eq!(harness.repository.characters(), &[character.clone()][..]);
    assert_eq!(harness.repository.get_character(character.id), Some(&character));
    assert_eq!(harness.stored_character_count().await, 0);
}

// =============================================================================
// TEST 5: Selection and deletion
// =============================================================================

#[tokio::test]
async fn test_delete_clears_selection() {
    let mut harness = TestHarness::new().await.unwrap();
    let a = harness.repository.insert_character(sample_character("A")).await.unwrap();
    let b = harness.repository.insert_character(sample_character("B")).await.unwrap();

    assert!(harness.repository.select_character(a.id).is_some());
    harness.repository.delete_character(b.id).await.unwrap();
    assert_eq!(harness.repository.active_character().map(|c| c.id), Some(a.id));

    harness.repository.delete_character(a.id).await.unwrap();
    assert!(harness.repository.active_character().is_none());
    assert!(harness.repository.characters().is_empty());
    assert_eq!(harness.stored_character_count().await, 0);

    // Deleting again is harmless
    harness.repository.delete_character(a.id).await.unwrap();
}

// =============================================================================
// TEST 6: Characters list in creation order across reopen
// =============================================================================

#[tokio::test]
async fn test_list_in_creation_order_after_reopen() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("roster.db");

    let names = ["Zed", "Amara", "Morn"];
    {
        let mut harness = TestHarness::at_path(&path).await.unwrap();
        for name in names {
            harness
                .repository
                .insert_character(sample_character(name))
                .await
                .unwrap();
        }
        harness.store().close().await;
    }

    let mut harness = TestHarness::at_path(&path).await.unwrap();
    let listed: Vec<_> = harness
        .repository
        .list_characters()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(listed, names);
}

// =============================================================================
// TEST 7: Compendium seeds once per version
// =============================================================================

#[tokio::test]
async fn test_compendium_seeds_once() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("compendium.db");

    let harness = TestHarness::at_path(&path).await.unwrap();
    let store = harness.store().clone();
    assert_eq!(
        compendium::stored_version(&store).await.unwrap().as_deref(),
        Some(COMPENDIUM_VERSION)
    );
    let races = compendium::race_names(&store).await.unwrap();
    assert!(races.iter().any(|r| r == "Eladrin"));

    // Current version: nothing to do
    let data = CompendiumData::bundled().unwrap();
    let outcome = compendium::seed_with(&store, &data, COMPENDIUM_VERSION).await;
    assert_eq!(outcome, SeedOutcome::UpToDate);
    store.close().await;

    // Reopening does not duplicate rows
    let harness = TestHarness::at_path(&path).await.unwrap();
    assert_eq!(compendium::race_names(harness.store()).await.unwrap(), races);
}

// =============================================================================
// TEST 8: Floating-point payload values survive storage bit for bit
// =============================================================================

#[tokio::test]
async fn test_float_payload_round_trip() {
    let mut harness = TestHarness::new().await.unwrap();
    let weights = [989.8597941207809, 0.1 + 0.2, 1e-310, 123456.78901234567, -2.5e300];

    let mut character = sample_character("Packrat");
    character.inventory = weights
        .iter()
        .map(|w| json!({"name": "Sack", "weight": w}))
        .collect();
    character.powers = vec![json!({"name": "Hurl", "damage": 3.3333333333333335})];
    harness.repository.insert_character(character.clone()).await.unwrap();

    let listed = harness.repository.list_characters().await.unwrap();
    assert_eq!(listed, vec![character.clone()]);
    let stored: Vec<f64> = listed[0]
        .inventory
        .iter()
        .map(|item| item["weight"].as_f64().unwrap())
        .collect();
    assert_eq!(stored, weights);

    // Drafts go through the same encoding on every step
    let id = harness.drafts.create_draft().await.unwrap();
    let patch = CharacterPatch::new().inventory(character.inventory.clone());
    harness.drafts.update_draft(id, &patch, Some(7)).await.unwrap();
    harness
        .drafts
        .update_draft(id, &CharacterPatch::new().name("Packrat"), Some(8))
        .await
        .unwrap();
    let draft = harness.draft(id).await;
    assert_eq!(draft.data.inventory, character.inventory);
}
