//! QA tests for the creation wizard's draft lifecycle.
//!
//! These tests walk drafts from creation to promotion against a real
//! SQLite database.
//! Run with: `cargo test -p dnd4e-core --test qa_draft_lifecycle`

use dnd4e_core::testing::{assert_has_character, assert_no_draft, sample_character, TestHarness};
use dnd4e_core::{
    create_default_character, AbilityScores, CharacterId, CharacterPatch, StoreError, WizardStep,
};
use tempfile::TempDir;

// =============================================================================
// TEST 1: New drafts start at the race step with a default character
// =============================================================================

#[tokio::test]
async fn test_new_draft_is_default_at_phase_one() {
    let harness = TestHarness::new().await.expect("store should open");

    let id = harness.drafts.create_draft().await.unwrap();
    let draft = harness.draft(id).await;

    let mut expected = create_default_character();
    expected.id = id;
    assert_eq!(draft.phase, 1);
    assert_eq!(draft.data, expected);
}

// =============================================================================
// TEST 2: A single step saves only what it touched
// =============================================================================

#[tokio::test]
async fn test_race_step_changes_only_race() {
    let harness = TestHarness::new().await.unwrap();
    let id = harness.drafts.create_draft().await.unwrap();

    harness
        .drafts
        .update_draft(id, &CharacterPatch::new().race("Elf"), Some(2))
        .await
        .unwrap();

    let draft = harness.draft(id).await;
    let mut expected = create_default_character();
    expected.id = id;
    expected.race = "Elf".to_string();
    assert_eq!(draft.phase, 2);
    assert_eq!(draft.data, expected);
    assert_eq!(draft.step(), WizardStep::Class);
}

// =============================================================================
// TEST 3: Full walk through the wizard, then promotion
// =============================================================================

#[tokio::test]
async fn test_walk_wizard_and_finalize() {
    let mut harness = TestHarness::new().await.unwrap();
    let id = harness.drafts.create_draft().await.unwrap();

    let steps = [
        (CharacterPatch::new().race("Dwarf"), 2),
        (CharacterPatch::new().class("Fighter"), 3),
        (
            CharacterPatch::new().abilities(AbilityScores::new(16, 14, 14, 11, 10, 10)),
            4,
        ),
        (CharacterPatch::new(), 5),
        (CharacterPatch::new(), 6),
        (CharacterPatch::new(), 7),
        (CharacterPatch::new().speed(5), 8),
        (CharacterPatch::new().name("Thorin").level(3), 9),
    ];
    for (patch, phase) in &steps {
        harness.drafts.update_draft(id, patch, Some(*phase)).await.unwrap();
    }

    let character = harness.drafts.finalize_draft(id).await.unwrap();
    assert_eq!(character.id, id);
    assert_eq!(character.name, "Thorin");
    assert_eq!(character.race, "Dwarf");
    assert_eq!(character.class, "Fighter");
    assert_eq!(character.level, 3);
    assert_eq!(character.speed, 5);

    assert_no_draft(&harness, id).await;
    let listed = harness.repository.list_characters().await.unwrap();
    assert_eq!(listed, vec![character]);
    assert_has_character(&harness, "Thorin");
}

// =============================================================================
// TEST 4: A failed promotion leaves the draft untouched
// =============================================================================

#[tokio::test]
async fn test_finalize_conflict_keeps_draft() {
    let mut harness = TestHarness::new().await.unwrap();
    let id = harness
        .complete_draft(&CharacterPatch::new().name("Mira"))
        .await
        .unwrap();

    // Occupy the character id so the insert hits the primary key
    let mut squatter = sample_character("Squatter");
    squatter.id = id;
    harness.repository.insert_character(squatter).await.unwrap();

    let err = harness
        .drafts
        .finalize_draft(id)
        .await
        .expect_err("duplicate id should fail");
    assert!(matches!(err, StoreError::TransactionFailure(_)), "got {err:?}");

    let draft = harness.draft(id).await;
    assert_eq!(draft.phase, 9);
    assert_eq!(draft.data.name, "Mira");

    let listed = harness.repository.list_characters().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Squatter");

    // Once the conflict is gone the same draft promotes normally
    harness.repository.delete_character(id).await.unwrap();
    let character = harness.drafts.finalize_draft(id).await.unwrap();
    assert_eq!(character.name, "Mira");
    assert_no_draft(&harness, id).await;
}

// =============================================================================
// TEST 5: Missing drafts
// =============================================================================

#[tokio::test]
async fn test_missing_drafts() {
    let harness = TestHarness::new().await.unwrap();
    let ghost = CharacterId::new();

    harness.drafts.delete_draft(ghost).await.expect("delete is idempotent");
    assert!(harness.drafts.get_draft(ghost).await.unwrap().is_none());
    assert!(harness.drafts.resume_draft(ghost).await.unwrap().is_none());

    let err = harness.drafts.finalize_draft(ghost).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), format!("Draft not found: {ghost}"));
    assert_eq!(harness.stored_character_count().await, 0);
}

// =============================================================================
// TEST 6: Drafts survive reopening the database
// =============================================================================

#[tokio::test]
async fn test_resume_after_reopen() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("wizard.db");

    let id = {
        let harness = TestHarness::at_path(&path).await.unwrap();
        let id = harness.drafts.create_draft().await.unwrap();
        harness
            .drafts
            .update_draft(id, &CharacterPatch::new().race("Halfling"), Some(4))
            .await
            .unwrap();
        harness.store().close().await;
        id
    };

    let harness = TestHarness::at_path(&path).await.unwrap();
    let (draft, step) = harness
        .drafts
        .resume_draft(id)
        .await
        .unwrap()
        .expect("draft should persist");
    assert_eq!(step, WizardStep::Skills);
    assert_eq!(draft.data.race, "Halfling");
}

// =============================================================================
// TEST 7: Draft list is newest first and drops discarded drafts
// =============================================================================

#[tokio::test]
async fn test_draft_list_order_and_discard() {
    let harness = TestHarness::new().await.unwrap();
    let older = harness.drafts.create_draft().await.unwrap();
    let newer = harness.drafts.create_draft().await.unwrap();

    let ids: Vec<_> = harness
        .drafts
        .list_drafts()
        .await
        .unwrap()
        .iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![newer, older]);

    harness.drafts.delete_draft(newer).await.unwrap();
    let remaining = harness.drafts.list_drafts().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, older);
}
