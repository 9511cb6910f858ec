//! D&D 4th Edition character engine.
//!
//! This crate provides:
//! - 4E rules math: modifiers, point buy, derived defenses
//! - The `Character` record and shallow-merge patches
//! - A draft lifecycle for the nine-phase creation wizard
//! - A character repository over SQLite, with a bundled compendium
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd4e_core::{CharacterPatch, CharacterRepository, DraftManager, StoreHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = StoreHandle::from_env();
//!     let store = handle.store().await?;
//!
//!     let drafts = DraftManager::new(store.clone());
//!     let id = drafts.create_draft().await?;
//!     drafts
//!         .update_draft(id, &CharacterPatch::new().race("Dwarf"), Some(2))
//!         .await?;
//!
//!     let character = drafts.finalize_draft(id).await?;
//!     let mut repository = CharacterRepository::load(store).await?;
//!     repository.select_character(character.id);
//!     Ok(())
//! }
//! ```

pub mod character;
pub mod compendium;
pub mod drafts;
pub mod repository;
pub mod rules;
pub mod store;
pub mod testing;

// Primary public API
pub use character::{
    create_default_character, Ability, AbilityScores, Character, CharacterId, CharacterPatch,
    Defenses, HitPoints, WizardStep,
};
pub use drafts::{Draft, DraftManager};
pub use repository::CharacterRepository;
pub use rules::{EditMode, PointBuyStatus};
pub use store::{RecordKind, Store, StoreConfig, StoreError, StoreHandle};
pub use testing::TestHarness;
