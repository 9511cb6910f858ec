//! D&D 4E character types.
//!
//! Contains the character entity as it is stored and shown on the sheet,
//! the default-character factory, the shallow partial update used by the
//! creation wizard and the edit screens, and the wizard step list.

use crate::rules;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters and the drafts they are promoted from.
///
/// Backed by a UUIDv7, so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CharacterId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Constitution,
    Dexterity,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Constitution => "CON",
            Ability::Dexterity => "DEX",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Constitution => "Constitution",
            Ability::Dexterity => "Dexterity",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    /// All six abilities in character sheet order.
    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Constitution,
            Ability::Dexterity,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    /// Look up an ability by its abbreviation or full name.
    pub fn parse(s: &str) -> Option<Ability> {
        let lower = s.trim().to_lowercase();
        Ability::all()
            .into_iter()
            .find(|a| a.abbreviation().to_lowercase() == lower || a.name().to_lowercase() == lower)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(rename = "str")]
    pub strength: i32,
    #[serde(rename = "con")]
    pub constitution: i32,
    #[serde(rename = "dex")]
    pub dexterity: i32,
    #[serde(rename = "int")]
    pub intelligence: i32,
    #[serde(rename = "wis")]
    pub wisdom: i32,
    #[serde(rename = "cha")]
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, con: i32, dex: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            constitution: con,
            dexterity: dex,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Constitution => self.constitution,
            Ability::Dexterity => self.dexterity,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: i32) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Constitution => self.constitution = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        rules::ability_modifier(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Defenses and Hit Points
// ============================================================================

/// The four defenses. Derived values; see [`rules::derive_defenses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defenses {
    pub ac: i32,
    pub fort: i32,
    #[serde(rename = "ref")]
    pub reflex: i32,
    pub will: i32,
}

impl Default for Defenses {
    fn default() -> Self {
        Self {
            ac: 10,
            fort: 10,
            reflex: 10,
            will: 10,
        }
    }
}

/// Hit points and healing surges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
    pub temp: i32,
    pub surge_value: i32,
    pub surges_per_day: i32,
    pub surges_remaining: i32,
}

impl HitPoints {
    /// Full hit points and surges for the given maximum.
    pub fn new(max: i32, surges_per_day: i32) -> Self {
        Self {
            current: max,
            max,
            temp: 0,
            surge_value: rules::surge_value(max),
            surges_per_day,
            surges_remaining: surges_per_day,
        }
    }

    /// Current HP within max + temp and remaining surges within the daily
    /// allotment.
    pub fn is_consistent(&self) -> bool {
        self.current <= self.max + self.temp && self.surges_remaining <= self.surges_per_day
    }

    pub fn is_bloodied(&self) -> bool {
        self.current <= rules::bloodied_value(self.max)
    }
}

impl Default for HitPoints {
    fn default() -> Self {
        Self::new(20, 8)
    }
}

// ============================================================================
// Character
// ============================================================================

/// A finished character.
///
/// Powers, inventory and skills are kept as opaque JSON records; their
/// shape belongs to the screens that edit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub level: i32,
    pub race: String,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragon_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_destiny: Option<String>,

    pub abilities: AbilityScores,
    pub defenses: Defenses,
    pub hp: HitPoints,

    pub initiative_bonus: i32,
    pub speed: i32,
    pub passive_insight: i32,
    pub passive_perception: i32,

    pub powers: Vec<Value>,
    pub inventory: Vec<Value>,
    pub skills: Vec<Value>,
}

impl Character {
    /// Default character with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..create_default_character()
        }
    }

    /// Recompute defenses, initiative and passives from abilities and level.
    pub fn recalculate(&mut self, bonuses: &rules::DefenseBonuses) {
        self.defenses = rules::derive_defenses(&self.abilities, self.level, bonuses);
        self.initiative_bonus = rules::initiative(&self.abilities, self.level);
        self.passive_insight = rules::passive_skill(self.abilities.wisdom, self.level);
        self.passive_perception = rules::passive_skill(self.abilities.wisdom, self.level);
    }

    /// One-line summary used in lists, e.g. "Level 1 Human Fighter".
    pub fn summary(&self) -> String {
        format!("Level {} {} {}", self.level, self.race, self.class)
    }
}

impl Default for Character {
    fn default() -> Self {
        create_default_character()
    }
}

/// Build the blank character every new draft and direct insert starts from.
pub fn create_default_character() -> Character {
    Character {
        id: CharacterId::new(),
        name: "New Hero".to_string(),
        level: 1,
        race: "Human".to_string(),
        class: "Fighter".to_string(),
        paragon_path: None,
        epic_destiny: None,
        abilities: AbilityScores::default(),
        defenses: Defenses::default(),
        hp: HitPoints::default(),
        initiative_bonus: 0,
        speed: 6,
        passive_insight: 10,
        passive_perception: 10,
        powers: Vec::new(),
        inventory: Vec::new(),
        skills: Vec::new(),
    }
}

// ============================================================================
// Partial Updates
// ============================================================================

/// A shallow partial update to a character.
///
/// Every `Some` slot replaces the matching top-level field whole; nested
/// values like `abilities` are never merged key by key. The id is not
/// patchable. For `paragon_path` and `epic_destiny`, `Some(None)` clears the
/// field (JSON `null`) while `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub level: Option<i32>,
    pub race: Option<String>,
    pub class: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub paragon_path: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub epic_destiny: Option<Option<String>>,
    pub abilities: Option<AbilityScores>,
    pub defenses: Option<Defenses>,
    pub hp: Option<HitPoints>,
    pub initiative_bonus: Option<i32>,
    pub speed: Option<i32>,
    pub passive_insight: Option<i32>,
    pub passive_perception: Option<i32>,
    pub powers: Option<Vec<Value>>,
    pub inventory: Option<Vec<Value>>,
    pub skills: Option<Vec<Value>>,
}

/// Keep an explicit `null` distinct from a missing key.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl CharacterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn race(mut self, race: impl Into<String>) -> Self {
        self.race = Some(race.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn paragon_path(mut self, path: Option<String>) -> Self {
        self.paragon_path = Some(path);
        self
    }

    pub fn epic_destiny(mut self, destiny: Option<String>) -> Self {
        self.epic_destiny = Some(destiny);
        self
    }

    pub fn abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = Some(abilities);
        self
    }

    pub fn defenses(mut self, defenses: Defenses) -> Self {
        self.defenses = Some(defenses);
        self
    }

    pub fn hp(mut self, hp: HitPoints) -> Self {
        self.hp = Some(hp);
        self
    }

    pub fn initiative_bonus(mut self, bonus: i32) -> Self {
        self.initiative_bonus = Some(bonus);
        self
    }

    pub fn speed(mut self, speed: i32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn passive_insight(mut self, value: i32) -> Self {
        self.passive_insight = Some(value);
        self
    }

    pub fn passive_perception(mut self, value: i32) -> Self {
        self.passive_perception = Some(value);
        self
    }

    pub fn powers(mut self, powers: Vec<Value>) -> Self {
        self.powers = Some(powers);
        self
    }

    pub fn inventory(mut self, inventory: Vec<Value>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn skills(mut self, skills: Vec<Value>) -> Self {
        self.skills = Some(skills);
        self
    }

    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the named fields of `character`.
    pub fn apply(&self, character: &mut Character) {
        if let Some(name) = &self.name {
            character.name = name.clone();
        }
        if let Some(level) = self.level {
            character.level = level;
        }
        if let Some(race) = &self.race {
            character.race = race.clone();
        }
        if let Some(class) = &self.class {
            character.class = class.clone();
        }
        if let Some(path) = &self.paragon_path {
            character.paragon_path = path.clone();
        }
        if let Some(destiny) = &self.epic_destiny {
            character.epic_destiny = destiny.clone();
        }
        if let Some(abilities) = self.abilities {
            character.abilities = abilities;
        }
        if let Some(defenses) = self.defenses {
            character.defenses = defenses;
        }
        if let Some(hp) = self.hp {
            character.hp = hp;
        }
        if let Some(bonus) = self.initiative_bonus {
            character.initiative_bonus = bonus;
        }
        if let Some(speed) = self.speed {
            character.speed = speed;
        }
        if let Some(value) = self.passive_insight {
            character.passive_insight = value;
        }
        if let Some(value) = self.passive_perception {
            character.passive_perception = value;
        }
        if let Some(powers) = &self.powers {
            character.powers = powers.clone();
        }
        if let Some(inventory) = &self.inventory {
            character.inventory = inventory.clone();
        }
        if let Some(skills) = &self.skills {
            character.skills = skills.clone();
        }
    }

    /// Return a copy of `character` with the patch applied.
    pub fn merged(&self, character: &Character) -> Character {
        let mut merged = character.clone();
        self.apply(&mut merged);
        merged
    }
}

// ============================================================================
// Creation Wizard
// ============================================================================

/// The nine steps of the character creation wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WizardStep {
    Race,
    Class,
    Abilities,
    Skills,
    Feats,
    Powers,
    Equipment,
    Numbers,
    Details,
}

impl WizardStep {
    pub const FIRST_PHASE: i64 = 1;
    pub const LAST_PHASE: i64 = 9;

    pub fn all() -> [WizardStep; 9] {
        [
            WizardStep::Race,
            WizardStep::Class,
            WizardStep::Abilities,
            WizardStep::Skills,
            WizardStep::Feats,
            WizardStep::Powers,
            WizardStep::Equipment,
            WizardStep::Numbers,
            WizardStep::Details,
        ]
    }

    /// Step for a stored phase, clamped into 1..=9.
    pub fn from_phase(phase: i64) -> Self {
        let index = phase.clamp(Self::FIRST_PHASE, Self::LAST_PHASE) - Self::FIRST_PHASE;
        Self::all()[index as usize]
    }

    pub fn phase(&self) -> i64 {
        *self as i64 + Self::FIRST_PHASE
    }

    /// Route segment for the step's screen.
    pub fn slug(&self) -> &'static str {
        match self {
            WizardStep::Race => "race",
            WizardStep::Class => "class",
            WizardStep::Abilities => "abilities",
            WizardStep::Skills => "skills",
            WizardStep::Feats => "feats",
            WizardStep::Powers => "powers",
            WizardStep::Equipment => "equipment",
            WizardStep::Numbers => "numbers",
            WizardStep::Details => "details",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Race => "Choose Race",
            WizardStep::Class => "Choose Class",
            WizardStep::Abilities => "Ability Scores",
            WizardStep::Skills => "Choose Skills",
            WizardStep::Feats => "Select Feats",
            WizardStep::Powers => "Choose Powers",
            WizardStep::Equipment => "Equipment",
            WizardStep::Numbers => "Fill in the Numbers",
            WizardStep::Details => "Roleplaying Details",
        }
    }

    /// Following step, or `None` on the last one.
    pub fn next(&self) -> Option<WizardStep> {
        Self::all().get(self.phase() as usize).copied()
    }

    /// Preceding step, or `None` on the first one.
    pub fn previous(&self) -> Option<WizardStep> {
        let index = (self.phase() - Self::FIRST_PHASE) as usize;
        index.checked_sub(1).map(|i| Self::all()[i])
    }

    pub fn parse(s: &str) -> Option<WizardStep> {
        let lower = s.trim().to_lowercase();
        Self::all().into_iter().find(|step| step.slug() == lower)
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase {}: {}", self.phase(), self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_character() {
        let character = create_default_character();

        assert_eq!(character.name, "New Hero");
        assert_eq!(character.level, 1);
        assert_eq!(character.race, "Human");
        assert_eq!(character.class, "Fighter");
        assert_eq!(character.abilities, AbilityScores::new(10, 10, 10, 10, 10, 10));
        assert_eq!(character.defenses, Defenses::default());
        assert_eq!(
            character.hp,
            HitPoints {
                current: 20,
                max: 20,
                temp: 0,
                surge_value: 5,
                surges_per_day: 8,
                surges_remaining: 8,
            }
        );
        assert_eq!(character.initiative_bonus, 0);
        assert_eq!(character.speed, 6);
        assert_eq!(character.passive_insight, 10);
        assert_eq!(character.passive_perception, 10);
        assert!(character.powers.is_empty());
        assert!(character.inventory.is_empty());
        assert!(character.skills.is_empty());
        assert!(character.paragon_path.is_none());
    }

    #[test]
    fn test_default_characters_get_distinct_ids() {
        let a = create_default_character();
        let b = create_default_character();
        assert_ne!(a.id, b.id);
        assert!(a.id < b.id);
    }

    #[test]
    fn test_character_id_parse() {
        let id = CharacterId::new();
        let parsed: CharacterId = id.to_string().parse().expect("valid id");
        assert_eq!(parsed, id);
        assert!("1700000000000".parse::<CharacterId>().is_err());
    }

    #[test]
    fn test_character_json_shape() {
        let character = create_default_character();
        let value = serde_json::to_value(&character).unwrap();

        assert_eq!(value["class"], "Fighter");
        assert_eq!(value["abilities"]["str"], 10);
        assert_eq!(value["defenses"]["ref"], 10);
        assert_eq!(value["hp"]["surgeValue"], 5);
        assert_eq!(value["passivePerception"], 10);
        assert!(value.get("paragonPath").is_none());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let character: Character = serde_json::from_value(json!({
            "name": "Partial",
            "speed": 5
        }))
        .unwrap();

        assert_eq!(character.name, "Partial");
        assert_eq!(character.speed, 5);
        assert_eq!(character.level, 1);
        assert_eq!(character.hp, HitPoints::default());
    }

    #[test]
    fn test_patch_overwrites_only_named_fields() {
        let original = create_default_character();
        let patch = CharacterPatch::new().race("Elf").level(3);
        let updated = patch.merged(&original);

        assert_eq!(updated.race, "Elf");
        assert_eq!(updated.level, 3);
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.name, original.name);
        assert_eq!(updated.abilities, original.abilities);
        assert_eq!(updated.hp, original.hp);
    }

    #[test]
    fn test_patch_replaces_nested_values_whole() {
        let mut character = create_default_character();
        character.abilities.strength = 16;

        let patch: CharacterPatch = serde_json::from_value(json!({
            "abilities": { "str": 10, "con": 10, "dex": 14, "int": 10, "wis": 10, "cha": 10 }
        }))
        .unwrap();
        patch.apply(&mut character);

        assert_eq!(character.abilities.strength, 10);
        assert_eq!(character.abilities.dexterity, 14);
    }

    #[test]
    fn test_patch_rejects_partial_nested_object() {
        let result: Result<CharacterPatch, _> = serde_json::from_value(json!({
            "abilities": { "str": 16 }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_null_clears_optional_field() {
        let mut character = create_default_character();
        character.paragon_path = Some("Iron Vanguard".to_string());

        let untouched: CharacterPatch = serde_json::from_value(json!({ "name": "Bob" })).unwrap();
        untouched.apply(&mut character);
        assert_eq!(character.paragon_path.as_deref(), Some("Iron Vanguard"));

        let clearing: CharacterPatch =
            serde_json::from_value(json!({ "paragonPath": null })).unwrap();
        assert_eq!(clearing.paragon_path, Some(None));
        clearing.apply(&mut character);
        assert!(character.paragon_path.is_none());
    }

    #[test]
    fn test_empty_patch() {
        assert!(CharacterPatch::new().is_empty());
        assert!(!CharacterPatch::new().speed(5).is_empty());
    }

    #[test]
    fn test_recalculate() {
        let mut character = Character::new("Tordek");
        character.abilities = AbilityScores::new(16, 14, 12, 10, 13, 8);
        character.level = 4;
        character.recalculate(&rules::DefenseBonuses::default());

        assert_eq!(character.defenses.fort, 15);
        assert_eq!(character.initiative_bonus, 3);
        assert_eq!(character.passive_perception, 13);
    }

    #[test]
    fn test_hit_points_invariants() {
        let mut hp = HitPoints::new(30, 9);
        assert!(hp.is_consistent());
        assert_eq!(hp.surge_value, 7);

        hp.temp = 5;
        hp.current = 35;
        assert!(hp.is_consistent());

        hp.current = 36;
        assert!(!hp.is_consistent());

        hp.current = 15;
        assert!(hp.is_bloodied());
    }

    #[test]
    fn test_wizard_step_from_phase() {
        assert_eq!(WizardStep::from_phase(1), WizardStep::Race);
        assert_eq!(WizardStep::from_phase(3), WizardStep::Abilities);
        assert_eq!(WizardStep::from_phase(9), WizardStep::Details);
        // Out of range phases clamp
        assert_eq!(WizardStep::from_phase(0), WizardStep::Race);
        assert_eq!(WizardStep::from_phase(-4), WizardStep::Race);
        assert_eq!(WizardStep::from_phase(42), WizardStep::Details);
    }

    #[test]
    fn test_wizard_step_navigation() {
        assert_eq!(WizardStep::Race.next(), Some(WizardStep::Class));
        assert_eq!(WizardStep::Details.next(), None);
        assert_eq!(WizardStep::Race.previous(), None);
        assert_eq!(WizardStep::Numbers.previous(), Some(WizardStep::Equipment));

        for step in WizardStep::all() {
            assert_eq!(WizardStep::from_phase(step.phase()), step);
            assert_eq!(WizardStep::parse(step.slug()), Some(step));
        }
    }

    #[test]
    fn test_wizard_step_display() {
        assert_eq!(WizardStep::Race.to_string(), "Phase 1: Choose Race");
        assert_eq!(WizardStep::Details.to_string(), "Phase 9: Roleplaying Details");
    }

    #[test]
    fn test_ability_parse() {
        assert_eq!(Ability::parse("str"), Some(Ability::Strength));
        assert_eq!(Ability::parse("Wisdom"), Some(Ability::Wisdom));
        assert_eq!(Ability::parse("luck"), None);
    }
}
