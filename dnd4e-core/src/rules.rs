//! D&D 4E rules engine.
//!
//! Pure functions that derive numbers from a character's base attributes:
//! ability modifiers, half-level bonuses, point-buy costs and the derived
//! statistics shown on the character sheet.
//!
//! Nothing here performs I/O and nothing here refuses a value. Point buy in
//! particular is only *classified* (legal or houseruled); the wizard lets the
//! player overspend or underspend as they like.

use crate::character::{Ability, AbilityScores, Defenses};
use serde::{Deserialize, Serialize};

// ============================================================================
// Level and Ability Math
// ============================================================================

/// Half of the character's level, rounded down.
pub fn half_level(level: i32) -> i32 {
    level.div_euclid(2)
}

/// Ability modifier for a score: `floor((score - 10) / 2)`.
///
/// Uses floor division, so odd scores below 10 round toward negative
/// infinity (9 gives -1, 7 gives -2).
pub fn ability_modifier(score: i32) -> i32 {
    score.saturating_sub(10).div_euclid(2)
}

/// Ability modifier plus half level, the bonus most 4E checks use.
pub fn modifier_plus_half_level(score: i32, level: i32) -> i32 {
    ability_modifier(score).saturating_add(half_level(level))
}

// ============================================================================
// Point Buy
// ============================================================================

/// Points available when buying scores at character creation.
pub const POINT_BUY_BUDGET: i32 = 32;

/// Lowest score purchasable with point buy.
pub const POINT_BUY_MIN: i32 = 8;

/// Highest score purchasable with point buy.
pub const POINT_BUY_MAX: i32 = 18;

/// Cost of each score from 8 through 18.
const POINT_BUY_COSTS: [i32; 11] = [0, 1, 2, 3, 4, 5, 7, 9, 11, 14, 18];

/// Point-buy cost of a single score.
///
/// Scores below 8 cost nothing and scores above 18 cost the same as 18.
pub fn point_buy_cost(score: i32) -> i32 {
    let index = score.clamp(POINT_BUY_MIN, POINT_BUY_MAX) - POINT_BUY_MIN;
    POINT_BUY_COSTS[index as usize]
}

/// Total points spent across all six scores.
pub fn total_points_spent(scores: &AbilityScores) -> i32 {
    Ability::all()
        .into_iter()
        .map(|ability| point_buy_cost(scores.get(ability)))
        .sum()
}

/// Points left in the budget. Negative when the player has overspent.
pub fn points_remaining(scores: &AbilityScores) -> i32 {
    POINT_BUY_BUDGET - total_points_spent(scores)
}

/// Display classification of a point-buy allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointBuyStatus {
    /// Exactly the budget spent and every score within 8..=18.
    Legal,
    /// Anything else. Still a perfectly usable character.
    Houseruled,
}

impl PointBuyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PointBuyStatus::Legal => "Legal",
            PointBuyStatus::Houseruled => "Houseruled",
        }
    }
}

/// Whether an allocation follows strict point buy.
pub fn is_legal_point_buy(scores: &AbilityScores) -> bool {
    total_points_spent(scores) == POINT_BUY_BUDGET
        && Ability::all()
            .into_iter()
            .all(|ability| (POINT_BUY_MIN..=POINT_BUY_MAX).contains(&scores.get(ability)))
}

/// Classify an allocation for display.
pub fn point_buy_status(scores: &AbilityScores) -> PointBuyStatus {
    if is_legal_point_buy(scores) {
        PointBuyStatus::Legal
    } else {
        PointBuyStatus::Houseruled
    }
}

// ============================================================================
// Score Editing
// ============================================================================

/// How a score is being edited, which decides its hard bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    /// Stepper controls during character creation: 8 through 18.
    #[default]
    Creation,
    /// Free-text editing of an existing character: at least 1.
    Free,
}

impl EditMode {
    pub fn floor(&self) -> i32 {
        match self {
            EditMode::Creation => POINT_BUY_MIN,
            EditMode::Free => 1,
        }
    }

    pub fn ceiling(&self) -> Option<i32> {
        match self {
            EditMode::Creation => Some(POINT_BUY_MAX),
            EditMode::Free => None,
        }
    }

    fn clamp(&self, score: i32) -> i32 {
        let raised = score.max(self.floor());
        match self.ceiling() {
            Some(ceiling) => raised.min(ceiling),
            None => raised,
        }
    }
}

/// Move a score by `delta`, stopping at the edit mode's bounds.
///
/// The budget is never consulted; a player may step past 32 points.
pub fn step_score(score: i32, delta: i32, mode: EditMode) -> i32 {
    mode.clamp(score.saturating_add(delta))
}

/// Parse a typed score and clamp it to the edit mode's bounds.
pub fn parse_score(text: &str, mode: EditMode) -> Option<i32> {
    text.trim().parse::<i32>().ok().map(|score| mode.clamp(score))
}

// ============================================================================
// Derived Statistics
// ============================================================================

/// Flat bonuses from race, class, armor and feats applied on top of the
/// ability-derived base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseBonuses {
    pub ac: i32,
    pub fort: i32,
    pub reflex: i32,
    pub will: i32,
}

/// Compute defenses from abilities and level.
///
/// Each non-AC defense uses the better modifier of its ability pair.
/// AC gets no ability modifier here; armor and the light-armor
/// Dex/Int bonus arrive through `bonuses.ac`.
pub fn derive_defenses(scores: &AbilityScores, level: i32, bonuses: &DefenseBonuses) -> Defenses {
    let base = half_level(level).saturating_add(10);
    let best = |a: Ability, b: Ability| {
        ability_modifier(scores.get(a)).max(ability_modifier(scores.get(b)))
    };

    Defenses {
        ac: base.saturating_add(bonuses.ac),
        fort: base
            .saturating_add(best(Ability::Strength, Ability::Constitution))
            .saturating_add(bonuses.fort),
        reflex: base
            .saturating_add(best(Ability::Dexterity, Ability::Intelligence))
            .saturating_add(bonuses.reflex),
        will: base
            .saturating_add(best(Ability::Wisdom, Ability::Charisma))
            .saturating_add(bonuses.will),
    }
}

/// Initiative bonus: Dexterity modifier plus half level.
pub fn initiative(scores: &AbilityScores, level: i32) -> i32 {
    modifier_plus_half_level(scores.dexterity, level)
}

/// Passive check for an untrained skill keyed off `score`.
pub fn passive_skill(score: i32, level: i32) -> i32 {
    modifier_plus_half_level(score, level).saturating_add(10)
}

/// Healing surge value: a quarter of maximum hit points.
pub fn surge_value(max_hp: i32) -> i32 {
    max_hp.div_euclid(4)
}

/// Bloodied threshold: half of maximum hit points.
pub fn bloodied_value(max_hp: i32) -> i32 {
    max_hp.div_euclid(2)
}
