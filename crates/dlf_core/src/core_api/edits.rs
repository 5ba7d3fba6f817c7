use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::filter::condition::{Condition, ConditionKind, Direction, Operator};
use crate::filter::{FilterDocument, RuleEdit, RuleRef};
use crate::visibility::Visibility;

use super::dlf_section::{
    CHAOS_RECIPE_TYPE_TAG, DEFAULT_MIN_QUALITY, FLASK_BASE_TYPES_TIER, FLASK_HIGH_ILVL_TIER, FLASKS_TYPE_TAG,
    GEMS_TYPE_TAG, MAPS_HIDE_BELOW_TIER, MAPS_TYPE_TAG, OILS_HIDDEN_TIER, OILS_TYPE_TAG,
    QUALITY_TIER, RGB_TYPE_TAG, STACK_TYPE_TAG,
};
use super::error::{CoreError, CoreErrorCode};
use super::features::{self, TierFeature};
use super::types::{CurrencyTier, RgbSize, StackThreshold};
use super::well_known_items::{
    ChaosRecipeSlot, OIL_NAMES, canonical_archnemesis_mod, canonical_currency_name,
    canonical_flask_base_type, oil_rank,
};

pub const QUALITY_RANGE: std::ops::RangeInclusive<u32> = 1..=20;
pub const MAP_TIER_RANGE: std::ops::RangeInclusive<u32> = 0..=17;

/// One semantic change to a filter, addressed by tags or names rather than
/// by position, so it can be replayed onto a freshly downloaded filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edit {
    SetRuleVisibility {
        type_tag: String,
        tier_tag: String,
        visibility: Visibility,
    },
    SetCurrencyToTier {
        currency: String,
        tier: u32,
    },
    SetCurrencyStackThreshold {
        tier: CurrencyTier,
        threshold: StackThreshold,
    },
    SetArchnemesisModTier {
        modifier: String,
        tier: u32,
    },
    SetHideTiersAbove {
        feature: TierFeature,
        max_visible_tier: u32,
    },
    SetLowestVisibleOil {
        oil: String,
    },
    SetGemMinQuality {
        quality: u32,
    },
    SetFlaskMinQuality {
        quality: u32,
    },
    SetHideMapsBelowTier {
        tier: u32,
    },
    SetFlaskVisibility {
        base_type: String,
        visible: bool,
    },
    SetHighIlvlFlaskVisibility {
        base_type: String,
        visible: bool,
    },
    SetRgbItemMaxSize {
        size: RgbSize,
    },
    SetChaosRecipeEnabled {
        slot: ChaosRecipeSlot,
        enabled: bool,
    },
}

impl Edit {
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::SetRuleVisibility { .. } => "set_rule_visibility",
            Self::SetCurrencyToTier { .. } => "set_currency_to_tier",
            Self::SetCurrencyStackThreshold { .. } => "set_currency_tier_min_visible_stack_size",
            Self::SetArchnemesisModTier { .. } => "set_archnemesis_mod_tier",
            Self::SetHideTiersAbove { .. } => "set_hide_tiers_above",
            Self::SetLowestVisibleOil { .. } => "set_lowest_visible_oil",
            Self::SetGemMinQuality { .. } => "set_gem_min_quality",
            Self::SetFlaskMinQuality { .. } => "set_flask_min_quality",
            Self::SetHideMapsBelowTier { .. } => "set_hide_maps_below_tier",
            Self::SetFlaskVisibility { .. } => "set_flask_visibility",
            Self::SetHighIlvlFlaskVisibility { .. } => "set_high_ilvl_flask_visibility",
            Self::SetRgbItemMaxSize { .. } => "set_rgb_item_max_size",
            Self::SetChaosRecipeEnabled { .. } => "set_chaos_recipe_enabled_for",
        }
    }

    /// Semantic address of what the edit changes. Names are case-folded so
    /// two spellings of one target share a log entry.
    pub fn target_key(&self) -> String {
        match self {
            Self::SetRuleVisibility {
                type_tag, tier_tag, ..
            } => format!("rule:{type_tag}/{tier_tag}"),
            Self::SetCurrencyToTier { currency, .. } => {
                format!("currency:{}", currency.trim().to_lowercase())
            }
            Self::SetCurrencyStackThreshold { tier, .. } => format!("stack:{}", tier.tier_tag()),
            Self::SetArchnemesisModTier { modifier, .. } => {
                format!("archnemesis:{}", modifier.trim().to_lowercase())
            }
            Self::SetHideTiersAbove { feature, .. } => format!("tiers:{}", feature.type_tag()),
            Self::SetLowestVisibleOil { .. } => format!("{OILS_TYPE_TAG}/{OILS_HIDDEN_TIER}"),
            Self::SetGemMinQuality { .. } => format!("{GEMS_TYPE_TAG}/{QUALITY_TIER}"),
            Self::SetFlaskMinQuality { .. } => format!("{FLASKS_TYPE_TAG}/{QUALITY_TIER}"),
            Self::SetHideMapsBelowTier { .. } => format!("{MAPS_TYPE_TAG}/{MAPS_HIDE_BELOW_TIER}"),
            Self::SetFlaskVisibility { base_type, .. }
            | Self::SetHighIlvlFlaskVisibility { base_type, .. } => {
                format!("flask:{}", base_type.trim().to_lowercase())
            }
            Self::SetRgbItemMaxSize { .. } => RGB_TYPE_TAG.to_string(),
            Self::SetChaosRecipeEnabled { slot, .. } => {
                format!("{CHAOS_RECIPE_TYPE_TAG}/{}", slot.tier_tag())
            }
        }
    }

    /// Validate, then apply. Returns whether the document changed; an error
    /// leaves the document untouched.
    pub fn apply(&self, doc: &mut FilterDocument) -> Result<bool, CoreError> {
        match self {
            Self::SetRuleVisibility {
                type_tag,
                tier_tag,
                visibility,
            } => {
                let rule_ref = doc.find_by_tags(type_tag, tier_tag)?;
                doc.mutate(rule_ref, RuleEdit::SetVisibility(*visibility))
            }
            Self::SetCurrencyToTier { currency, tier } => set_currency_to_tier(doc, currency, *tier),
            Self::SetCurrencyStackThreshold { tier, threshold } => {
                set_stack_threshold(doc, *tier, *threshold)
            }
            Self::SetArchnemesisModTier { modifier, tier } => {
                let name = canonical_archnemesis_mod(modifier).ok_or_else(|| {
                    CoreError::new(
                        CoreErrorCode::InvalidEnum,
                        format!("unknown archnemesis mod '{modifier}'"),
                    )
                })?;
                features::move_member(doc, TierFeature::Archnemesis, name, *tier)
            }
            Self::SetHideTiersAbove {
                feature,
                max_visible_tier,
            } => {
                if !TierFeature::HIDE_ABOVE.contains(feature) {
                    return Err(CoreError::new(
                        CoreErrorCode::InvalidEnum,
                        format!("{} has no tier visibility threshold", feature.label()),
                    ));
                }
                features::set_visible_through(doc, *feature, *max_visible_tier)
            }
            Self::SetLowestVisibleOil { oil } => set_lowest_visible_oil(doc, oil),
            Self::SetGemMinQuality { quality } => set_min_quality(doc, GEMS_TYPE_TAG, *quality),
            Self::SetFlaskMinQuality { quality } => {
                set_min_quality(doc, FLASKS_TYPE_TAG, *quality)
            }
            Self::SetHideMapsBelowTier { tier } => set_hide_maps_below_tier(doc, *tier),
            Self::SetFlaskVisibility { base_type, visible } => {
                set_flask_visibility(doc, FLASK_BASE_TYPES_TIER, base_type, *visible)
            }
            Self::SetHighIlvlFlaskVisibility { base_type, visible } => {
                set_flask_visibility(doc, FLASK_HIGH_ILVL_TIER, base_type, *visible)
            }
            Self::SetRgbItemMaxSize { size } => set_rgb_item_max_size(doc, *size),
            Self::SetChaosRecipeEnabled { slot, enabled } => {
                let rule_ref = doc.find_by_tags(CHAOS_RECIPE_TYPE_TAG, slot.tier_tag())?;
                let visibility = if *enabled {
                    Visibility::Show
                } else {
                    Visibility::Disable
                };
                doc.mutate(rule_ref, RuleEdit::SetVisibility(visibility))
            }
        }
    }
}

fn unknown_currency(name: &str) -> CoreError {
    CoreError::new(
        CoreErrorCode::UnknownCurrency,
        format!("'{name}' is not a known currency"),
    )
}

// --- Currency tiers ---

fn set_currency_to_tier(doc: &mut FilterDocument, name: &str, tier: u32) -> Result<bool, CoreError> {
    let name = canonical_currency_name(name).ok_or_else(|| unknown_currency(name))?;
    let previous = features::tier_of(doc, TierFeature::Currency, name);
    if !features::move_member(doc, TierFeature::Currency, name, tier)? {
        return Ok(false);
    }

    // The stack-size rules list the same currencies per tier.
    if let Some(previous) = previous {
        let source = doc.find_by_tags(STACK_TYPE_TAG, &TierFeature::tier_tag(previous));
        let target = doc.find_by_tags(STACK_TYPE_TAG, &TierFeature::tier_tag(tier));
        match (source, target) {
            (Ok(source), Ok(target)) => {
                if doc.mutate(source, RuleEdit::RemoveMember(ConditionKind::BaseType, name.to_string()))? {
                    doc.mutate(target, RuleEdit::AddMember(ConditionKind::BaseType, name.to_string()))?;
                }
            }
            _ => tracing::debug!(currency = name, "no stack rules to update"),
        }
    }
    Ok(true)
}

pub fn currency_tier(doc: &FilterDocument, name: &str) -> Result<u32, CoreError> {
    let name = canonical_currency_name(name).ok_or_else(|| unknown_currency(name))?;
    features::tier_of(doc, TierFeature::Currency, name).ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::NotFound,
            format!("{name} is not listed in any currency tier"),
        )
    })
}

// --- Currency stack thresholds ---

fn stack_rule(doc: &FilterDocument, tier: CurrencyTier) -> Result<RuleRef, CoreError> {
    tier.validate()?;
    doc.find_by_tags(STACK_TYPE_TAG, &tier.tier_tag())
}

fn set_stack_threshold(
    doc: &mut FilterDocument,
    tier: CurrencyTier,
    threshold: StackThreshold,
) -> Result<bool, CoreError> {
    if let StackThreshold::Size(size) = threshold {
        if !tier.legal_thresholds().contains(&size) {
            return Err(CoreError::new(
                CoreErrorCode::OutOfRange,
                format!(
                    "stack size {size} not allowed for currency tier {tier}; expected one of {:?}",
                    tier.legal_thresholds()
                ),
            ));
        }
    }
    let rule_ref = stack_rule(doc, tier)?;
    if stack_threshold_of(doc, rule_ref) == threshold {
        return Ok(false);
    }

    let changed = match threshold {
        StackThreshold::Size(1) => doc.mutate(rule_ref, RuleEdit::SetVisibility(Visibility::Disable))?,
        StackThreshold::Size(size) => {
            let condition =
                Condition::integer(ConditionKind::StackSize, Operator::Less, i64::from(size));
            let a = doc.mutate(rule_ref, RuleEdit::SetCondition(condition))?;
            let b = doc.mutate(rule_ref, RuleEdit::SetVisibility(Visibility::Hide))?;
            a || b
        }
        StackThreshold::HideAll => {
            let a = doc.mutate(
                rule_ref,
                RuleEdit::RemoveCondition(ConditionKind::StackSize, Direction::Upper),
            )?;
            let b = doc.mutate(rule_ref, RuleEdit::SetVisibility(Visibility::Hide))?;
            a || b
        }
    };
    Ok(changed)
}

fn stack_threshold_of(doc: &FilterDocument, rule_ref: RuleRef) -> StackThreshold {
    let Some(rule) = doc.rule(rule_ref) else {
        return StackThreshold::Size(1);
    };
    if rule.visibility() != Visibility::Hide {
        return StackThreshold::Size(1);
    }
    match rule.condition(ConditionKind::StackSize, Direction::Upper) {
        Some(condition) => {
            let bound = condition.first_integer().unwrap_or(1).max(1) as u32;
            match condition.operator {
                Operator::LessEqual => StackThreshold::Size(bound + 1),
                _ => StackThreshold::Size(bound),
            }
        }
        None => StackThreshold::HideAll,
    }
}

pub fn stack_threshold(doc: &FilterDocument, tier: CurrencyTier) -> Result<StackThreshold, CoreError> {
    let rule_ref = stack_rule(doc, tier)?;
    Ok(stack_threshold_of(doc, rule_ref))
}

// --- Oils ---

fn hidden_oils(doc: &FilterDocument) -> Result<(RuleRef, BTreeSet<usize>), CoreError> {
    let rule_ref = doc.find_by_tags(OILS_TYPE_TAG, OILS_HIDDEN_TIER)?;
    let ranks = doc
        .rule(rule_ref)
        .filter(|rule| rule.visibility() == Visibility::Hide)
        .and_then(|rule| rule.membership(ConditionKind::BaseType))
        .map(|c| c.string_values().iter().filter_map(|v| oil_rank(v)).collect())
        .unwrap_or_default();
    Ok((rule_ref, ranks))
}

fn set_lowest_visible_oil(doc: &mut FilterDocument, oil: &str) -> Result<bool, CoreError> {
    let rank = oil_rank(oil).ok_or_else(|| {
        CoreError::new(CoreErrorCode::InvalidEnum, format!("unknown oil '{oil}'"))
    })?;
    let (rule_ref, hidden) = hidden_oils(doc)?;
    let desired: BTreeSet<usize> = (0..rank).collect();
    if hidden == desired {
        return Ok(false);
    }
    let names = OIL_NAMES[..rank].iter().map(|n| n.to_string()).collect();
    let mut changed = doc.mutate(rule_ref, RuleEdit::SetMembers(ConditionKind::BaseType, names))?;
    if rank > 0 {
        changed |= doc.mutate(rule_ref, RuleEdit::SetVisibility(Visibility::Hide))?;
    }
    Ok(changed)
}

pub fn lowest_visible_oil(doc: &FilterDocument) -> Result<&'static str, CoreError> {
    let (_, hidden) = hidden_oils(doc)?;
    OIL_NAMES
        .iter()
        .enumerate()
        .find(|(rank, _)| !hidden.contains(rank))
        .map(|(_, name)| *name)
        .ok_or_else(|| CoreError::new(CoreErrorCode::NotFound, "every oil is hidden"))
}

// --- Quality thresholds ---

fn set_min_quality(doc: &mut FilterDocument, type_tag: &str, quality: u32) -> Result<bool, CoreError> {
    if !QUALITY_RANGE.contains(&quality) {
        return Err(CoreError::new(
            CoreErrorCode::OutOfRange,
            format!("{type_tag} minimum quality {quality} outside 1..=20"),
        ));
    }
    let rule_ref = doc.find_by_tags(type_tag, QUALITY_TIER)?;
    let condition =
        Condition::integer(ConditionKind::Quality, Operator::GreaterEqual, i64::from(quality));
    let set = doc.mutate(rule_ref, RuleEdit::SetCondition(condition))?;
    let shown = doc.mutate(rule_ref, RuleEdit::SetVisibility(Visibility::Show))?;
    Ok(set || shown)
}

/// Minimum quality highlighted; the untouched rule is disabled and reads as
/// the default.
pub fn min_quality(doc: &FilterDocument, type_tag: &str) -> Result<u32, CoreError> {
    let rule_ref = doc.find_by_tags(type_tag, QUALITY_TIER)?;
    let rule = doc.rule(rule_ref);
    if rule.is_some_and(|r| r.visibility() == Visibility::Disable) {
        return Ok(DEFAULT_MIN_QUALITY);
    }
    let condition = rule
        .and_then(|r| r.condition(ConditionKind::Quality, Direction::Lower))
        .ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::NotFound,
                format!("{type_tag}/{QUALITY_TIER} rule has no Quality lower bound"),
            )
        })?;
    let bound = condition.first_integer().unwrap_or(0).max(0) as u32;
    Ok(match condition.operator {
        Operator::Greater => bound + 1,
        _ => bound,
    })
}

// --- Maps ---

fn set_hide_maps_below_tier(doc: &mut FilterDocument, tier: u32) -> Result<bool, CoreError> {
    if !MAP_TIER_RANGE.contains(&tier) {
        return Err(CoreError::new(
            CoreErrorCode::OutOfRange,
            format!("map tier {tier} outside 0..=17"),
        ));
    }
    let rule_ref = doc.find_by_tags(MAPS_TYPE_TAG, MAPS_HIDE_BELOW_TIER)?;
    let condition = Condition::integer(ConditionKind::MapTier, Operator::Less, i64::from(tier));
    doc.mutate(rule_ref, RuleEdit::SetCondition(condition))
}

pub fn hide_maps_below_tier(doc: &FilterDocument) -> Result<u32, CoreError> {
    let rule_ref = doc.find_by_tags(MAPS_TYPE_TAG, MAPS_HIDE_BELOW_TIER)?;
    let condition = doc
        .rule(rule_ref)
        .and_then(|r| r.condition(ConditionKind::MapTier, Direction::Upper))
        .ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::NotFound,
                format!("{MAPS_TYPE_TAG}/{MAPS_HIDE_BELOW_TIER} rule has no MapTier bound"),
            )
        })?;
    let bound = condition.first_integer().unwrap_or(0).max(0) as u32;
    Ok(match condition.operator {
        Operator::LessEqual => bound + 1,
        _ => bound,
    })
}

// --- Flasks ---

fn flask_name(base_type: &str) -> Result<&'static str, CoreError> {
    canonical_flask_base_type(base_type).ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::InvalidEnum,
            format!("unknown flask base type '{base_type}'"),
        )
    })
}

fn set_flask_visibility(
    doc: &mut FilterDocument,
    tier_tag: &str,
    base_type: &str,
    visible: bool,
) -> Result<bool, CoreError> {
    let name = flask_name(base_type)?;
    let rule_ref = doc.find_by_tags(FLASKS_TYPE_TAG, tier_tag)?;
    if !visible {
        return doc.mutate(rule_ref, RuleEdit::RemoveMember(ConditionKind::BaseType, name.to_string()));
    }
    let added = doc.mutate(rule_ref, RuleEdit::AddMember(ConditionKind::BaseType, name.to_string()))?;
    let shown = doc.mutate(rule_ref, RuleEdit::SetVisibility(Visibility::Show))?;
    Ok(added || shown)
}

pub fn flask_visible(doc: &FilterDocument, tier_tag: &str, base_type: &str) -> Result<bool, CoreError> {
    let name = flask_name(base_type)?;
    let rule_ref = doc.find_by_tags(FLASKS_TYPE_TAG, tier_tag)?;
    Ok(doc
        .rule(rule_ref)
        .is_some_and(|r| r.visibility() == Visibility::Show && r.has_member(ConditionKind::BaseType, name)))
}

// --- RGB ---

fn rgb_rules(doc: &FilterDocument) -> Result<Vec<(RgbSize, RuleRef)>, CoreError> {
    RgbSize::SIZED
        .into_iter()
        .map(|size| Ok((size, doc.find_by_tags(RGB_TYPE_TAG, size.as_str())?)))
        .collect()
}

fn set_rgb_item_max_size(doc: &mut FilterDocument, max: RgbSize) -> Result<bool, CoreError> {
    let mut changed = false;
    for (size, rule_ref) in rgb_rules(doc)? {
        let visibility = if size <= max {
            Visibility::Show
        } else {
            Visibility::Disable
        };
        changed |= doc.mutate(rule_ref, RuleEdit::SetVisibility(visibility))?;
    }
    Ok(changed)
}

pub fn rgb_item_max_size(doc: &FilterDocument) -> Result<RgbSize, CoreError> {
    Ok(rgb_rules(doc)?
        .into_iter()
        .filter(|(_, r)| doc.rule(*r).is_some_and(|rule| rule.visibility() == Visibility::Show))
        .map(|(size, _)| size)
        .max()
        .unwrap_or(RgbSize::None))
}

// --- Chaos recipe ---

pub fn chaos_recipe_enabled(doc: &FilterDocument, slot: ChaosRecipeSlot) -> Result<bool, CoreError> {
    let rule_ref = doc.find_by_tags(CHAOS_RECIPE_TYPE_TAG, slot.tier_tag())?;
    Ok(doc
        .rule(rule_ref)
        .is_some_and(|r| r.visibility() == Visibility::Show))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_keys_fold_case() {
        let a = Edit::SetCurrencyToTier {
            currency: "Chaos Orb".to_string(),
            tier: 2,
        };
        let b = Edit::SetCurrencyToTier {
            currency: " chaos orb".to_string(),
            tier: 3,
        };
        assert_eq!(a.target_key(), b.target_key());
        assert_eq!(a.operation_name(), "set_currency_to_tier");

        let flask = Edit::SetFlaskVisibility {
            base_type: "Quicksilver Flask".to_string(),
            visible: true,
        };
        let high = Edit::SetHighIlvlFlaskVisibility {
            base_type: "Quicksilver Flask".to_string(),
            visible: true,
        };
        assert_eq!(flask.target_key(), high.target_key());
        assert_ne!(flask.operation_name(), high.operation_name());
    }

    #[test]
    fn edits_serialize_with_snake_case_names() {
        let edit = Edit::SetGemMinQuality { quality: 15 };
        let json = serde_json::to_string(&edit).expect("failed to serialize");
        assert_eq!(json, r#"{"set_gem_min_quality":{"quality":15}}"#);
        let back: Edit = serde_json::from_str(&json).expect("failed to deserialize");
        assert_eq!(back, edit);
    }

    #[test]
    fn validation_happens_before_lookup() {
        let mut doc = FilterDocument::parse("").expect("failed to parse");
        let err = Edit::SetGemMinQuality { quality: 21 }.apply(&mut doc).unwrap_err();
        assert_eq!(err.code, CoreErrorCode::OutOfRange);
        let err = Edit::SetCurrencyToTier {
            currency: "Orb of Nothing".to_string(),
            tier: 3,
        }
        .apply(&mut doc)
        .unwrap_err();
        assert_eq!(err.code, CoreErrorCode::UnknownCurrency);
        let err = Edit::SetLowestVisibleOil {
            oil: "Snake Oil".to_string(),
        }
        .apply(&mut doc)
        .unwrap_err();
        assert_eq!(err.code, CoreErrorCode::InvalidEnum);
    }
}
