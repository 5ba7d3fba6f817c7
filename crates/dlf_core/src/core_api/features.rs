use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::filter::condition::ConditionKind;
use crate::filter::{FilterDocument, RuleEdit, RuleRef};
use crate::visibility::Visibility;

use super::error::{CoreError, CoreErrorCode};

/// Feature families whose rules are tier buckets `t1..tN` of one type tag,
/// each bucket holding a `BaseType` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierFeature {
    Currency,
    Archnemesis,
    Essences,
    DivinationCards,
    UniqueItems,
    UniqueMaps,
}

pub struct FeatureSpec {
    pub type_tag: &'static str,
    pub label: &'static str,
    pub max_tier: u32,
}

#[rustfmt::skip]
const FEATURES: &[(TierFeature, FeatureSpec)] = &[
    (TierFeature::Currency,        FeatureSpec { type_tag: "currency",          label: "currency",          max_tier: 9 }),
    (TierFeature::Archnemesis,     FeatureSpec { type_tag: "archnemesis",       label: "archnemesis mods",  max_tier: 4 }),
    (TierFeature::Essences,        FeatureSpec { type_tag: "currency->essence", label: "essences",          max_tier: 6 }),
    (TierFeature::DivinationCards, FeatureSpec { type_tag: "divination",        label: "divination cards",  max_tier: 6 }),
    (TierFeature::UniqueItems,     FeatureSpec { type_tag: "uniques",           label: "unique items",      max_tier: 5 }),
    (TierFeature::UniqueMaps,      FeatureSpec { type_tag: "maps->uniques",     label: "unique maps",       max_tier: 4 }),
];

const MEMBERSHIP: ConditionKind = ConditionKind::BaseType;

impl TierFeature {
    /// Features edited by flipping tier visibilities rather than moving items.
    pub const HIDE_ABOVE: [Self; 4] = [
        Self::Essences,
        Self::DivinationCards,
        Self::UniqueItems,
        Self::UniqueMaps,
    ];

    pub fn spec(&self) -> &'static FeatureSpec {
        FEATURES
            .iter()
            .find(|(feature, _)| feature == self)
            .map(|(_, spec)| spec)
            .unwrap_or(&FEATURES[0].1)
    }

    pub fn type_tag(&self) -> &'static str {
        self.spec().type_tag
    }

    pub fn label(&self) -> &'static str {
        self.spec().label
    }

    pub fn tiers(&self) -> RangeInclusive<u32> {
        1..=self.spec().max_tier
    }

    pub fn tier_tag(tier: u32) -> String {
        format!("t{tier}")
    }

    pub fn validate_tier(&self, tier: u32) -> Result<(), CoreError> {
        if self.tiers().contains(&tier) {
            Ok(())
        } else {
            Err(CoreError::new(
                CoreErrorCode::OutOfRange,
                format!(
                    "{} tier {tier} outside 1..={}",
                    self.label(),
                    self.spec().max_tier
                ),
            ))
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "currency" => Some(Self::Currency),
            "archnemesis" => Some(Self::Archnemesis),
            "essences" | "essence" => Some(Self::Essences),
            "divination" | "div_cards" | "divination_cards" => Some(Self::DivinationCards),
            "uniques" | "unique_items" => Some(Self::UniqueItems),
            "unique_maps" => Some(Self::UniqueMaps),
            _ => None,
        }
    }
}

pub fn tier_rule(
    doc: &FilterDocument,
    feature: TierFeature,
    tier: u32,
) -> Result<RuleRef, CoreError> {
    doc.find_by_tags(feature.type_tag(), &TierFeature::tier_tag(tier))
}

/// Tier whose rule lists `name`, searching low tiers first. Missing tier
/// rules are skipped.
pub fn tier_of(doc: &FilterDocument, feature: TierFeature, name: &str) -> Option<u32> {
    feature.tiers().find(|&tier| {
        tier_rule(doc, feature, tier)
            .ok()
            .and_then(|r| doc.rule(r))
            .is_some_and(|rule| rule.has_member(MEMBERSHIP, name))
    })
}

/// Every (name, tier) pair in tier order.
pub fn members(doc: &FilterDocument, feature: TierFeature) -> Vec<(String, u32)> {
    let mut out = Vec::new();
    for tier in feature.tiers() {
        let Some(rule) = tier_rule(doc, feature, tier).ok().and_then(|r| doc.rule(r)) else {
            continue;
        };
        if let Some(condition) = rule.membership(MEMBERSHIP) {
            out.extend(condition.string_values().iter().map(|v| (v.clone(), tier)));
        }
    }
    out
}

/// Move `name` from whichever tier lists it into `target`.
pub fn move_member(
    doc: &mut FilterDocument,
    feature: TierFeature,
    name: &str,
    target: u32,
) -> Result<bool, CoreError> {
    feature.validate_tier(target)?;
    let target_ref = tier_rule(doc, feature, target).map_err(|e| {
        CoreError::new(
            CoreErrorCode::InvalidTier,
            format!("{} tier {target} has no rule: {}", feature.label(), e.message),
        )
    })?;
    let Some(current) = tier_of(doc, feature, name) else {
        return Err(CoreError::new(
            CoreErrorCode::NotFound,
            format!("{name} is not listed in any {} tier", feature.label()),
        ));
    };
    if current == target {
        return Ok(false);
    }
    let current_ref = tier_rule(doc, feature, current)?;
    // Keep the spelling the filter already uses.
    let stored = doc
        .rule(current_ref)
        .and_then(|r| r.membership(MEMBERSHIP))
        .and_then(|c| {
            c.string_values()
                .iter()
                .find(|v| v.eq_ignore_ascii_case(name))
                .cloned()
        })
        .unwrap_or_else(|| name.to_string());

    doc.mutate(current_ref, RuleEdit::RemoveMember(MEMBERSHIP, stored.clone()))?;
    doc.mutate(target_ref, RuleEdit::AddMember(MEMBERSHIP, stored))?;
    Ok(true)
}

pub fn tier_visibilities(
    doc: &FilterDocument,
    feature: TierFeature,
) -> Result<Vec<(u32, Visibility)>, CoreError> {
    feature
        .tiers()
        .map(|tier| {
            let rule_ref = tier_rule(doc, feature, tier)?;
            let visibility = doc
                .rule(rule_ref)
                .map(|r| r.visibility())
                .unwrap_or(Visibility::Disable);
            Ok((tier, visibility))
        })
        .collect()
}

/// Highest tier still shown; 0 when every tier is hidden.
pub fn visible_through(doc: &FilterDocument, feature: TierFeature) -> Result<u32, CoreError> {
    Ok(tier_visibilities(doc, feature)?
        .into_iter()
        .filter(|(_, v)| *v == Visibility::Show)
        .map(|(tier, _)| tier)
        .max()
        .unwrap_or(0))
}

/// Show tiers `1..=max_visible` and hide the rest.
pub fn set_visible_through(
    doc: &mut FilterDocument,
    feature: TierFeature,
    max_visible: u32,
) -> Result<bool, CoreError> {
    if max_visible > feature.spec().max_tier {
        return Err(CoreError::new(
            CoreErrorCode::OutOfRange,
            format!(
                "{} visibility threshold {max_visible} outside 0..={}",
                feature.label(),
                feature.spec().max_tier
            ),
        ));
    }
    // Resolve every tier before touching any of them.
    let refs = feature
        .tiers()
        .map(|tier| Ok((tier, tier_rule(doc, feature, tier)?)))
        .collect::<Result<Vec<_>, CoreError>>()?;

    let mut changed = false;
    for (tier, rule_ref) in refs {
        let visibility = if tier <= max_visible {
            Visibility::Show
        } else {
            Visibility::Hide
        };
        changed |= doc.mutate(rule_ref, RuleEdit::SetVisibility(visibility))?;
    }
    Ok(changed)
}
