use std::fmt::Write as _;

use crate::filter::FilterDocument;
use crate::filter::condition::ConditionKind;

use super::error::CoreError;
use super::features::TierFeature;
use super::types::{CurrencyTier, RgbSize};
use super::well_known_items::{ChaosRecipeSlot, PORTAL_SCROLL, WISDOM_SCROLL};

pub const DLF_TYPE_PREFIX: &str = "dlf_";

pub const STACK_TYPE_TAG: &str = "dlf_currency_stack";
pub const GEMS_TYPE_TAG: &str = "dlf_gems";
pub const FLASKS_TYPE_TAG: &str = "dlf_flasks";
pub const MAPS_TYPE_TAG: &str = "dlf_maps";
pub const OILS_TYPE_TAG: &str = "dlf_oils";
pub const RGB_TYPE_TAG: &str = "dlf_rgb";
pub const CHAOS_RECIPE_TYPE_TAG: &str = "dlf_chaos_recipe_rares";

pub const QUALITY_TIER: &str = "quality";
pub const MAPS_HIDE_BELOW_TIER: &str = "hide_below";
pub const OILS_HIDDEN_TIER: &str = "hidden";
pub const FLASK_BASE_TYPES_TIER: &str = "base_types";
pub const FLASK_HIGH_ILVL_TIER: &str = "high_ilvl_base_types";

pub const DEFAULT_MIN_QUALITY: u32 = 20;
const HIGH_ILVL_FLASK_LEVEL: u32 = 85;
const CHAOS_RECIPE_ILVL: (u32, u32) = (60, 74);

const BANNER: &str = "#===============================================================================================================";

/// Builds rule text line by line. Disabled rules get every line after the
/// header comment prefixed with `#`.
struct RuleWriter {
    out: String,
}

impl RuleWriter {
    fn rule(&mut self, action: &str, disabled: bool, type_tag: &str, tier_tag: &str, body: &[String]) {
        let marker = if disabled { "#" } else { "" };
        let _ = writeln!(self.out, "{marker}{action} # $type->{type_tag} $tier->{tier_tag}");
        for line in body {
            let _ = writeln!(self.out, "{marker}\t{line}");
        }
        self.out.push('\n');
    }
}

fn quoted(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn base_type_line(values: &[String]) -> String {
    let mut line = "BaseType ==".to_string();
    for v in values {
        let _ = write!(line, " \"{v}\"");
    }
    line
}

/// Currencies currently listed in a tier of the downloaded filter.
fn currency_members(doc: &FilterDocument, tier: CurrencyTier) -> Vec<String> {
    let rule = doc
        .find_by_tags(TierFeature::Currency.type_tag(), &tier.tier_tag())
        .ok()
        .and_then(|r| doc.rule(r));
    let listed: Vec<String> = rule
        .and_then(|r| r.membership(ConditionKind::BaseType))
        .map(|c| c.string_values().to_vec())
        .unwrap_or_default();
    if !listed.is_empty() {
        return listed;
    }
    match tier {
        CurrencyTier::Portal => vec![PORTAL_SCROLL.to_string()],
        CurrencyTier::Wisdom => vec![WISDOM_SCROLL.to_string()],
        CurrencyTier::Tier(_) => listed,
    }
}

/// Text of the rules the engine's own features edit. Every rule starts in a
/// state that leaves the downloaded filter's behaviour unchanged.
pub fn render_section(doc: &FilterDocument) -> String {
    let mut w = RuleWriter { out: String::new() };
    let _ = writeln!(w.out, "{BANNER}");
    let _ = writeln!(w.out, "# [[0000]] Dynamic Loot Filter rules");
    let _ = writeln!(w.out, "{BANNER}");
    w.out.push('\n');

    for tier in CurrencyTier::all() {
        let members = currency_members(doc, tier);
        w.rule(
            "Hide",
            true,
            STACK_TYPE_TAG,
            &tier.tier_tag(),
            &[
                "Class == \"Stackable Currency\"".to_string(),
                base_type_line(&members),
                "StackSize < 2".to_string(),
            ],
        );
    }

    w.rule(
        "Hide",
        true,
        OILS_TYPE_TAG,
        OILS_HIDDEN_TIER,
        &[
            "Class == \"Stackable Currency\"".to_string(),
            "BaseType ==".to_string(),
        ],
    );

    w.rule(
        "Show",
        true,
        GEMS_TYPE_TAG,
        QUALITY_TIER,
        &[
            "Class \"Gems\"".to_string(),
            format!("Quality >= {DEFAULT_MIN_QUALITY}"),
            "SetFontSize 40".to_string(),
            "SetBorderColor 30 150 180".to_string(),
            "MinimapIcon 1 Blue Triangle".to_string(),
        ],
    );

    w.rule(
        "Show",
        true,
        FLASKS_TYPE_TAG,
        QUALITY_TIER,
        &[
            "Class \"Flasks\"".to_string(),
            format!("Quality >= {DEFAULT_MIN_QUALITY}"),
            "SetFontSize 40".to_string(),
            "SetBorderColor 50 200 125".to_string(),
        ],
    );

    w.rule(
        "Show",
        true,
        FLASKS_TYPE_TAG,
        FLASK_BASE_TYPES_TIER,
        &[
            "Class \"Flasks\"".to_string(),
            "BaseType ==".to_string(),
            "SetFontSize 40".to_string(),
            "SetBorderColor 50 200 125".to_string(),
        ],
    );

    w.rule(
        "Show",
        true,
        FLASKS_TYPE_TAG,
        FLASK_HIGH_ILVL_TIER,
        &[
            "Class \"Flasks\"".to_string(),
            format!("ItemLevel >= {HIGH_ILVL_FLASK_LEVEL}"),
            "BaseType ==".to_string(),
            "SetFontSize 40".to_string(),
            "SetBorderColor 50 200 125".to_string(),
        ],
    );

    w.rule(
        "Hide",
        false,
        MAPS_TYPE_TAG,
        MAPS_HIDE_BELOW_TIER,
        &[
            "Class == \"Maps\"".to_string(),
            "Rarity <= Rare".to_string(),
            "MapTier < 0".to_string(),
        ],
    );

    for (size, height) in RgbSize::SIZED.into_iter().zip([2, 3, 4]) {
        w.rule(
            "Show",
            true,
            RGB_TYPE_TAG,
            size.as_str(),
            &[
                "Rarity <= Rare".to_string(),
                "SocketGroup \"RGB\"".to_string(),
                "Width <= 2".to_string(),
                format!("Height <= {height}"),
                "SetFontSize 32".to_string(),
                "SetBorderColor 150 150 150".to_string(),
            ],
        );
    }

    for slot in ChaosRecipeSlot::ALL {
        w.rule(
            "Show",
            true,
            CHAOS_RECIPE_TYPE_TAG,
            slot.tier_tag(),
            &[
                format!("Class == {}", quoted(slot.classes())),
                "Rarity Rare".to_string(),
                "Identified False".to_string(),
                format!("ItemLevel >= {}", CHAOS_RECIPE_ILVL.0),
                format!("ItemLevel <= {}", CHAOS_RECIPE_ILVL.1),
                "SetFontSize 40".to_string(),
                "SetBorderColor 200 200 0".to_string(),
            ],
        );
    }

    w.out
}

impl FilterDocument {
    pub fn has_dlf_section(&self) -> bool {
        self.rules()
            .iter()
            .any(|r| r.type_tag().is_some_and(|t| t.starts_with(DLF_TYPE_PREFIX)))
    }

    /// Insert the DLF rules before the first rule unless the filter already
    /// has them. Returns the number of rules added.
    pub fn ensure_dlf_section(&mut self) -> Result<usize, CoreError> {
        if self.has_dlf_section() {
            return Ok(0);
        }
        let mut text = render_section(self);
        if self.uses_crlf() {
            text = text.replace('\n', "\r\n");
        }
        let added = self.insert_before_first_rule(&text)?;
        tracing::info!(rules = added, "inserted DLF rule section");
        Ok(added)
    }

    fn uses_crlf(&self) -> bool {
        self.to_text_unmodified().contains("\r\n")
    }
}
