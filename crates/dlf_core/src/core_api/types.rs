use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::matcher::FidelityGap;
use crate::visibility::Visibility;

use super::error::{CoreError, CoreErrorCode};
use super::well_known_items::ChaosRecipeSlot;

pub const CURRENCY_TIER_RANGE: std::ops::RangeInclusive<u32> = 1..=9;

/// A tier of the currency stack-size rules: a numbered tier or one of the
/// two scroll tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyTier {
    Tier(u32),
    Portal,
    Wisdom,
}

impl CurrencyTier {
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let text = text.trim().to_ascii_lowercase();
        let bare = text.strip_prefix('t').unwrap_or(&text);
        match bare {
            "portal" => return Ok(Self::Portal),
            "wisdom" => return Ok(Self::Wisdom),
            _ => {}
        }
        let tier: u32 = bare.parse().map_err(|_| {
            CoreError::new(
                CoreErrorCode::InvalidEnum,
                format!("'{text}' is not a currency tier (1-9, portal or wisdom)"),
            )
        })?;
        let tier = Self::Tier(tier);
        tier.validate()?;
        Ok(tier)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match *self {
            Self::Tier(n) if !CURRENCY_TIER_RANGE.contains(&n) => Err(CoreError::new(
                CoreErrorCode::OutOfRange,
                format!("currency tier {n} outside 1..=9"),
            )),
            _ => Ok(()),
        }
    }

    pub fn all() -> Vec<Self> {
        CURRENCY_TIER_RANGE
            .map(Self::Tier)
            .chain([Self::Portal, Self::Wisdom])
            .collect()
    }

    pub fn tier_tag(&self) -> String {
        match *self {
            Self::Tier(n) => format!("t{n}"),
            Self::Portal => "tportal".to_string(),
            Self::Wisdom => "twisdom".to_string(),
        }
    }

    /// Stack sizes a threshold may be set to; low tiers drop in small stacks.
    pub fn legal_thresholds(&self) -> &'static [u32] {
        match *self {
            Self::Tier(1..=7) => &[1, 2, 4],
            _ => &[1, 2, 4, 6],
        }
    }
}

impl fmt::Display for CurrencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Tier(n) => write!(f, "{n}"),
            Self::Portal => f.write_str("portal"),
            Self::Wisdom => f.write_str("wisdom"),
        }
    }
}

/// Smallest stack of a currency tier that stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackThreshold {
    Size(u32),
    HideAll,
}

impl fmt::Display for StackThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Size(n) => write!(f, "{n}"),
            Self::HideAll => f.write_str("hide_all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RgbSize {
    None,
    Small,
    Medium,
    Large,
}

impl RgbSize {
    pub const SIZED: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::None => "none",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportMode {
    Always,
    OnlyIfMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTierEntry {
    pub name: String,
    pub tier: u32,
    pub modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierVisibilityEntry {
    pub tier: u32,
    pub visibility: Visibility,
    pub modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaskVisibility {
    pub base_type: String,
    pub visible: bool,
    pub high_ilvl_visible: bool,
    pub modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosRecipeStatus {
    pub slot: ChaosRecipeSlot,
    pub enabled: bool,
    pub modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_index: usize,
    pub line: usize,
    pub type_tag: Option<String>,
    pub tier_tag: Option<String>,
    pub visibility: Visibility,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDiagnostic {
    pub matched: Option<RuleMatch>,
    pub gaps: Vec<FidelityGap>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayWarning {
    pub sequence: u64,
    pub operation: String,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub applied: usize,
    pub unchanged: usize,
    pub warnings: Vec<ReplayWarning>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub applied: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: bool,
    pub output_path: PathBuf,
    pub rule_count: usize,
    pub dlf_rules_added: usize,
    pub parse_warnings: usize,
    pub replay: ReplayReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_tier_parsing() {
        assert_eq!(CurrencyTier::parse("3").unwrap(), CurrencyTier::Tier(3));
        assert_eq!(CurrencyTier::parse("t9").unwrap(), CurrencyTier::Tier(9));
        assert_eq!(CurrencyTier::parse("tportal").unwrap(), CurrencyTier::Portal);
        assert_eq!(CurrencyTier::parse("Wisdom").unwrap(), CurrencyTier::Wisdom);
        assert_eq!(
            CurrencyTier::parse("10").unwrap_err().code,
            CoreErrorCode::OutOfRange
        );
        assert_eq!(
            CurrencyTier::parse("gold").unwrap_err().code,
            CoreErrorCode::InvalidEnum
        );
    }

    #[test]
    fn thresholds_depend_on_tier() {
        assert_eq!(CurrencyTier::Tier(7).legal_thresholds(), &[1, 2, 4]);
        assert_eq!(CurrencyTier::Tier(8).legal_thresholds(), &[1, 2, 4, 6]);
        assert_eq!(CurrencyTier::Portal.legal_thresholds(), &[1, 2, 4, 6]);
        assert_eq!(CurrencyTier::all().len(), 11);
    }
}
