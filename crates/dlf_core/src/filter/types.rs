// Filter text constants and keyword tables

pub const TYPE_TAG_PREFIX: &str = "$type->";
pub const TIER_TAG_PREFIX: &str = "$tier->";

/// Prefix that comments out a disabled rule line.
pub const DISABLE_PREFIX: char = '#';

pub const DEFAULT_BODY_INDENT: &str = "\t";

/// Action-line comment token on a rule the engine disabled because one of
/// its membership lists went empty.
pub const EMPTIED_MARKER: &str = "$dlf_emptied";

// --- Style directives (preserved, never interpreted) ---

pub const STYLE_KEYWORDS: &[&str] = &[
    "SetFontSize",
    "SetTextColor",
    "SetBorderColor",
    "SetBackgroundColor",
    "PlayAlertSound",
    "PlayAlertSoundPositional",
    "CustomAlertSound",
    "CustomAlertSoundOptional",
    "MinimapIcon",
    "PlayEffect",
    "DisableDropSound",
    "EnableDropSound",
    "DisableDropSoundIfAlertSound",
    "EnableDropSoundIfAlertSound",
    "Continue",
];

// --- Conditions the game accepts but the matcher cannot evaluate ---
// Item descriptions carry no mod, enchantment or defence-roll data.

pub const UNSIMULATED_CONDITION_KEYWORDS: &[&str] = &[
    "HasExplicitMod",
    "HasImplicitMod",
    "EnchantmentPassiveNode",
    "EnchantmentPassiveNum",
    "HasEnchantment",
    "GemQualityType",
    "AlternateQuality",
    "ElderMap",
    "ShapedMap",
    "UberBlightedMap",
    "HasSearingExarchImplicit",
    "HasEaterOfWorldsImplicit",
    "ArchnemesisMod",
    "TransfiguredGem",
    "BaseDefencePercentile",
    "BaseArmour",
    "BaseEvasion",
    "BaseEnergyShield",
    "BaseWard",
    "Scourged",
    "UnidentifiedItemTier",
    "ZanaMemory",
    "MemoryStrands",
    "CorruptedMods",
    "Prophecy",
];

pub fn is_style_keyword(word: &str) -> bool {
    STYLE_KEYWORDS.contains(&word)
}

pub fn is_unsimulated_keyword(word: &str) -> bool {
    UNSIMULATED_CONDITION_KEYWORDS.contains(&word)
}

/// Split a line into its leading whitespace and the rest.
pub fn split_indent(text: &str) -> (&str, &str) {
    let body = text.trim_start();
    (&text[..text.len() - body.len()], body)
}

/// First whitespace-delimited word and the remainder (leading space kept).
pub fn split_keyword(body: &str) -> (&str, &str) {
    let end = body
        .find(|c: char| c.is_whitespace() || c == '#')
        .unwrap_or(body.len());
    (&body[..end], &body[end..])
}

/// Byte offset of a `#` comment that is not inside a quoted string.
pub fn comment_start(text: &str) -> Option<usize> {
    let mut quoted = false;
    for (idx, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '#' if !quoted => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Split `rest` into operand text and trailing comment, where the trailing
/// part keeps the whitespace that precedes the `#`.
pub fn split_trailing_comment(rest: &str) -> (&str, &str) {
    match comment_start(rest) {
        Some(idx) => {
            let operand = rest[..idx].trim_end();
            (operand, &rest[operand.len()..])
        }
        None => {
            let operand = rest.trim_end();
            (operand, &rest[operand.len()..])
        }
    }
}

/// Extract `$type->` / `$tier->` values from a comment.
pub fn extract_tags(comment: &str) -> (Option<String>, Option<String>) {
    let mut type_tag = None;
    let mut tier_tag = None;
    for token in comment.split_whitespace() {
        if let Some(value) = token.strip_prefix(TYPE_TAG_PREFIX) {
            if !value.is_empty() {
                type_tag = Some(value.to_string());
            }
        } else if let Some(value) = token.strip_prefix(TIER_TAG_PREFIX) {
            if !value.is_empty() {
                tier_tag = Some(value.to_string());
            }
        }
    }
    (type_tag, tier_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_neversink_tags() {
        let (ty, tier) = extract_tags(" # %D5 $type->currency->essence $tier->t3 extra");
        assert_eq!(ty.as_deref(), Some("currency->essence"));
        assert_eq!(tier.as_deref(), Some("t3"));

        let (ty, tier) = extract_tags("# plain comment");
        assert!(ty.is_none() && tier.is_none());
    }

    #[test]
    fn trailing_comment_ignores_hashes_in_quotes() {
        let (operand, trailing) = split_trailing_comment(" == \"Orb #1\" \"B\"   # note");
        assert_eq!(operand, " == \"Orb #1\" \"B\"");
        assert_eq!(trailing, "   # note");

        let (operand, trailing) = split_trailing_comment(" >= 5  ");
        assert_eq!(operand, " >= 5");
        assert_eq!(trailing, "  ");
    }

    #[test]
    fn keyword_split_stops_at_comment() {
        assert_eq!(split_keyword("Show# $type->x"), ("Show", "# $type->x"));
        assert_eq!(split_keyword("BaseType == \"A\""), ("BaseType", " == \"A\""));
        assert_eq!(split_indent("\t\tRarity Rare"), ("\t\t", "Rarity Rare"));
    }
}
