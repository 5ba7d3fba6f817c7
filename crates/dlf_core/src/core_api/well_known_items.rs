//! Built-in name tables for the feature families the engine edits.
//!
//! Names are the in-game base type names used in `BaseType` conditions.
//! Lookups are case-insensitive and return the canonical spelling.

use serde::{Deserialize, Serialize};

#[rustfmt::skip]
pub const CURRENCY_NAMES: &[&str] = &[
    // Top tier
    "Mirror of Kalandra",       "Mirror Shard",             "Divine Orb",
    "Exalted Orb",              "Orb of Dominance",         "Awakener's Orb",
    "Sacred Orb",               "Hunter's Exalted Orb",     "Crusader's Exalted Orb",
    "Redeemer's Exalted Orb",   "Warlord's Exalted Orb",    "Tainted Divine Teardrop",

    // Common trade currency
    "Chaos Orb",                "Orb of Annulment",         "Ancient Orb",
    "Harbinger's Orb",          "Orb of Unmaking",          "Veiled Chaos Orb",
    "Vaal Orb",                 "Regal Orb",                "Gemcutter's Prism",
    "Orb of Regret",            "Orb of Scouring",          "Blessed Orb",
    "Orb of Fusing",            "Orb of Horizons",          "Orb of Binding",
    "Enkindling Orb",           "Instilling Orb",           "Cartographer's Chisel",
    "Glassblower's Bauble",     "Engineer's Orb",           "Stacked Deck",
    "Silver Coin",              "Exalted Shard",            "Annulment Shard",

    // Low tier
    "Orb of Alchemy",           "Orb of Alteration",        "Jeweller's Orb",
    "Chromatic Orb",            "Orb of Chance",            "Orb of Augmentation",
    "Orb of Transmutation",     "Blacksmith's Whetstone",   "Armourer's Scrap",
    "Transmutation Shard",      "Alteration Shard",         "Alchemy Shard",
    "Chaos Shard",              "Regal Shard",              "Horizon Shard",
    "Scroll Fragment",

    // Scrolls (fixed tiers)
    "Portal Scroll",            "Scroll of Wisdom",
];

#[rustfmt::skip]
pub const ARCHNEMESIS_MODS: &[&str] = &[
    "Abberath-touched",     "Arakaali-touched",     "Arcane Buffer",        "Assassin",
    "Berserker",            "Bloodletter",          "Bombardier",           "Bonebreaker",
    "Brine King-touched",   "Chaosweaver",          "Consecrator",          "Corpse Detonator",
    "Corrupter",            "Crystal-skinned",      "Deadeye",              "Drought Bringer",
    "Dynamo",               "Echoist",              "Effigy",               "Empowered Elements",
    "Empowering Minions",   "Entangler",            "Executioner",          "Flame Strider",
    "Flameweaver",          "Frenzied",             "Frost Strider",        "Frostweaver",
    "Gargantuan",           "Hasted",               "Heralding Minions",    "Hexer",
    "Ice Prison",           "Incendiary",           "Innocence-touched",    "Invulnerable",
    "Juggernaut",           "Kitava-touched",       "Lunaris-touched",      "Magma Barrier",
    "Malediction",          "Mana Siphoner",        "Mirror Image",         "Necromancer",
    "Opulent",              "Overcharged",          "Permafrost",           "Rejuvenating",
    "Sentinel",             "Shakari-touched",      "Solaris-touched",      "Soul Conduit",
    "Soul Eater",           "Steel-infused",        "Storm Strider",        "Stormweaver",
    "Temporal Bubble",      "Toxic",                "Treant Horde",         "Trickster",
    "Tukohama-touched",     "Vampiric",
];

/// Blight oils from least to most valuable.
#[rustfmt::skip]
pub const OIL_NAMES: &[&str] = &[
    "Clear Oil",    "Sepia Oil",    "Amber Oil",    "Verdant Oil",
    "Teal Oil",     "Azure Oil",    "Indigo Oil",   "Violet Oil",
    "Crimson Oil",  "Black Oil",    "Opalescent Oil", "Silver Oil",
    "Golden Oil",
];

#[rustfmt::skip]
pub const FLASK_BASE_TYPES: &[&str] = &[
    // Life
    "Small Life Flask",     "Medium Life Flask",    "Large Life Flask",     "Greater Life Flask",
    "Grand Life Flask",     "Giant Life Flask",     "Colossal Life Flask",  "Sacred Life Flask",
    "Hallowed Life Flask",  "Sanctified Life Flask", "Divine Life Flask",   "Eternal Life Flask",

    // Mana
    "Small Mana Flask",     "Medium Mana Flask",    "Large Mana Flask",     "Greater Mana Flask",
    "Grand Mana Flask",     "Giant Mana Flask",     "Colossal Mana Flask",  "Sacred Mana Flask",
    "Hallowed Mana Flask",  "Sanctified Mana Flask", "Divine Mana Flask",   "Eternal Mana Flask",

    // Hybrid
    "Small Hybrid Flask",   "Medium Hybrid Flask",  "Large Hybrid Flask",   "Colossal Hybrid Flask",
    "Sacred Hybrid Flask",  "Hallowed Hybrid Flask",

    // Utility
    "Diamond Flask",        "Ruby Flask",           "Sapphire Flask",       "Topaz Flask",
    "Granite Flask",        "Quicksilver Flask",    "Amethyst Flask",       "Quartz Flask",
    "Jade Flask",           "Basalt Flask",         "Aquamarine Flask",     "Stibnite Flask",
    "Sulphur Flask",        "Silver Flask",         "Bismuth Flask",        "Gold Flask",
    "Corundum Flask",       "Iron Flask",
];

pub const PORTAL_SCROLL: &str = "Portal Scroll";
pub const WISDOM_SCROLL: &str = "Scroll of Wisdom";

fn canonical(table: &'static [&'static str], name: &str) -> Option<&'static str> {
    let name = name.trim();
    table
        .iter()
        .copied()
        .find(|entry| entry.eq_ignore_ascii_case(name))
}

pub fn canonical_currency_name(name: &str) -> Option<&'static str> {
    canonical(CURRENCY_NAMES, name)
}

pub fn canonical_archnemesis_mod(name: &str) -> Option<&'static str> {
    canonical(ARCHNEMESIS_MODS, name)
}

pub fn canonical_flask_base_type(name: &str) -> Option<&'static str> {
    canonical(FLASK_BASE_TYPES, name)
}

/// Position of an oil in value order, 0 being the cheapest.
pub fn oil_rank(name: &str) -> Option<usize> {
    let name = name.trim();
    OIL_NAMES.iter().position(|oil| oil.eq_ignore_ascii_case(name))
}

/// Item slots of the chaos orb vendor recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosRecipeSlot {
    Weapons,
    BodyArmours,
    Helmets,
    Gloves,
    Boots,
    Amulets,
    Rings,
    Belts,
}

#[rustfmt::skip]
const WEAPON_CLASSES: &[&str] = &[
    "Bows", "Staves", "Warstaves", "Two Hand Swords", "Two Hand Axes", "Two Hand Maces",
    "Daggers", "Rune Daggers", "Wands", "One Hand Swords", "Thrusting One Hand Swords",
    "One Hand Axes", "One Hand Maces", "Sceptres", "Claws",
];

impl ChaosRecipeSlot {
    pub const ALL: [Self; 8] = [
        Self::Weapons,
        Self::BodyArmours,
        Self::Helmets,
        Self::Gloves,
        Self::Boots,
        Self::Amulets,
        Self::Rings,
        Self::Belts,
    ];

    pub fn label(&self) -> &'static str {
        match *self {
            Self::Weapons => "Weapons",
            Self::BodyArmours => "Body Armours",
            Self::Helmets => "Helmets",
            Self::Gloves => "Gloves",
            Self::Boots => "Boots",
            Self::Amulets => "Amulets",
            Self::Rings => "Rings",
            Self::Belts => "Belts",
        }
    }

    pub fn tier_tag(&self) -> &'static str {
        match *self {
            Self::Weapons => "weapons",
            Self::BodyArmours => "body_armours",
            Self::Helmets => "helmets",
            Self::Gloves => "gloves",
            Self::Boots => "boots",
            Self::Amulets => "amulets",
            Self::Rings => "rings",
            Self::Belts => "belts",
        }
    }

    /// Item classes the slot's rule matches.
    pub fn classes(&self) -> &'static [&'static str] {
        match *self {
            Self::Weapons => WEAPON_CLASSES,
            Self::BodyArmours => &["Body Armours"],
            Self::Helmets => &["Helmets"],
            Self::Gloves => &["Gloves"],
            Self::Boots => &["Boots"],
            Self::Amulets => &["Amulets"],
            Self::Rings => &["Rings"],
            Self::Belts => &["Belts"],
        }
    }

    /// Accepts the label (`Body Armours`) or the tag (`body_armours`).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|slot| slot.label().eq_ignore_ascii_case(name) || slot.tier_tag() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_return_canonical_spelling() {
        assert_eq!(canonical_currency_name("orb of alchemy"), Some("Orb of Alchemy"));
        assert_eq!(canonical_currency_name("Orb of Nothing"), None);
        assert_eq!(canonical_archnemesis_mod("FRENZIED"), Some("Frenzied"));
        assert_eq!(canonical_flask_base_type(" quicksilver flask "), Some("Quicksilver Flask"));
    }

    #[test]
    fn oils_are_ordered_by_value() {
        assert_eq!(oil_rank("Clear Oil"), Some(0));
        assert!(oil_rank("Golden Oil") > oil_rank("Silver Oil"));
        assert_eq!(oil_rank("Snake Oil"), None);
    }

    #[test]
    fn chaos_slots_by_label_or_tag() {
        assert_eq!(ChaosRecipeSlot::from_name("body armours"), Some(ChaosRecipeSlot::BodyArmours));
        assert_eq!(ChaosRecipeSlot::from_name("body_armours"), Some(ChaosRecipeSlot::BodyArmours));
        assert_eq!(ChaosRecipeSlot::from_name("Shields"), None);
        assert!(ChaosRecipeSlot::Weapons.classes().contains(&"Bows"));
    }

    #[test]
    fn tables_have_no_duplicates() {
        for table in [CURRENCY_NAMES, ARCHNEMESIS_MODS, OIL_NAMES, FLASK_BASE_TYPES] {
            for (i, a) in table.iter().enumerate() {
                assert!(
                    !table[i + 1..].iter().any(|b| b.eq_ignore_ascii_case(a)),
                    "duplicate entry {a}"
                );
            }
        }
    }
}
