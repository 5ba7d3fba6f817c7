use serde::{Deserialize, Serialize};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::filter::condition::Rarity;

const SECTION_SEPARATOR: &str = "--------";

pub const INFLUENCE_NAMES: [&str; 6] = [
    "Shaper", "Elder", "Crusader", "Redeemer", "Hunter", "Warlord",
];

/// Attributes of a dropped item, as far as they are known. `None` means the
/// description did not say; the matcher decides per condition kind what an
/// absent attribute means.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub class: Option<String>,
    pub base_type: Option<String>,
    pub name: Option<String>,
    pub rarity: Option<Rarity>,
    pub item_level: Option<i64>,
    pub drop_level: Option<i64>,
    pub quality: Option<i64>,
    pub sockets: Option<i64>,
    pub linked_sockets: Option<i64>,
    /// Linked socket groups as colour letters, e.g. `["RGB", "B"]`.
    pub socket_groups: Vec<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub stack_size: Option<i64>,
    pub gem_level: Option<i64>,
    pub map_tier: Option<i64>,
    pub area_level: Option<i64>,
    pub corrupted: Option<bool>,
    pub identified: Option<bool>,
    pub mirrored: Option<bool>,
    pub shaper_item: Option<bool>,
    pub elder_item: Option<bool>,
    pub fractured_item: Option<bool>,
    pub synthesised_item: Option<bool>,
    pub blighted_map: Option<bool>,
    pub replica: Option<bool>,
    pub any_enchantment: Option<bool>,
    pub influences: Vec<String>,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_base_type(mut self, base_type: &str) -> Self {
        self.base_type = Some(base_type.to_string());
        self
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = Some(rarity);
        self
    }

    pub fn with_item_level(mut self, level: i64) -> Self {
        self.item_level = Some(level);
        self
    }

    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_stack_size(mut self, size: i64) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn with_map_tier(mut self, tier: i64) -> Self {
        self.map_tier = Some(tier);
        self
    }

    pub fn with_area_level(mut self, level: i64) -> Self {
        self.area_level = Some(level);
        self
    }

    pub fn with_size(mut self, width: i64, height: i64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sockets in the game's notation: `R-G-B B` is a linked RGB group plus
    /// a lone blue socket.
    pub fn with_sockets(mut self, sockets: &str) -> Self {
        self.socket_groups = parse_socket_groups(sockets);
        self
    }

    pub fn with_identified(mut self, identified: bool) -> Self {
        self.identified = Some(identified);
        self
    }

    pub fn with_influence(mut self, influence: &str) -> Self {
        self.influences.push(influence.to_string());
        self
    }

    pub fn socket_count(&self) -> Option<i64> {
        self.sockets.or_else(|| {
            (!self.socket_groups.is_empty())
                .then(|| self.socket_groups.iter().map(|g| g.len() as i64).sum())
        })
    }

    pub fn linked_socket_count(&self) -> Option<i64> {
        self.linked_sockets.or_else(|| {
            self.socket_groups
                .iter()
                .map(|g| g.len() as i64)
                .max()
        })
    }

    /// Parse the text the game puts on the clipboard when an item is copied.
    pub fn from_item_text(text: &str) -> Result<Self, CoreError> {
        let mut item = Item::new();
        let mut sections: Vec<Vec<&str>> = vec![Vec::new()];
        for line in text.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if line == SECTION_SEPARATOR {
                sections.push(Vec::new());
            } else if let Some(current) = sections.last_mut() {
                current.push(line);
            }
        }

        let header = &sections[0];
        let mut names = Vec::new();
        for line in header {
            if let Some(value) = line.strip_prefix("Item Class:") {
                item.class = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Rarity:") {
                let value = value.trim();
                // Currency, gems and cards report their own rarity names.
                item.rarity = Some(Rarity::from_name(value).unwrap_or(Rarity::Normal));
            } else {
                names.push(*line);
            }
        }
        if item.class.is_none() && item.rarity.is_none() {
            return Err(CoreError::new(
                CoreErrorCode::Parse,
                "item text has neither an 'Item Class:' nor a 'Rarity:' line",
            ));
        }
        match names.as_slice() {
            [] => {}
            [base] => item.base_type = Some(strip_base_prefixes(base).to_string()),
            [name, base, ..] => {
                item.name = Some((*name).to_string());
                item.base_type = Some(strip_base_prefixes(base).to_string());
            }
        }

        let is_gem = item
            .class
            .as_deref()
            .is_some_and(|c| c.contains("Gem"));
        let mut identified = true;

        for section in &sections[1..] {
            let in_requirements = section.first() == Some(&"Requirements:");
            for line in section {
                if let Some((key, value)) = line.split_once(':') {
                    let value = value.trim();
                    match key {
                        "Quality" => item.quality = Some(leading_number(line, value)?),
                        "Item Level" => item.item_level = Some(leading_number(line, value)?),
                        "Map Tier" => item.map_tier = Some(leading_number(line, value)?),
                        "Stack Size" => {
                            let current = value.split('/').next().unwrap_or(value);
                            item.stack_size = Some(leading_number(line, current)?);
                        }
                        "Level" if is_gem && !in_requirements => {
                            item.gem_level = Some(leading_number(line, value)?);
                        }
                        "Sockets" => item.socket_groups = parse_socket_groups(value),
                        _ => {}
                    }
                    continue;
                }
                match *line {
                    "Corrupted" => item.corrupted = Some(true),
                    "Unidentified" => identified = false,
                    "Mirrored" => item.mirrored = Some(true),
                    "Synthesised Item" => item.synthesised_item = Some(true),
                    "Fractured Item" => item.fractured_item = Some(true),
                    "Blighted" => item.blighted_map = Some(true),
                    other => {
                        if let Some(influence) = other.strip_suffix(" Item") {
                            if INFLUENCE_NAMES.contains(&influence) {
                                item.influences.push(influence.to_string());
                                match influence {
                                    "Shaper" => item.shaper_item = Some(true),
                                    "Elder" => item.elder_item = Some(true),
                                    _ => {}
                                }
                            }
                        }
                    }
                }
            }
        }

        item.identified = Some(identified);
        if let Some(base) = &item.base_type {
            if base.starts_with("Blighted ") && item.map_tier.is_some() {
                item.blighted_map = Some(true);
            }
        }
        Ok(item)
    }
}

fn strip_base_prefixes(base: &str) -> &str {
    let base = base.strip_prefix("Superior ").unwrap_or(base);
    base.strip_prefix("Synthesised ").unwrap_or(base)
}

/// First run of digits in `value` (`+20% (augmented)` gives 20).
fn leading_number(line: &str, value: &str) -> Result<i64, CoreError> {
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse().map_err(|_| {
        CoreError::new(
            CoreErrorCode::Parse,
            format!("expected a number in item line '{line}'"),
        )
    })
}

fn parse_socket_groups(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|group| {
            group
                .split('-')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_ascii_uppercase())
                .collect::<String>()
        })
        .filter(|g| !g.is_empty())
        .collect()
}
