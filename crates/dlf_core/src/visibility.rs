use std::fmt;

use serde::{Deserialize, Serialize};

/// Effective state of a rule: shown, hidden, or disabled (commented out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Show,
    Hide,
    Disable,
}

impl Visibility {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "show" => Some(Self::Show),
            "hide" => Some(Self::Hide),
            "disable" | "disabled" => Some(Self::Disable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Show => "show",
            Self::Hide => "hide",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The keyword that opens a rule block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKeyword {
    Show,
    Hide,
    Minimal,
}

impl ActionKeyword {
    pub const ALL: [Self; 3] = [Self::Show, Self::Hide, Self::Minimal];

    pub fn keyword(&self) -> &'static str {
        match *self {
            Self::Show => "Show",
            Self::Hide => "Hide",
            Self::Minimal => "Minimal",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == word)
    }

    /// `Minimal` displays the item, so it counts as shown.
    pub fn visibility(&self) -> Visibility {
        match *self {
            Self::Show | Self::Minimal => Visibility::Show,
            Self::Hide => Visibility::Hide,
        }
    }
}

impl fmt::Display for ActionKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
