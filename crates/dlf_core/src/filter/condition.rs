use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    Class,
    BaseType,
    Rarity,
    ItemLevel,
    DropLevel,
    Quality,
    Sockets,
    LinkedSockets,
    SocketGroup,
    Height,
    Width,
    StackSize,
    GemLevel,
    MapTier,
    AreaLevel,
    Corrupted,
    Identified,
    Mirrored,
    ShaperItem,
    ElderItem,
    FracturedItem,
    SynthesisedItem,
    BlightedMap,
    Replica,
    AnyEnchantment,
    HasInfluence,
}

/// How a condition's operand list is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    Strings,
    Integer,
    Rarity,
    Boolean,
    Sockets,
}

#[rustfmt::skip]
const CONDITION_KINDS: &[(ConditionKind, &str, OperandType)] = &[
    (ConditionKind::Class,           "Class",           OperandType::Strings),
    (ConditionKind::BaseType,        "BaseType",        OperandType::Strings),
    (ConditionKind::Rarity,          "Rarity",          OperandType::Rarity),
    (ConditionKind::ItemLevel,       "ItemLevel",       OperandType::Integer),
    (ConditionKind::DropLevel,       "DropLevel",       OperandType::Integer),
    (ConditionKind::Quality,         "Quality",         OperandType::Integer),
    (ConditionKind::Sockets,         "Sockets",         OperandType::Sockets),
    (ConditionKind::LinkedSockets,   "LinkedSockets",   OperandType::Integer),
    (ConditionKind::SocketGroup,     "SocketGroup",     OperandType::Sockets),
    (ConditionKind::Height,          "Height",          OperandType::Integer),
    (ConditionKind::Width,           "Width",           OperandType::Integer),
    (ConditionKind::StackSize,       "StackSize",       OperandType::Integer),
    (ConditionKind::GemLevel,        "GemLevel",        OperandType::Integer),
    (ConditionKind::MapTier,         "MapTier",         OperandType::Integer),
    (ConditionKind::AreaLevel,       "AreaLevel",       OperandType::Integer),
    (ConditionKind::Corrupted,       "Corrupted",       OperandType::Boolean),
    (ConditionKind::Identified,      "Identified",      OperandType::Boolean),
    (ConditionKind::Mirrored,        "Mirrored",        OperandType::Boolean),
    (ConditionKind::ShaperItem,      "ShaperItem",      OperandType::Boolean),
    (ConditionKind::ElderItem,       "ElderItem",       OperandType::Boolean),
    (ConditionKind::FracturedItem,   "FracturedItem",   OperandType::Boolean),
    (ConditionKind::SynthesisedItem, "SynthesisedItem", OperandType::Boolean),
    (ConditionKind::BlightedMap,     "BlightedMap",     OperandType::Boolean),
    (ConditionKind::Replica,         "Replica",         OperandType::Boolean),
    (ConditionKind::AnyEnchantment,  "AnyEnchantment",  OperandType::Boolean),
    (ConditionKind::HasInfluence,    "HasInfluence",    OperandType::Strings),
];

impl ConditionKind {
    pub fn from_keyword(word: &str) -> Option<Self> {
        CONDITION_KINDS
            .iter()
            .find(|(_, keyword, _)| *keyword == word)
            .map(|(kind, _, _)| *kind)
    }

    pub fn keyword(&self) -> &'static str {
        self.entry().1
    }

    pub fn operand_type(&self) -> OperandType {
        self.entry().2
    }

    /// List-valued kinds whose operands form a membership set.
    pub fn is_membership(&self) -> bool {
        self.operand_type() == OperandType::Strings
    }

    fn entry(&self) -> &'static (ConditionKind, &'static str, OperandType) {
        // Every variant has a table row.
        CONDITION_KINDS
            .iter()
            .find(|(kind, _, _)| kind == self)
            .unwrap_or(&CONDITION_KINDS[0])
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Implicit,
    Equal,
    ExactEqual,
    NotEqual,
    Not,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Which side of a comparison a condition constrains. Two conditions of the
/// same kind may coexist in one rule only when their directions differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Equality,
    Negation,
    Lower,
    Upper,
}

pub type ConditionSlot = (ConditionKind, Direction);

impl Operator {
    // Longest symbols first so `==` is not read as `=`.
    const PREFIXES: [(&'static str, Operator); 8] = [
        ("==", Operator::ExactEqual),
        ("!=", Operator::NotEqual),
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("=", Operator::Equal),
        ("!", Operator::Not),
        ("<", Operator::Less),
        (">", Operator::Greater),
    ];

    pub fn symbol(&self) -> &'static str {
        match *self {
            Self::Implicit => "",
            Self::Equal => "=",
            Self::ExactEqual => "==",
            Self::NotEqual => "!=",
            Self::Not => "!",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }

    /// Strip a leading operator from `text`, defaulting to `Implicit`.
    pub fn split_prefix(text: &str) -> (Self, &str) {
        let text = text.trim_start();
        for (symbol, op) in Self::PREFIXES {
            if let Some(rest) = text.strip_prefix(symbol) {
                return (op, rest);
            }
        }
        (Self::Implicit, text)
    }

    pub fn direction(&self) -> Direction {
        match *self {
            Self::Implicit | Self::Equal | Self::ExactEqual => Direction::Equality,
            Self::NotEqual | Self::Not => Direction::Negation,
            Self::Greater | Self::GreaterEqual => Direction::Lower,
            Self::Less | Self::LessEqual => Direction::Upper,
        }
    }

    pub fn compare<T: Ord>(&self, actual: T, expected: T) -> bool {
        match *self {
            Self::Implicit | Self::Equal | Self::ExactEqual => actual == expected,
            Self::NotEqual | Self::Not => actual != expected,
            Self::Less => actual < expected,
            Self::LessEqual => actual <= expected,
            Self::Greater => actual > expected,
            Self::GreaterEqual => actual >= expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "magic" => Some(Self::Magic),
            "rare" => Some(Self::Rare),
            "unique" => Some(Self::Unique),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Normal => "Normal",
            Self::Magic => "Magic",
            Self::Rare => "Rare",
            Self::Unique => "Unique",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Socket requirement such as `5`, `RGB` or `6RRG`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketSpec {
    pub count: Option<u32>,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub white: u32,
    pub abyss: u32,
    pub delve: u32,
}

impl SocketSpec {
    pub fn parse(token: &str) -> Option<Self> {
        let digits_end = token
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(token.len());
        let mut spec = SocketSpec {
            count: if digits_end == 0 {
                None
            } else {
                Some(token[..digits_end].parse().ok()?)
            },
            ..SocketSpec::default()
        };
        for ch in token[digits_end..].chars() {
            match ch.to_ascii_uppercase() {
                'R' => spec.red += 1,
                'G' => spec.green += 1,
                'B' => spec.blue += 1,
                'W' => spec.white += 1,
                'A' => spec.abyss += 1,
                'D' => spec.delve += 1,
                _ => return None,
            }
        }
        if spec.count.is_none() && spec.colour_total() == 0 {
            return None;
        }
        Some(spec)
    }

    pub fn colour_total(&self) -> u32 {
        self.red + self.green + self.blue + self.white + self.abyss + self.delve
    }

    /// Socket count the requirement implies.
    pub fn required_count(&self) -> u32 {
        self.count.unwrap_or(0).max(self.colour_total())
    }
}

impl fmt::Display for SocketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(count) = self.count {
            write!(f, "{count}")?;
        }
        for (n, letter) in [
            (self.red, 'R'),
            (self.green, 'G'),
            (self.blue, 'B'),
            (self.white, 'W'),
            (self.abyss, 'A'),
            (self.delve, 'D'),
        ] {
            for _ in 0..n {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Strings(Vec<String>),
    Integers(Vec<i64>),
    Rarities(Vec<Rarity>),
    Boolean(bool),
    Sockets(Vec<SocketSpec>),
}

impl Operand {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Strings(v) => v.is_empty(),
            Self::Integers(v) => v.is_empty(),
            Self::Rarities(v) => v.is_empty(),
            Self::Boolean(_) => false,
            Self::Sockets(v) => v.is_empty(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Strings(values) => values
                .iter()
                .map(|v| format!("\"{v}\""))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Integers(values) => values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Rarities(values) => values
                .iter()
                .map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Boolean(true) => "True".to_string(),
            Self::Boolean(false) => "False".to_string(),
            Self::Sockets(values) => values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub operator: Operator,
    pub operand: Operand,
}

impl Condition {
    pub fn new(kind: ConditionKind, operator: Operator, operand: Operand) -> Self {
        Self {
            kind,
            operator,
            operand,
        }
    }

    pub fn strings(kind: ConditionKind, operator: Operator, values: &[&str]) -> Self {
        Self::new(
            kind,
            operator,
            Operand::Strings(values.iter().map(|v| v.to_string()).collect()),
        )
    }

    pub fn integer(kind: ConditionKind, operator: Operator, value: i64) -> Self {
        Self::new(kind, operator, Operand::Integers(vec![value]))
    }

    /// Parse the operator and operands that follow `kind`'s keyword.
    pub fn parse(kind: ConditionKind, text: &str) -> Result<Self, String> {
        let (operator, rest) = Operator::split_prefix(text);
        let tokens = tokenize(rest)?;

        let operand = match kind.operand_type() {
            OperandType::Strings => {
                if matches!(
                    operator.direction(),
                    Direction::Lower | Direction::Upper
                ) {
                    return Err(format!(
                        "operator '{}' is not valid for {kind}",
                        operator.symbol()
                    ));
                }
                Operand::Strings(tokens)
            }
            OperandType::Integer => {
                let values = tokens
                    .iter()
                    .map(|t| {
                        t.parse::<i64>()
                            .map_err(|_| format!("{kind} expects an integer, got '{t}'"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Operand::Integers(values)
            }
            OperandType::Rarity => {
                let values = tokens
                    .iter()
                    .map(|t| {
                        Rarity::from_name(t).ok_or_else(|| format!("unknown rarity '{t}'"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Operand::Rarities(values)
            }
            OperandType::Boolean => {
                if tokens.len() != 1 {
                    return Err(format!("{kind} expects exactly one True/False value"));
                }
                match tokens[0].to_ascii_lowercase().as_str() {
                    "true" => Operand::Boolean(true),
                    "false" => Operand::Boolean(false),
                    other => return Err(format!("{kind} expects True/False, got '{other}'")),
                }
            }
            OperandType::Sockets => {
                let values = tokens
                    .iter()
                    .map(|t| {
                        SocketSpec::parse(t)
                            .ok_or_else(|| format!("invalid socket requirement '{t}'"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Operand::Sockets(values)
            }
        };

        if operand.is_empty() && !kind.is_membership() {
            return Err(format!("{kind} has no value"));
        }

        Ok(Self::new(kind, operator, operand))
    }

    pub fn slot(&self) -> ConditionSlot {
        (self.kind, self.operator.direction())
    }

    pub fn string_values(&self) -> &[String] {
        match &self.operand {
            Operand::Strings(values) => values,
            _ => &[],
        }
    }

    pub fn contains_string(&self, value: &str) -> bool {
        self.string_values()
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn first_integer(&self) -> Option<i64> {
        match &self.operand {
            Operand::Integers(values) => values.first().copied(),
            _ => None,
        }
    }

    /// Canonical text without indentation or trailing comment.
    pub fn render(&self) -> String {
        let mut out = self.kind.keyword().to_string();
        if self.operator != Operator::Implicit {
            out.push(' ');
            out.push_str(self.operator.symbol());
        }
        let operand = self.operand.render();
        if !operand.is_empty() {
            out.push(' ');
            out.push_str(&operand);
        }
        out
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Split operand text into bare words and quoted strings (quotes removed).
fn tokenize(text: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            for (_, c) in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                value.push(c);
            }
            if !closed {
                return Err(format!("unterminated quote starting at column {}", start + 1));
            }
            tokens.push(value);
            continue;
        }
        let mut value = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            value.push(c);
            chars.next();
        }
        tokens.push(value);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_membership_list() {
        let c = Condition::parse(
            ConditionKind::BaseType,
            " == \"Orb of Alchemy\" \"Chaos Orb\"",
        )
        .unwrap();
        assert_eq!(c.operator, Operator::ExactEqual);
        assert_eq!(c.string_values(), ["Orb of Alchemy", "Chaos Orb"]);
        assert!(c.contains_string("chaos orb"));
        assert_eq!(c.render(), "BaseType == \"Orb of Alchemy\" \"Chaos Orb\"");
    }

    #[test]
    fn operator_without_spaces_and_directions() {
        let c = Condition::parse(ConditionKind::ItemLevel, ">=60").unwrap();
        assert_eq!(c.operator, Operator::GreaterEqual);
        assert_eq!(c.first_integer(), Some(60));
        assert_eq!(c.slot(), (ConditionKind::ItemLevel, Direction::Lower));

        let upper = Condition::parse(ConditionKind::ItemLevel, " <= 74").unwrap();
        assert_eq!(upper.slot(), (ConditionKind::ItemLevel, Direction::Upper));
    }

    #[test]
    fn type_directed_failures() {
        assert!(Condition::parse(ConditionKind::ItemLevel, " >= high").is_err());
        assert!(Condition::parse(ConditionKind::Rarity, " Legendary").is_err());
        assert!(Condition::parse(ConditionKind::Corrupted, " Maybe").is_err());
        assert!(Condition::parse(ConditionKind::Class, " >= \"Maps\"").is_err());
        assert!(Condition::parse(ConditionKind::BaseType, " \"Unclosed").is_err());
        assert!(Condition::parse(ConditionKind::Quality, " >=").is_err());
    }

    #[test]
    fn empty_membership_list_is_allowed() {
        let c = Condition::parse(ConditionKind::BaseType, " ==").unwrap();
        assert!(c.operand.is_empty());
        assert_eq!(c.render(), "BaseType ==");
    }

    #[test]
    fn socket_specs() {
        let spec = SocketSpec::parse("5RGB").unwrap();
        assert_eq!(spec.count, Some(5));
        assert_eq!((spec.red, spec.green, spec.blue), (1, 1, 1));
        assert_eq!(spec.required_count(), 5);
        assert_eq!(spec.to_string(), "5RGB");
        assert!(SocketSpec::parse("RXB").is_none());
        assert!(SocketSpec::parse("").is_none());
    }

    #[test]
    fn rarity_order() {
        assert!(Rarity::Normal < Rarity::Magic);
        assert!(Rarity::Rare < Rarity::Unique);
        assert!(Operator::LessEqual.compare(Rarity::Rare, Rarity::Rare));
    }
}
