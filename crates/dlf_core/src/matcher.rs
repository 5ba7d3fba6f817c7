use serde::{Deserialize, Serialize};

use crate::filter::condition::{Condition, ConditionKind, Direction, Operand, Operator, SocketSpec};
use crate::filter::rule::Rule;
use crate::filter::{FilterDocument, RuleRef};
use crate::item::Item;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Pass,
    Fail,
    /// The condition cannot be decided for this item.
    Gap(String),
}

/// A rule the matcher skipped because it could not evaluate it faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FidelityGap {
    pub rule_index: usize,
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(RuleRef),
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    pub gaps: Vec<FidelityGap>,
}

impl MatchReport {
    pub fn matched(&self) -> Option<RuleRef> {
        match self.outcome {
            MatchOutcome::Matched(rule_ref) => Some(rule_ref),
            MatchOutcome::NoMatch => None,
        }
    }
}

/// First-match-wins: the first enabled rule whose conditions all pass.
/// Rules after the match are not evaluated.
pub fn match_item(doc: &FilterDocument, item: &Item) -> MatchReport {
    let mut gaps = Vec::new();

    for (index, rule) in doc.rules().iter().enumerate() {
        match evaluate_rule(rule, item) {
            Evaluation::Pass => {
                return MatchReport {
                    outcome: MatchOutcome::Matched(RuleRef::new(index)),
                    gaps,
                };
            }
            Evaluation::Fail => {}
            Evaluation::Gap(reason) => {
                tracing::warn!(
                    rule_index = index,
                    line = rule.first_line(),
                    %reason,
                    "rule skipped: cannot simulate"
                );
                gaps.push(FidelityGap {
                    rule_index: index,
                    line: rule.first_line(),
                    reason,
                });
            }
        }
    }

    MatchReport {
        outcome: MatchOutcome::NoMatch,
        gaps,
    }
}

/// A definite failure wins over a gap: a rule that cannot match whatever the
/// unknown parts say is not reported.
pub fn evaluate_rule(rule: &Rule, item: &Item) -> Evaluation {
    if rule.is_disabled() {
        return Evaluation::Fail;
    }

    let mut gap = rule.unsimulated_lines().into_iter().next();
    for condition in rule.conditions() {
        match evaluate_condition(condition, item) {
            Evaluation::Pass => {}
            Evaluation::Fail => return Evaluation::Fail,
            Evaluation::Gap(reason) => {
                gap.get_or_insert(reason);
            }
        }
    }

    match gap {
        Some(reason) => Evaluation::Gap(reason),
        None => Evaluation::Pass,
    }
}

pub fn evaluate_condition(condition: &Condition, item: &Item) -> Evaluation {
    let kind = condition.kind;
    let op = condition.operator;

    match (&condition.operand, kind) {
        (Operand::Strings(values), ConditionKind::HasInfluence) => {
            evaluate_influence(op, values, &item.influences)
        }
        (Operand::Strings(values), _) => {
            let attribute = match kind {
                ConditionKind::Class => item.class.as_deref(),
                ConditionKind::BaseType => item.base_type.as_deref(),
                _ => None,
            };
            match attribute {
                Some(actual) => pass_if(evaluate_strings(op, values, actual)),
                None => Evaluation::Fail,
            }
        }
        (Operand::Integers(values), _) => {
            let actual = match integer_attribute(kind, item) {
                Some(actual) => actual,
                None if kind == ConditionKind::AreaLevel => {
                    return Evaluation::Gap("item has no area level".to_string());
                }
                None => return Evaluation::Fail,
            };
            pass_if(compare_all(op, actual, values))
        }
        (Operand::Rarities(values), _) => match item.rarity {
            Some(actual) => pass_if(compare_all(op, actual, values)),
            None => Evaluation::Fail,
        },
        (Operand::Boolean(expected), _) => {
            let actual = boolean_attribute(kind, item).unwrap_or(false);
            match op.direction() {
                Direction::Negation => pass_if(actual != *expected),
                _ => pass_if(actual == *expected),
            }
        }
        (Operand::Sockets(specs), ConditionKind::SocketGroup) => {
            evaluate_socket_group(op, specs, &item.socket_groups)
        }
        (Operand::Sockets(specs), _) => {
            let actual = item.socket_count().unwrap_or(0);
            let required: Vec<i64> = specs.iter().map(|s| i64::from(s.required_count())).collect();
            pass_if(compare_all(op, actual, &required))
        }
    }
}

fn pass_if(condition: bool) -> Evaluation {
    if condition {
        Evaluation::Pass
    } else {
        Evaluation::Fail
    }
}

/// Equality-like operators pass on any operand; negations need all.
fn compare_all<T: Ord + Copy>(op: Operator, actual: T, values: &[T]) -> bool {
    match op.direction() {
        Direction::Negation => values.iter().all(|v| actual != *v),
        _ => values.iter().any(|v| op.compare(actual, *v)),
    }
}

fn evaluate_strings(op: Operator, values: &[String], actual: &str) -> bool {
    let actual = actual.to_lowercase();
    let contains = |v: &String| actual.contains(&v.to_lowercase());
    let exact = |v: &String| actual == v.to_lowercase();
    match op {
        Operator::Implicit | Operator::Equal => values.iter().any(contains),
        Operator::ExactEqual => values.iter().any(exact),
        Operator::NotEqual => !values.iter().any(exact),
        Operator::Not => !values.iter().any(contains),
        _ => false,
    }
}

fn evaluate_influence(op: Operator, values: &[String], influences: &[String]) -> Evaluation {
    let has = |v: &String| {
        if v.eq_ignore_ascii_case("None") {
            influences.is_empty()
        } else {
            influences.iter().any(|i| i.eq_ignore_ascii_case(v))
        }
    };
    match op {
        Operator::Implicit | Operator::Equal => pass_if(values.iter().any(has)),
        Operator::ExactEqual => pass_if(!values.is_empty() && values.iter().all(has)),
        Operator::NotEqual | Operator::Not => pass_if(!values.iter().any(has)),
        _ => Evaluation::Fail,
    }
}

fn evaluate_socket_group(op: Operator, specs: &[SocketSpec], groups: &[String]) -> Evaluation {
    let exact = match op {
        Operator::Implicit | Operator::Equal | Operator::GreaterEqual => false,
        Operator::ExactEqual => true,
        other => {
            return Evaluation::Gap(format!(
                "SocketGroup with '{}' is not simulated",
                other.symbol()
            ));
        }
    };
    let satisfied = specs.iter().any(|spec| {
        groups
            .iter()
            .filter_map(|g| SocketSpec::parse(g))
            .any(|group| group_satisfies(&group, spec, exact))
    });
    pass_if(satisfied)
}

fn group_satisfies(group: &SocketSpec, spec: &SocketSpec, exact: bool) -> bool {
    let pairs = [
        (group.red, spec.red),
        (group.green, spec.green),
        (group.blue, spec.blue),
        (group.white, spec.white),
        (group.abyss, spec.abyss),
        (group.delve, spec.delve),
    ];
    let size = group.colour_total();
    if exact {
        pairs.iter().all(|(have, want)| have == want)
            && spec.count.is_none_or(|count| count == size)
    } else {
        pairs.iter().all(|(have, want)| have >= want) && size >= spec.required_count()
    }
}

fn integer_attribute(kind: ConditionKind, item: &Item) -> Option<i64> {
    match kind {
        ConditionKind::ItemLevel => item.item_level,
        ConditionKind::DropLevel => item.drop_level,
        ConditionKind::Quality => Some(item.quality.unwrap_or(0)),
        ConditionKind::LinkedSockets => Some(item.linked_socket_count().unwrap_or(0)),
        ConditionKind::Height => item.height,
        ConditionKind::Width => item.width,
        ConditionKind::StackSize => Some(item.stack_size.unwrap_or(1)),
        ConditionKind::GemLevel => item.gem_level,
        ConditionKind::MapTier => item.map_tier,
        ConditionKind::AreaLevel => item.area_level,
        _ => None,
    }
}

fn boolean_attribute(kind: ConditionKind, item: &Item) -> Option<bool> {
    match kind {
        ConditionKind::Corrupted => item.corrupted,
        ConditionKind::Identified => item.identified,
        ConditionKind::Mirrored => item.mirrored,
        ConditionKind::ShaperItem => item.shaper_item,
        ConditionKind::ElderItem => item.elder_item,
        ConditionKind::FracturedItem => item.fractured_item,
        ConditionKind::SynthesisedItem => item.synthesised_item,
        ConditionKind::BlightedMap => item.blighted_map,
        ConditionKind::Replica => item.replica,
        ConditionKind::AnyEnchantment => item.any_enchantment,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::condition::Rarity;

    fn doc(text: &str) -> FilterDocument {
        FilterDocument::parse(text).expect("failed to parse filter")
    }

    #[test]
    fn first_match_wins_over_later_rules() {
        let filter = doc("Hide\n\tClass \"Life Flask\"\n\tQuality < 20\n\nShow\n\tClass \"Life Flask\"\n\nShow\n\tClass \"Flask\"\n");
        let item = Item::new().with_class("Life Flask").with_quality(25);
        let report = match_item(&filter, &item);
        assert_eq!(report.matched().map(|r| r.index()), Some(1));
        assert!(report.gaps.is_empty());

        let low = Item::new().with_class("Life Flask").with_quality(5);
        assert_eq!(match_item(&filter, &low).matched().map(|r| r.index()), Some(0));
    }

    #[test]
    fn string_operators() {
        let values = vec!["Orb".to_string()];
        assert!(evaluate_strings(Operator::Implicit, &values, "Chaos Orb"));
        assert!(!evaluate_strings(Operator::ExactEqual, &values, "Chaos Orb"));
        assert!(evaluate_strings(Operator::NotEqual, &values, "Chaos Orb"));
        assert!(!evaluate_strings(Operator::Not, &values, "Chaos Orb"));
    }

    #[test]
    fn absent_attribute_policy() {
        let item = Item::new().with_class("Stackable Currency");
        let parse = |text: &str| {
            let (kind, rest) = text.split_once(' ').unwrap();
            Condition::parse(ConditionKind::from_keyword(kind).unwrap(), rest).unwrap()
        };
        assert_eq!(evaluate_condition(&parse("StackSize < 2"), &item), Evaluation::Pass);
        assert_eq!(evaluate_condition(&parse("Quality >= 1"), &item), Evaluation::Fail);
        assert_eq!(evaluate_condition(&parse("Corrupted False"), &item), Evaluation::Pass);
        assert_eq!(evaluate_condition(&parse("ItemLevel >= 1"), &item), Evaluation::Fail);
        assert!(matches!(
            evaluate_condition(&parse("AreaLevel >= 68"), &item),
            Evaluation::Gap(_)
        ));
    }

    #[test]
    fn unsimulated_rule_is_reported_and_skipped() {
        let filter = doc("Show\n\tHasExplicitMod \"of Haast\"\n\tClass \"Rings\"\n\nHide\n");
        let ring = Item::new().with_class("Rings");
        let report = match_item(&filter, &ring);
        assert_eq!(report.matched().map(|r| r.index()), Some(1));
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].rule_index, 0);

        // A definite failure is not a gap.
        let amulet = Item::new().with_class("Amulets");
        assert!(match_item(&filter, &amulet).gaps.is_empty());
    }

    #[test]
    fn disabled_rules_never_match() {
        let filter = doc("#Show\n#\tClass \"Flask\"\n");
        let item = Item::new().with_class("Utility Flasks");
        let report = match_item(&filter, &item);
        assert_eq!(report.outcome, MatchOutcome::NoMatch);
        assert!(report.gaps.is_empty());
    }

    #[test]
    fn rarity_and_sockets() {
        let filter = doc("Show\n\tRarity <= Rare\n\tSocketGroup \"RGB\"\n\tWidth <= 2\n");
        let rgb = Item::new()
            .with_rarity(Rarity::Magic)
            .with_sockets("R-G-B B")
            .with_size(2, 3);
        assert!(match_item(&filter, &rgb).matched().is_some());

        let unique = rgb.clone().with_rarity(Rarity::Unique);
        assert!(match_item(&filter, &unique).matched().is_none());

        let split = Item::new()
            .with_rarity(Rarity::Rare)
            .with_sockets("R-G B")
            .with_size(1, 3);
        assert!(match_item(&filter, &split).matched().is_none());
    }

    #[test]
    fn influence_none_means_no_influence() {
        let filter = doc("Show\n\tHasInfluence None\n");
        assert!(match_item(&filter, &Item::new()).matched().is_some());
        let hunter = Item::new().with_influence("Hunter");
        assert!(match_item(&filter, &hunter).matched().is_none());
    }
}
