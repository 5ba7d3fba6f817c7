pub mod blocks;
pub mod condition;
pub mod rule;
pub mod types;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core_api::{CoreError, CoreErrorCode};
use crate::layout::{BlockKind, BlockLayout, FileLayout, TextRange};
use crate::visibility::Visibility;
use blocks::{RawBlockKind, split_blocks};
use condition::{Condition, ConditionKind, Direction};
use rule::{LineBody, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseWarningKind {
    MalformedBlock,
    MalformedCondition,
    DuplicateTags,
    DuplicateCondition,
    UnrecognizedLine,
}

/// A recoverable anomaly found while parsing. The affected text is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub line: usize,
    pub kind: ParseWarningKind,
    pub message: String,
}

/// Position of a rule in file order. Only valid for the document that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleRef(usize);

impl RuleRef {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Structural edit applied to a single rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEdit {
    SetVisibility(Visibility),
    SetCondition(Condition),
    RemoveCondition(ConditionKind, Direction),
    AddMember(ConditionKind, String),
    RemoveMember(ConditionKind, String),
    SetMembers(ConditionKind, Vec<String>),
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Rule(usize),
}

#[derive(Debug, Clone)]
pub struct FilterDocument {
    segments: Vec<Segment>,
    rules: Vec<Rule>,
    tag_index: HashMap<(String, String), Vec<usize>>,
    type_index: HashMap<String, Vec<usize>>,
    layout: FileLayout,
    original: String,
    warnings: Vec<ParseWarning>,
}

impl FilterDocument {
    /// Parse filter text. Anomalies degrade to warnings; only a layout that
    /// fails to tile the input is an error.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let mut warnings = Vec::new();
        let mut segments = Vec::new();
        let mut rules = Vec::new();
        let mut layout = FileLayout {
            file_len: text.len(),
            blocks: Vec::new(),
        };

        for block in split_blocks(text) {
            let range = TextRange {
                start: block.start(),
                end: block.end(),
            };
            let block_text = text[range.start..range.end].to_string();

            let kind = match block.kind {
                RawBlockKind::Rule => match Rule::parse(&block.lines, &mut warnings) {
                    Some(rule) => {
                        check_duplicate_conditions(&rule, &mut warnings);
                        rules.push(rule);
                        BlockKind::Rule(rules.len() - 1)
                    }
                    None => BlockKind::Opaque,
                },
                RawBlockKind::Blank => BlockKind::Blank,
                RawBlockKind::Comment => BlockKind::Comment,
                RawBlockKind::Opaque => BlockKind::Opaque,
            };

            match kind {
                BlockKind::Rule(idx) => segments.push(Segment::Rule(idx)),
                BlockKind::Opaque => {
                    tracing::warn!(line = block.first_line(), "block has no action keyword");
                    warnings.push(ParseWarning {
                        line: block.first_line(),
                        kind: ParseWarningKind::MalformedBlock,
                        message: "block has no Show/Hide/Minimal line; kept verbatim".to_string(),
                    });
                    segments.push(Segment::Text(block_text));
                }
                _ => segments.push(Segment::Text(block_text)),
            }

            layout.blocks.push(BlockLayout {
                kind,
                first_line: block.first_line(),
                range,
            });
        }

        layout.validate().map_err(|e| {
            CoreError::new(CoreErrorCode::Parse, format!("invalid filter layout: {e}"))
        })?;

        let mut doc = Self {
            segments,
            rules,
            tag_index: HashMap::new(),
            type_index: HashMap::new(),
            layout,
            original: text.to_string(),
            warnings,
        };
        doc.rebuild_indices(true);
        Ok(doc)
    }

    fn rebuild_indices(&mut self, report_duplicates: bool) {
        self.tag_index.clear();
        self.type_index.clear();

        for (idx, rule) in self.rules.iter().enumerate() {
            if let Some(type_tag) = rule.type_tag() {
                self.type_index
                    .entry(type_tag.to_string())
                    .or_default()
                    .push(idx);
            }
            if let Some((type_tag, tier_tag)) = rule.tags() {
                self.tag_index
                    .entry((type_tag.to_string(), tier_tag.to_string()))
                    .or_default()
                    .push(idx);
            }
        }

        if !report_duplicates {
            return;
        }
        let mut duplicates: Vec<_> = self
            .tag_index
            .iter()
            .filter(|(_, indices)| indices.len() > 1)
            .flat_map(|((type_tag, tier_tag), indices)| {
                indices[1..]
                    .iter()
                    .map(move |&idx| (idx, type_tag.clone(), tier_tag.clone()))
            })
            .collect();
        duplicates.sort_by_key(|(idx, _, _)| *idx);
        for (idx, type_tag, tier_tag) in duplicates {
            let line = self.rules[idx].first_line();
            tracing::warn!(%type_tag, %tier_tag, line, "duplicate rule tags");
            self.warnings.push(ParseWarning {
                line,
                kind: ParseWarningKind::DuplicateTags,
                message: format!("tags {type_tag}/{tier_tag} already used by an earlier rule"),
            });
        }
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, rule_ref: RuleRef) -> Option<&Rule> {
        self.rules.get(rule_ref.0)
    }

    pub fn is_modified(&self) -> bool {
        self.rules.iter().any(Rule::is_dirty)
    }

    pub fn find_by_tags(&self, type_tag: &str, tier_tag: &str) -> Result<RuleRef, CoreError> {
        match self
            .tag_index
            .get(&(type_tag.to_string(), tier_tag.to_string()))
            .map(Vec::as_slice)
        {
            None | Some([]) => Err(CoreError::new(
                CoreErrorCode::NotFound,
                format!("no rule tagged {type_tag}/{tier_tag}"),
            )),
            Some([idx]) => Ok(RuleRef(*idx)),
            Some(indices) => Err(CoreError::new(
                CoreErrorCode::Ambiguous,
                format!(
                    "{} rules tagged {type_tag}/{tier_tag}",
                    indices.len()
                ),
            )),
        }
    }

    pub fn rules_of_type(&self, type_tag: &str) -> Vec<RuleRef> {
        self.type_index
            .get(type_tag)
            .map(|indices| indices.iter().copied().map(RuleRef).collect())
            .unwrap_or_default()
    }

    pub fn has_type_tag(&self, type_tag: &str) -> bool {
        self.type_index.contains_key(type_tag)
    }

    /// Rules whose `kind` membership list contains `value`.
    pub fn rules_matching_predicate(&self, kind: ConditionKind, value: &str) -> Vec<RuleRef> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.has_member(kind, value))
            .map(|(idx, _)| RuleRef(idx))
            .collect()
    }

    pub fn find_by_predicate(&self, kind: ConditionKind, value: &str) -> Result<RuleRef, CoreError> {
        single_rule(
            self.rules_matching_predicate(kind, value),
            || format!("no rule has {kind} containing \"{value}\""),
        )
    }

    /// Like `find_by_predicate`, restricted to rules carrying `type_tag`.
    pub fn find_by_predicate_in(
        &self,
        type_tag: &str,
        kind: ConditionKind,
        value: &str,
    ) -> Result<RuleRef, CoreError> {
        let candidates = self
            .rules_of_type(type_tag)
            .into_iter()
            .filter(|r| self.rules[r.0].has_member(kind, value))
            .collect();
        single_rule(candidates, || {
            format!("no {type_tag} rule has {kind} containing \"{value}\"")
        })
    }

    /// Apply `edit` to one rule. Returns whether the rule changed.
    pub fn mutate(&mut self, rule_ref: RuleRef, edit: RuleEdit) -> Result<bool, CoreError> {
        let rule = self.rules.get_mut(rule_ref.0).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::NotFound,
                format!("rule index {} out of range", rule_ref.0),
            )
        })?;

        let changed = match edit {
            RuleEdit::SetVisibility(visibility) => rule.set_visibility(visibility),
            RuleEdit::SetCondition(condition) => rule.set_condition(condition),
            RuleEdit::RemoveCondition(kind, direction) => rule.remove_condition(kind, direction),
            RuleEdit::AddMember(kind, value) => rule.add_member(kind, &value),
            RuleEdit::RemoveMember(kind, value) => rule.remove_member(kind, &value),
            RuleEdit::SetMembers(kind, values) => rule.set_members(kind, values),
        };
        // Edits never touch tag comments, so the indices stay valid.
        Ok(changed)
    }

    /// Insert parsed `text` before the first rule (or at the end when there
    /// is none). Returns the number of rules added.
    pub fn insert_before_first_rule(&mut self, text: &str) -> Result<usize, CoreError> {
        let inserted = FilterDocument::parse(text)?;
        let added = inserted.rules.len();

        let position = self
            .segments
            .iter()
            .position(|s| matches!(s, Segment::Rule(_)))
            .unwrap_or(self.segments.len());

        for segment in &mut self.segments {
            if let Segment::Rule(idx) = segment {
                *idx += added;
            }
        }
        self.segments
            .splice(position..position, inserted.segments);

        let mut rules = inserted.rules;
        for rule in &mut rules {
            rule.mark_dirty();
        }
        rules.append(&mut self.rules);
        self.rules = rules;

        self.rebuild_indices(false);
        Ok(added)
    }

    pub fn to_text_unmodified(&self) -> String {
        self.original.clone()
    }

    pub fn to_text_modified(&self) -> String {
        let mut out = String::with_capacity(self.original.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Rule(idx) => out.push_str(&self.rules[*idx].render()),
            }
        }
        out
    }
}

fn single_rule(
    candidates: Vec<RuleRef>,
    not_found: impl FnOnce() -> String,
) -> Result<RuleRef, CoreError> {
    match candidates.as_slice() {
        [] => Err(CoreError::new(CoreErrorCode::NotFound, not_found())),
        [only] => Ok(*only),
        many => Err(CoreError::new(
            CoreErrorCode::Ambiguous,
            format!("{} rules match", many.len()),
        )),
    }
}

fn check_duplicate_conditions(rule: &Rule, warnings: &mut Vec<ParseWarning>) {
    let mut seen = HashSet::new();
    for line in rule.lines() {
        if let LineBody::Condition(condition) = line.body() {
            if !seen.insert(condition.slot()) {
                tracing::warn!(line = line.number, kind = %condition.kind, "duplicate condition");
                warnings.push(ParseWarning {
                    line: line.number,
                    kind: ParseWarningKind::DuplicateCondition,
                    message: format!(
                        "{} repeats an earlier condition of the same kind and direction; the last one wins",
                        condition.kind
                    ),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "#===\n# header\n#===\n\nShow # $type->currency $tier->t1\n\tBaseType == \"Mirror of Kalandra\"\n\nHide # $type->currency $tier->t1\n\tBaseType == \"Chaos Orb\"\n\nStray \"text\"\n";

    #[test]
    fn round_trips_and_indexes() {
        let doc = FilterDocument::parse(SMALL).expect("failed to parse");
        assert_eq!(doc.to_text_modified(), SMALL);
        assert_eq!(doc.rules().len(), 2);
        assert_eq!(doc.layout().rule_count(), 2);

        let kinds: Vec<_> = doc.warnings().iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![ParseWarningKind::MalformedBlock, ParseWarningKind::DuplicateTags]
        );
        let err = doc.find_by_tags("currency", "t1").unwrap_err();
        assert_eq!(err.code, CoreErrorCode::Ambiguous);
        let err = doc.find_by_tags("currency", "t2").unwrap_err();
        assert_eq!(err.code, CoreErrorCode::NotFound);
    }

    #[test]
    fn disabling_a_rule_keeps_the_next_rules_tags() {
        let text = "Show # $type->a $tier->1\n\tClass \"Maps\"\n# $type->b $tier->2\nHide\n\tClass \"Gems\"\n";
        let mut doc = FilterDocument::parse(text).expect("failed to parse");
        let a = doc.find_by_tags("a", "1").expect("rule a");
        assert!(doc.mutate(a, RuleEdit::SetVisibility(Visibility::Disable)).expect("disable"));
        let saved = doc.to_text_modified();
        assert!(saved.starts_with("#Show # $type->a $tier->1\n#\tClass \"Maps\"\n# $type->b"));

        let reparsed = FilterDocument::parse(&saved).expect("failed to reparse");
        assert_eq!(reparsed.to_text_modified(), saved);
        let b = reparsed.find_by_tags("b", "2").expect("rule b");
        let rule = reparsed.rule(b).expect("rule");
        assert_eq!(rule.visibility(), Visibility::Hide);
        assert_eq!(rule.first_line(), 3);
        let a = reparsed.find_by_tags("a", "1").expect("rule a");
        assert_eq!(reparsed.rule(a).expect("rule").visibility(), Visibility::Disable);
    }

    #[test]
    fn predicate_addressing() {
        let doc = FilterDocument::parse(SMALL).expect("failed to parse");
        let found = doc
            .find_by_predicate(ConditionKind::BaseType, "chaos orb")
            .expect("failed to find");
        assert_eq!(found.index(), 1);
        assert!(doc.find_by_predicate(ConditionKind::BaseType, "Exalted Orb").is_err());
        assert!(
            doc.find_by_predicate_in("uniques", ConditionKind::BaseType, "Chaos Orb")
                .is_err()
        );
    }

    #[test]
    fn duplicate_condition_warns_and_last_wins() {
        let doc = FilterDocument::parse("Show\n\tQuality >= 5\n\tQuality >= 10\n\tQuality <= 15\n")
            .expect("failed to parse");
        assert_eq!(doc.warnings().len(), 1);
        assert_eq!(doc.warnings()[0].kind, ParseWarningKind::DuplicateCondition);
        assert_eq!(doc.warnings()[0].line, 3);
        let rule = &doc.rules()[0];
        assert_eq!(rule.conditions().len(), 2);
        assert_eq!(
            rule.condition(ConditionKind::Quality, Direction::Lower)
                .and_then(Condition::first_integer),
            Some(10)
        );
    }

    #[test]
    fn insert_keeps_existing_rules_addressable() {
        let mut doc = FilterDocument::parse("# top\n\nShow # $type->a $tier->b\n").expect("failed to parse");
        let added = doc
            .insert_before_first_rule("Hide # $type->dlf_x $tier->y\n\n")
            .expect("failed to insert");
        assert_eq!(added, 1);
        assert_eq!(doc.find_by_tags("a", "b").expect("a/b").index(), 1);
        assert_eq!(doc.find_by_tags("dlf_x", "y").expect("dlf").index(), 0);
        assert_eq!(
            doc.to_text_modified(),
            "# top\n\nHide # $type->dlf_x $tier->y\n\nShow # $type->a $tier->b\n"
        );
        assert_eq!(doc.to_text_unmodified(), "# top\n\nShow # $type->a $tier->b\n");
        assert!(doc.is_modified());
    }
}
