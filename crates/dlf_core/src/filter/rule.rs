use crate::reader::RawLine;
use crate::visibility::{ActionKeyword, Visibility};

use super::condition::{Condition, ConditionKind, ConditionSlot, Direction, Operand, Operator};
use super::types::{
    DEFAULT_BODY_INDENT, DISABLE_PREFIX, EMPTIED_MARKER, comment_start, extract_tags,
    is_style_keyword, is_unsimulated_keyword, split_indent, split_keyword, split_trailing_comment,
};
use super::{ParseWarning, ParseWarningKind};

#[derive(Debug, Clone, PartialEq)]
pub enum LineBody {
    Comment,
    Action,
    Condition(Condition),
    Style,
    Unsimulated { keyword: String },
    Malformed { keyword: String, reason: String },
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct RuleLine {
    /// Source line number; 0 for lines added by an edit.
    pub number: usize,
    /// Disable marker exactly as it appeared (`#`, `  #`), if any.
    marker: Option<String>,
    /// Line content after the marker, as in the source.
    content: String,
    indent: String,
    trailing: String,
    terminator: String,
    body: LineBody,
    leading: bool,
    edited: bool,
}

impl RuleLine {
    pub fn body(&self) -> &LineBody {
        &self.body
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn render(&self, keyword: ActionKeyword, disabled: bool) -> String {
        let mut out = String::new();
        if disabled && !self.leading {
            match &self.marker {
                Some(marker) => out.push_str(marker),
                None => out.push(DISABLE_PREFIX),
            }
        }
        if self.edited {
            out.push_str(&self.indent);
            match &self.body {
                LineBody::Action => out.push_str(keyword.keyword()),
                LineBody::Condition(condition) => out.push_str(&condition.render()),
                _ => out.push_str(self.content.trim_start()),
            }
            out.push_str(&self.trailing);
        } else {
            out.push_str(&self.content);
        }
        out.push_str(&self.terminator);
        out
    }
}

/// One `Show`/`Hide`/`Minimal` block, possibly disabled.
#[derive(Debug, Clone)]
pub struct Rule {
    keyword: ActionKeyword,
    disabled: bool,
    type_tag: Option<String>,
    tier_tag: Option<String>,
    lines: Vec<RuleLine>,
    action_index: usize,
    line_ending: String,
    source: String,
    first_line: usize,
    dirty: bool,
    opaque: bool,
    /// Disabled only because a membership list went empty.
    emptied: bool,
}

/// Recognize an action line, returning its keyword and whether it is
/// commented out. `#Show` is a disabled rule; `# Show` is a comment.
pub fn classify_action_line(text: &str) -> Option<(ActionKeyword, bool)> {
    let (_, body) = split_indent(text);
    let (body, disabled) = match body.strip_prefix(DISABLE_PREFIX) {
        Some(rest) => (rest, true),
        None => (body, false),
    };
    let (word, _) = split_keyword(body);
    ActionKeyword::from_keyword(word).map(|keyword| (keyword, disabled))
}

impl Rule {
    /// Parse a rule block. Returns `None` when the block has no action line.
    pub fn parse(raw: &[RawLine<'_>], warnings: &mut Vec<ParseWarning>) -> Option<Self> {
        let action_index = raw
            .iter()
            .position(|line| classify_action_line(line.text).is_some())?;
        let (keyword, disabled) = classify_action_line(raw[action_index].text)?;

        let line_ending = raw
            .iter()
            .map(|l| l.terminator)
            .find(|t| !t.is_empty())
            .unwrap_or("\n")
            .to_string();

        let mut rule = Rule {
            keyword,
            disabled,
            type_tag: None,
            tier_tag: None,
            lines: Vec::with_capacity(raw.len()),
            action_index,
            line_ending,
            source: raw.iter().map(|l| [l.text, l.terminator].concat()).collect(),
            first_line: raw[0].number,
            dirty: false,
            opaque: false,
            emptied: false,
        };

        for (idx, line) in raw.iter().enumerate() {
            let leading = idx < action_index;
            let (marker, content) = if disabled && !leading {
                split_marker(line.text)
            } else {
                (None, line.text)
            };

            let mut parsed = RuleLine {
                number: line.number,
                marker: marker.map(str::to_string),
                content: content.to_string(),
                indent: String::new(),
                trailing: String::new(),
                terminator: line.terminator.to_string(),
                body: LineBody::Comment,
                leading,
                edited: false,
            };

            if !leading {
                parse_body_line(&mut parsed, idx == action_index, warnings);
                if matches!(parsed.body, LineBody::Malformed { .. }) {
                    rule.opaque = true;
                }
            }
            rule.lines.push(parsed);
        }

        rule.resolve_tags();
        rule.emptied = rule.disabled
            && rule.lines[action_index]
                .trailing
                .split_whitespace()
                .any(|token| token == EMPTIED_MARKER);
        Some(rule)
    }

    fn resolve_tags(&mut self) {
        let (mut type_tag, mut tier_tag) = extract_tags(&self.lines[self.action_index].trailing);
        for line in self.lines[..self.action_index].iter().rev() {
            if type_tag.is_some() && tier_tag.is_some() {
                break;
            }
            let (ty, tier) = extract_tags(&line.content);
            type_tag = type_tag.or(ty);
            tier_tag = tier_tag.or(tier);
        }
        self.type_tag = type_tag;
        self.tier_tag = tier_tag;
    }

    pub fn keyword(&self) -> ActionKeyword {
        self.keyword
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn visibility(&self) -> Visibility {
        if self.disabled {
            Visibility::Disable
        } else {
            self.keyword.visibility()
        }
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    pub fn tier_tag(&self) -> Option<&str> {
        self.tier_tag.as_deref()
    }

    pub fn tags(&self) -> Option<(&str, &str)> {
        Some((self.type_tag.as_deref()?, self.tier_tag.as_deref()?))
    }

    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_emptied(&self) -> bool {
        self.emptied
    }

    /// A rule with a condition that failed to parse: kept, never matched.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn lines(&self) -> &[RuleLine] {
        &self.lines
    }

    /// Effective conditions, one per (kind, direction); the last line wins.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out: Vec<&Condition> = Vec::new();
        for line in &self.lines {
            if let LineBody::Condition(condition) = &line.body {
                match out.iter().position(|c| c.slot() == condition.slot()) {
                    Some(pos) => out[pos] = condition,
                    None => out.push(condition),
                }
            }
        }
        out
    }

    pub fn condition(&self, kind: ConditionKind, direction: Direction) -> Option<&Condition> {
        self.lines.iter().rev().find_map(|line| match &line.body {
            LineBody::Condition(c) if c.slot() == (kind, direction) => Some(c),
            _ => None,
        })
    }

    /// The equality list condition for a membership kind (`BaseType`, `Class`).
    pub fn membership(&self, kind: ConditionKind) -> Option<&Condition> {
        self.condition(kind, Direction::Equality)
    }

    pub fn has_member(&self, kind: ConditionKind, value: &str) -> bool {
        self.membership(kind)
            .is_some_and(|c| c.contains_string(value))
    }

    pub fn has_empty_membership(&self) -> bool {
        self.conditions()
            .iter()
            .any(|c| c.kind.is_membership() && c.operand.is_empty())
    }

    /// Lines the matcher cannot evaluate, described for gap reports.
    pub fn unsimulated_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| match &line.body {
                LineBody::Unsimulated { keyword } => Some(format!("unsimulated condition {keyword}")),
                LineBody::Unrecognized => {
                    Some(format!("unrecognized line '{}'", line.content.trim()))
                }
                LineBody::Malformed { keyword, reason } => {
                    Some(format!("malformed {keyword} condition: {reason}"))
                }
                _ => None,
            })
            .collect()
    }

    pub fn render(&self) -> String {
        if !self.dirty {
            return self.source.clone();
        }
        self.lines
            .iter()
            .map(|line| line.render(self.keyword, self.disabled))
            .collect()
    }

    // --- Edits. Each returns whether the rule changed. ---

    pub fn set_visibility(&mut self, visibility: Visibility) -> bool {
        let (keyword, disabled) = match visibility {
            Visibility::Disable => (self.keyword, true),
            Visibility::Show => {
                let keyword = match self.keyword {
                    ActionKeyword::Hide => ActionKeyword::Show,
                    other => other,
                };
                (keyword, self.has_empty_membership())
            }
            Visibility::Hide => (ActionKeyword::Hide, self.has_empty_membership()),
        };
        // Show/Hide on an empty list waits for the list to refill; an
        // explicit Disable does not.
        let emptied = visibility != Visibility::Disable && disabled;

        if keyword == self.keyword && disabled == self.disabled && emptied == self.emptied {
            return false;
        }
        if keyword != self.keyword {
            self.keyword = keyword;
            self.lines[self.action_index].edited = true;
        }
        self.disabled = disabled;
        self.set_emptied(emptied);
        self.dirty = true;
        true
    }

    /// Replace the condition occupying `condition`'s slot, or add it.
    pub fn set_condition(&mut self, condition: Condition) -> bool {
        let slot = condition.slot();
        let matching = self.slot_lines(slot);

        if let [only] = matching.as_slice() {
            if matches!(&self.lines[*only].body, LineBody::Condition(c) if *c == condition) {
                return false;
            }
        }

        match matching.split_last() {
            Some((&last, earlier)) => {
                let line = &mut self.lines[last];
                line.body = LineBody::Condition(condition);
                line.edited = true;
                for &idx in earlier.iter().rev() {
                    self.remove_line(idx);
                }
            }
            None => {
                let pos = self.condition_insert_position();
                let line = self.new_body_line(LineBody::Condition(condition));
                self.insert_line(pos, line);
            }
        }
        self.dirty = true;
        self.sync_empty_membership();
        true
    }

    pub fn remove_condition(&mut self, kind: ConditionKind, direction: Direction) -> bool {
        let matching = self.slot_lines((kind, direction));
        if matching.is_empty() {
            return false;
        }
        for &idx in matching.iter().rev() {
            self.remove_line(idx);
        }
        self.dirty = true;
        self.sync_empty_membership();
        true
    }

    pub fn add_member(&mut self, kind: ConditionKind, value: &str) -> bool {
        if self.has_member(kind, value) {
            return false;
        }
        let condition = match self.membership(kind) {
            Some(existing) => {
                let mut values = existing.string_values().to_vec();
                values.push(value.to_string());
                Condition::new(kind, existing.operator, Operand::Strings(values))
            }
            None => Condition::strings(kind, Operator::ExactEqual, &[value]),
        };
        self.set_condition(condition)
    }

    pub fn remove_member(&mut self, kind: ConditionKind, value: &str) -> bool {
        let Some(existing) = self.membership(kind) else {
            return false;
        };
        if !existing.contains_string(value) {
            return false;
        }
        let values = existing
            .string_values()
            .iter()
            .filter(|v| !v.eq_ignore_ascii_case(value))
            .cloned()
            .collect();
        let condition = Condition::new(kind, existing.operator, Operand::Strings(values));
        self.set_condition(condition)
    }

    pub fn set_members(&mut self, kind: ConditionKind, values: Vec<String>) -> bool {
        let operator = self
            .membership(kind)
            .map(|c| c.operator)
            .unwrap_or(Operator::ExactEqual);
        self.set_condition(Condition::new(kind, operator, Operand::Strings(values)))
    }

    // The game rejects empty lists, so a rule with one cannot be active.
    // Only a rule disabled here is switched back on once the list refills.
    fn sync_empty_membership(&mut self) {
        let is_empty = self.has_empty_membership();
        if is_empty && !self.disabled {
            self.disabled = true;
            self.set_emptied(true);
            self.dirty = true;
        } else if !is_empty && self.emptied {
            self.disabled = false;
            self.set_emptied(false);
            self.dirty = true;
        }
    }

    /// Track the flag in the action line comment so it survives a reparse.
    fn set_emptied(&mut self, emptied: bool) {
        if emptied == self.emptied {
            return;
        }
        self.emptied = emptied;
        let action = &mut self.lines[self.action_index];
        action.edited = true;
        if emptied {
            if comment_start(&action.trailing).is_some() {
                action.trailing.push(' ');
            } else {
                action.trailing.push_str(" # ");
            }
            action.trailing.push_str(EMPTIED_MARKER);
            return;
        }
        let with_hash = format!(" # {EMPTIED_MARKER}");
        let bare = format!(" {EMPTIED_MARKER}");
        if let Some(stripped) = action.trailing.strip_suffix(&with_hash) {
            action.trailing = stripped.to_string();
        } else if let Some(stripped) = action.trailing.strip_suffix(&bare) {
            action.trailing = stripped.to_string();
        } else {
            action.trailing = action.trailing.replace(&bare, "");
        }
    }

    fn slot_lines(&self, slot: ConditionSlot) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| match &line.body {
                LineBody::Condition(c) if c.slot() == slot => Some(idx),
                _ => None,
            })
            .collect()
    }

    fn condition_insert_position(&self) -> usize {
        self.lines
            .iter()
            .rposition(|line| matches!(line.body, LineBody::Condition(_)))
            .unwrap_or(self.action_index)
            + 1
    }

    fn new_body_line(&self, body: LineBody) -> RuleLine {
        let indent = self.lines[self.action_index + 1..]
            .iter()
            .find(|line| !matches!(line.body, LineBody::Comment))
            .map(|line| line.indent.clone())
            .unwrap_or_else(|| DEFAULT_BODY_INDENT.to_string());
        RuleLine {
            number: 0,
            marker: None,
            content: String::new(),
            indent,
            trailing: String::new(),
            terminator: self.line_ending.clone(),
            body,
            leading: false,
            edited: true,
        }
    }

    fn insert_line(&mut self, pos: usize, mut line: RuleLine) {
        // Appending after an unterminated last line moves the missing newline.
        if pos == self.lines.len() {
            if let Some(last) = self.lines.last_mut() {
                if last.terminator.is_empty() {
                    last.terminator = self.line_ending.clone();
                    line.terminator.clear();
                }
            }
        }
        self.lines.insert(pos, line);
    }

    fn remove_line(&mut self, idx: usize) {
        let removed = self.lines.remove(idx);
        if removed.terminator.is_empty() {
            if let Some(last) = self.lines.last_mut() {
                last.terminator.clear();
            }
        }
        if idx < self.action_index {
            self.action_index -= 1;
        }
    }
}

/// Split off a disable marker: leading whitespace plus one `#`.
fn split_marker(text: &str) -> (Option<&str>, &str) {
    let (indent, body) = split_indent(text);
    if body.starts_with(DISABLE_PREFIX) {
        let end = indent.len() + DISABLE_PREFIX.len_utf8();
        (Some(&text[..end]), &text[end..])
    } else {
        (None, text)
    }
}

fn parse_body_line(line: &mut RuleLine, is_action: bool, warnings: &mut Vec<ParseWarning>) {
    let (indent, body) = split_indent(&line.content);
    let indent = indent.to_string();
    let (keyword, rest) = split_keyword(body);
    let keyword = keyword.to_string();
    let rest = rest.to_string();
    line.indent = indent;

    if is_action {
        line.trailing = rest;
        line.body = LineBody::Action;
        return;
    }

    if keyword.is_empty() || body.starts_with('#') {
        line.body = LineBody::Comment;
        return;
    }

    if let Some(kind) = ConditionKind::from_keyword(&keyword) {
        let (operand, trailing) = split_trailing_comment(&rest);
        line.trailing = trailing.to_string();
        line.body = match Condition::parse(kind, operand) {
            Ok(condition) => LineBody::Condition(condition),
            Err(reason) => {
                tracing::warn!(line = line.number, %reason, "malformed condition");
                warnings.push(ParseWarning {
                    line: line.number,
                    kind: ParseWarningKind::MalformedCondition,
                    message: format!("{keyword}: {reason}"),
                });
                LineBody::Malformed { keyword, reason }
            }
        };
    } else if is_style_keyword(&keyword) {
        line.body = LineBody::Style;
    } else if is_unsimulated_keyword(&keyword) {
        line.body = LineBody::Unsimulated { keyword };
    } else {
        warnings.push(ParseWarning {
            line: line.number,
            kind: ParseWarningKind::UnrecognizedLine,
            message: format!("unrecognized keyword '{keyword}'"),
        });
        line.body = LineBody::Unrecognized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::LineReader;

    fn parse(text: &str) -> (Rule, Vec<ParseWarning>) {
        let mut reader = LineReader::new(text);
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line() {
            lines.push(line);
        }
        let mut warnings = Vec::new();
        let rule = Rule::parse(&lines, &mut warnings).unwrap();
        (rule, warnings)
    }

    const TIER: &str = "Show # $type->currency $tier->t3\n\tClass == \"Stackable Currency\"\n\tBaseType == \"Orb of Alchemy\" \"Chromatic Orb\"\n\tSetFontSize 42\n";

    #[test]
    fn parses_tags_conditions_and_style() {
        let (rule, warnings) = parse(TIER);
        assert!(warnings.is_empty());
        assert_eq!(rule.tags(), Some(("currency", "t3")));
        assert_eq!(rule.visibility(), Visibility::Show);
        assert_eq!(rule.conditions().len(), 2);
        assert!(rule.has_member(ConditionKind::BaseType, "orb of alchemy"));
        assert_eq!(rule.render(), TIER);
    }

    #[test]
    fn tags_from_preceding_comment_line() {
        let (rule, _) = parse("# $type->flask $tier->quicksilver\nShow\n\tBaseType \"Quicksilver Flask\"\n");
        assert_eq!(rule.tags(), Some(("flask", "quicksilver")));
    }

    #[test]
    fn disable_and_reenable_round_trips() {
        let (mut rule, _) = parse(TIER);
        assert!(rule.set_visibility(Visibility::Disable));
        assert!(!rule.set_visibility(Visibility::Disable));
        let disabled = rule.render();
        assert!(disabled.starts_with("#Show # $type->currency $tier->t3\n#\tClass"));
        assert!(rule.set_visibility(Visibility::Show));
        assert_eq!(rule.render(), TIER);
    }

    #[test]
    fn parses_disabled_rule() {
        let text = "#Hide # $type->dlf_currency_stack $tier->t3\n#\tBaseType == \"Orb of Alchemy\"\n#\tStackSize < 2\n";
        let (mut rule, warnings) = parse(text);
        assert!(warnings.is_empty());
        assert_eq!(rule.visibility(), Visibility::Disable);
        assert_eq!(rule.keyword(), ActionKeyword::Hide);
        assert_eq!(
            rule.condition(ConditionKind::StackSize, Direction::Upper)
                .and_then(|c| c.first_integer()),
            Some(2)
        );
        assert!(rule.set_visibility(Visibility::Hide));
        assert_eq!(
            rule.render(),
            "Hide # $type->dlf_currency_stack $tier->t3\n\tBaseType == \"Orb of Alchemy\"\n\tStackSize < 2\n"
        );
    }

    #[test]
    fn set_condition_rewrites_only_that_line() {
        let text = "Show # $type->dlf_gems $tier->quality\n    Class \"Gems\"  # gems\n    Quality >= 20 # min\n";
        let (mut rule, _) = parse(text);
        assert!(rule.set_condition(Condition::integer(
            ConditionKind::Quality,
            Operator::GreaterEqual,
            15
        )));
        assert_eq!(
            rule.render(),
            "Show # $type->dlf_gems $tier->quality\n    Class \"Gems\"  # gems\n    Quality >= 15 # min\n"
        );
        assert!(!rule.set_condition(Condition::integer(
            ConditionKind::Quality,
            Operator::GreaterEqual,
            15
        )));
    }

    #[test]
    fn new_condition_is_appended_after_unterminated_last_line() {
        let (mut rule, _) = parse("Hide\r\n\tClass \"Maps\"");
        rule.set_condition(Condition::integer(ConditionKind::MapTier, Operator::Less, 5));
        assert_eq!(rule.render(), "Hide\r\n\tClass \"Maps\"\r\n\tMapTier < 5");
    }

    #[test]
    fn emptying_membership_disables_and_refilling_restores() {
        let (mut rule, _) = parse("Show # $type->currency $tier->t9\n\tBaseType == \"Scroll Fragment\"\n");
        assert!(rule.remove_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert_eq!(rule.visibility(), Visibility::Disable);
        assert!(!rule.set_visibility(Visibility::Show));
        assert!(rule.add_member(ConditionKind::BaseType, "Orb of Transmutation"));
        assert_eq!(rule.visibility(), Visibility::Show);
    }

    #[test]
    fn refilling_leaves_an_explicit_disable_alone() {
        let (mut rule, _) = parse("Show # $type->currency $tier->t9\n\tBaseType == \"Scroll Fragment\"\n");
        assert!(rule.set_visibility(Visibility::Disable));
        assert!(rule.remove_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert!(!rule.is_emptied());
        assert!(rule.add_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert_eq!(rule.visibility(), Visibility::Disable);

        let (mut stack, _) = parse("#Hide # $type->dlf_stacks $tier->t9\n#\tBaseType == \"Scroll Fragment\"\n#\tStackSize < 2\n");
        assert!(stack.remove_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert!(stack.add_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert_eq!(stack.visibility(), Visibility::Disable);
    }

    #[test]
    fn emptied_marker_survives_rendering() {
        let text = "Show # $type->currency $tier->t9\n\tBaseType == \"Scroll Fragment\"\n";
        let (mut rule, _) = parse(text);
        assert!(rule.remove_member(ConditionKind::BaseType, "Scroll Fragment"));
        let rendered = rule.render();
        assert!(rendered.starts_with("#Show # $type->currency $tier->t9 $dlf_emptied\n"));

        let (mut reparsed, _) = parse(&rendered);
        assert!(reparsed.is_emptied());
        assert_eq!(reparsed.visibility(), Visibility::Disable);
        assert!(reparsed.add_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert_eq!(reparsed.visibility(), Visibility::Show);
        assert_eq!(reparsed.render(), text);
    }

    #[test]
    fn marker_gets_its_own_comment_when_action_has_none() {
        let (mut rule, _) = parse("Hide\n\tBaseType == \"Scroll Fragment\"\n");
        assert!(rule.remove_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert!(rule.render().starts_with("#Hide # $dlf_emptied\n"));
        assert!(rule.add_member(ConditionKind::BaseType, "Scroll Fragment"));
        assert_eq!(rule.render(), "Hide\n\tBaseType == \"Scroll Fragment\"\n");
    }

    #[test]
    fn malformed_condition_makes_rule_opaque() {
        let (rule, warnings) = parse("Show\n\tItemLevel >= lots\n");
        assert!(rule.is_opaque());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, ParseWarningKind::MalformedCondition);
        assert_eq!(warnings[0].line, 2);
    }

    #[test]
    fn classify_requires_marker_directly_before_keyword() {
        assert_eq!(
            classify_action_line("#Show # $type->x"),
            Some((ActionKeyword::Show, true))
        );
        assert_eq!(classify_action_line("# Show these"), None);
        assert_eq!(classify_action_line("Minimal"), Some((ActionKeyword::Minimal, false)));
        assert_eq!(classify_action_line("Shower"), None);
    }
}
