use crate::reader::{LineReader, RawLine};

use super::rule::classify_action_line;
use super::types::extract_tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawBlockKind {
    Blank,
    Comment,
    Opaque,
    Rule,
}

#[derive(Debug, Clone)]
pub struct RawBlock<'a> {
    pub kind: RawBlockKind,
    pub lines: Vec<RawLine<'a>>,
}

impl RawBlock<'_> {
    pub fn start(&self) -> usize {
        self.lines.first().map_or(0, |l| l.start)
    }

    pub fn end(&self) -> usize {
        self.lines.last().map_or(0, |l| l.end())
    }

    pub fn first_line(&self) -> usize {
        self.lines.first().map_or(0, |l| l.number)
    }
}

/// Split filter text into blank runs, comment runs, opaque runs and rule
/// blocks. Every line of the input lands in exactly one block, in order.
pub fn split_blocks(source: &str) -> Vec<RawBlock<'_>> {
    let mut reader = LineReader::new(source);
    let mut blocks = Vec::new();

    while let Some(line) = reader.peek_line() {
        if line.is_blank() {
            let lines = reader.read_while(|l| l.is_blank());
            blocks.push(RawBlock {
                kind: RawBlockKind::Blank,
                lines,
            });
        } else {
            let run = reader.read_while(|l| !l.is_blank());
            split_run(run, &mut blocks);
        }
    }

    blocks
}

fn split_run<'a>(run: Vec<RawLine<'a>>, out: &mut Vec<RawBlock<'a>>) {
    let actions: Vec<(usize, bool)> = run
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| classify_action_line(line.text).map(|(_, disabled)| (idx, disabled)))
        .collect();

    if actions.is_empty() {
        let kind = if run.iter().all(RawLine::is_comment) {
            RawBlockKind::Comment
        } else {
            RawBlockKind::Opaque
        };
        out.push(RawBlock { kind, lines: run });
        return;
    }

    // Comment lines directly above an action line lead that rule, unless
    // they are the body of a disabled rule above it. That body ends at the
    // first comment carrying tags.
    let mut starts = Vec::with_capacity(actions.len());
    for (n, &(action, _)) in actions.iter().enumerate() {
        let (floor, previous_disabled) = match n {
            0 => (0, false),
            _ => (actions[n - 1].0 + 1, actions[n - 1].1),
        };
        let mut start = action;
        if previous_disabled {
            let tagged = (floor..action).find(|&i| carries_tags(&run[i]));
            if let Some(tagged) = tagged {
                if run[tagged..action].iter().all(RawLine::is_comment) {
                    start = tagged;
                }
            }
        } else {
            while start > floor && run[start - 1].is_comment() {
                start -= 1;
            }
        }
        starts.push(start);
    }

    let mut lines = run.into_iter();
    let mut consumed = 0usize;

    if starts[0] > 0 {
        let head: Vec<_> = lines.by_ref().take(starts[0]).collect();
        let kind = if head.iter().all(RawLine::is_comment) {
            RawBlockKind::Comment
        } else {
            RawBlockKind::Opaque
        };
        out.push(RawBlock { kind, lines: head });
        consumed = starts[0];
    }

    for n in 0..starts.len() {
        let take = match starts.get(n + 1) {
            Some(&next) => next - consumed,
            None => usize::MAX,
        };
        let block: Vec<_> = lines.by_ref().take(take).collect();
        consumed += block.len();
        out.push(RawBlock {
            kind: RawBlockKind::Rule,
            lines: block,
        });
    }
}

fn carries_tags(line: &RawLine<'_>) -> bool {
    if !line.is_comment() {
        return false;
    }
    let (type_tag, tier_tag) = extract_tags(line.text);
    type_tag.is_some() || tier_tag.is_some()
}
