/// One physical line of filter text.
///
/// `text` excludes the terminator; `terminator` is `"\n"`, `"\r\n"` or empty
/// (last line without a newline), so `text + terminator` is exactly the
/// bytes consumed from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub number: usize,
    pub start: usize,
    pub text: &'a str,
    pub terminator: &'a str,
}

impl<'a> RawLine<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len() + self.terminator.len()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_comment(&self) -> bool {
        self.text.trim_start().starts_with('#')
    }
}

pub struct LineReader<'a> {
    source: &'a str,
    pos: usize,
    line_number: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line_number: 1,
        }
    }

    pub fn peek_line(&self) -> Option<RawLine<'a>> {
        if self.pos >= self.source.len() {
            return None;
        }

        let rest = &self.source[self.pos..];
        let (text, terminator) = match rest.find('\n') {
            Some(idx) => {
                let body = &rest[..idx];
                match body.strip_suffix('\r') {
                    Some(stripped) => (stripped, &rest[idx - 1..=idx]),
                    None => (body, &rest[idx..=idx]),
                }
            }
            None => (rest, ""),
        };

        Some(RawLine {
            number: self.line_number,
            start: self.pos,
            text,
            terminator,
        })
    }

    pub fn read_line(&mut self) -> Option<RawLine<'a>> {
        let line = self.peek_line()?;
        self.pos = line.end();
        self.line_number += 1;
        Some(line)
    }

    /// Consume lines while `keep` holds, returning them in order.
    pub fn read_while(&mut self, mut keep: impl FnMut(&RawLine<'a>) -> bool) -> Vec<RawLine<'a>> {
        let mut out = Vec::new();
        while let Some(line) = self.peek_line() {
            if !keep(&line) {
                break;
            }
            self.pos = line.end();
            self.line_number += 1;
            out.push(line);
        }
        out
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_terminators_and_offsets() {
        let mut r = LineReader::new("Show\r\n\tClass \"Maps\"\nHide");
        let a = r.read_line().unwrap();
        assert_eq!((a.text, a.terminator, a.start), ("Show", "\r\n", 0));
        let b = r.read_line().unwrap();
        assert_eq!((b.text, b.terminator, b.number), ("\tClass \"Maps\"", "\n", 2));
        let c = r.read_line().unwrap();
        assert_eq!((c.text, c.terminator), ("Hide", ""));
        assert!(r.read_line().is_none());
        assert!(r.is_at_end());
    }

    #[test]
    fn read_while_stops_at_first_rejected_line() {
        let mut r = LineReader::new("\n  \nShow\n");
        let blanks = r.read_while(|l| l.is_blank());
        assert_eq!(blanks.len(), 2);
        assert_eq!(r.line_number(), 3);
        assert_eq!(r.peek_line().unwrap().text, "Show");
    }
}
