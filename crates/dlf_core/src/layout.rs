use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Blank,
    Comment,
    Opaque,
    Rule(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub kind: BlockKind,
    pub first_line: usize,
    pub range: TextRange,
}

/// Byte ranges of every block of a filter file, in file order.
#[derive(Debug, Clone, Default)]
pub struct FileLayout {
    pub file_len: usize,
    pub blocks: Vec<BlockLayout>,
}

impl FileLayout {
    pub fn rule_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b.kind, BlockKind::Rule(_)))
            .count()
    }

    /// Blocks must tile the file: contiguous, non-overlapping, covering every byte.
    pub fn validate(&self) -> io::Result<()> {
        if self.blocks.is_empty() {
            if self.file_len == 0 {
                return Ok(());
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "non-empty filter produced no blocks",
            ));
        }

        let mut expected = 0usize;
        for block in &self.blocks {
            if block.range.start != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "layout gap/overlap around {:?} at line {}: expected start {}, got {}",
                        block.kind, block.first_line, expected, block.range.start
                    ),
                ));
            }
            if block.range.is_empty() || block.range.end < block.range.start {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "invalid block range {:?}: {}..{}",
                        block.kind, block.range.start, block.range.end
                    ),
                ));
            }
            expected = block.range.end;
        }

        if expected != self.file_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "layout does not cover file: ended at {}, file length {}",
                    expected, self.file_len
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: BlockKind, start: usize, end: usize) -> BlockLayout {
        BlockLayout {
            kind,
            first_line: 1,
            range: TextRange { start, end },
        }
    }

    #[test]
    fn empty_layout_is_valid_only_for_empty_file() {
        let ok = FileLayout::default();
        assert!(ok.validate().is_ok());

        let bad = FileLayout {
            file_len: 3,
            blocks: Vec::new(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn detects_gaps_and_short_coverage() {
        let gap = FileLayout {
            file_len: 10,
            blocks: vec![block(BlockKind::Blank, 0, 4), block(BlockKind::Rule(0), 5, 10)],
        };
        assert!(gap.validate().is_err());

        let short = FileLayout {
            file_len: 10,
            blocks: vec![block(BlockKind::Comment, 0, 4), block(BlockKind::Rule(0), 4, 9)],
        };
        assert!(short.validate().is_err());

        let tiled = FileLayout {
            file_len: 10,
            blocks: vec![block(BlockKind::Comment, 0, 4), block(BlockKind::Rule(0), 4, 10)],
        };
        assert!(tiled.validate().is_ok());
        assert_eq!(tiled.rule_count(), 1);
    }
}
