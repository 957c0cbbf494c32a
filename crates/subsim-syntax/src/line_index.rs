//! Byte offset to line number mapping.

use text_size::TextSize;

/// Maps byte offsets in a source text to 1-based line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<TextSize>,
}

impl LineIndex {
    /// Builds the index for `source`.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut starts = vec![TextSize::from(0)];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(TextSize::from((offset + 1) as u32));
            }
        }
        Self { starts }
    }

    /// Returns the 1-based line containing `offset`.
    #[must_use]
    pub fn line_of(&self, offset: TextSize) -> u32 {
        let index = match self.starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        index as u32 + 1
    }

    /// Number of lines in the source.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// Returns the text of the 1-based `line` of `source`, trimmed.
#[must_use]
pub fn line_text(source: &str, line: u32) -> &str {
    source
        .lines()
        .nth((line as usize).saturating_sub(1))
        .map_or("", str::trim)
}
