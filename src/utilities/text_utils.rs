use std::mem;

const EXTRA_PUNCTUATION: [char; 10] = ['«', '»', '—', '–', '…', '„', '“', '”', '‘', '’'];

pub trait TruncateWithEllipsis {
    fn truncate_with_ellipsis(self, max_len: usize) -> Self;
}

impl TruncateWithEllipsis for String {
    /// keeps the first `max_len` characters and appends `...` if anything was cut off
    fn truncate_with_ellipsis(mut self, max_len: usize) -> Self {
        if let Some((index, _)) = self.char_indices().nth(max_len) {
            self.truncate(index);
            self.push_str("...");
        }

        self
    }
}

/// replaces characters a typeface is unlikely to have (emoji, pictographs, symbols) with spaces
pub fn sanitize<S: AsRef<str>>(text: S) -> String {
    text.as_ref()
        .chars()
        .map(|char| {
            if char.is_alphanumeric()
                || char.is_whitespace()
                || char.is_ascii_punctuation()
                || EXTRA_PUNCTUATION.contains(&char)
            {
                char
            } else {
                ' '
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub block_height: f32,
}

/// Greedily wraps `text` into lines no wider than `max_width`.
///
/// Words are never split: a word that is wider than `max_width` on its own gets a line of its
/// own. Line breaks already present in `text` are kept.
#[expect(clippy::cast_precision_loss)] // line counts are tiny
pub fn wrap(
    text: &str,
    max_width: f32,
    line_height: f32,
    measure: impl Fn(&str) -> f32,
) -> TextBlock {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();

        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }

            let candidate = format!("{line} {word}");
            if measure(&candidate) <= max_width {
                line = candidate;
            } else {
                lines.push(mem::replace(&mut line, word.to_owned()));
            }
        }

        if !line.is_empty() {
            lines.push(line);
        }
    }

    let block_height = lines.len() as f32 * line_height;
    TextBlock { lines, block_height }
}
