use crate::error::{NotesError, Result};

/// A slice of the source document sent to the model in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    /// Offset of the first character of this chunk in the document, in chars.
    pub char_offset: usize,
    pub text: String,
}

fn is_boundary(c: char) -> bool {
    matches!(c, '\n' | '。' | '！' | '？' | '.' | '!' | '?')
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Cuts right after the last line or sentence break that fits; a run with no
/// break is cut at the limit. Concatenating the chunks gives back `text`.
pub fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<TextChunk>> {
    if max_chars == 0 {
        return Err(NotesError::Config(
            "max_char_buffer must be greater than zero".to_string(),
        ));
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let limit = (start + max_chars).min(chars.len());
        let end = if limit == chars.len() {
            limit
        } else {
            (start + 1..=limit)
                .rev()
                .find(|&i| is_boundary(chars[i - 1]))
                .unwrap_or(limit)
        };

        chunks.push(TextChunk {
            index: chunks.len(),
            char_offset: start,
            text: chars[start..end].iter().collect(),
        });
        start = end;
    }

    Ok(chunks)
}

/// Locate `needle` in `haystack`, returning the char range of the first match.
pub fn find_char_span(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let byte_pos = haystack.find(needle)?;
    let start = haystack[..byte_pos].chars().count();
    Some((start, start + needle.chars().count()))
}
