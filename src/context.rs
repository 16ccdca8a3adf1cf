//! Prompt context assembled from processed documents.
//!
//! The chat layer prepends this block to a conversation so the model can
//! answer from uploaded material.

use crate::models::Document;

/// Per-document character budget when none is given.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Concatenate `"\n\nDocument: <name>\n<text prefix>"` for every document
/// with non-empty extracted text, in the order given.
pub fn build_context<'a, I>(docs: I, max_chars: usize) -> String
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut context = String::new();
    for doc in docs {
        let text = match doc.extracted_text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => continue,
        };
        context.push_str("\n\nDocument: ");
        context.push_str(&doc.original_filename);
        context.push('\n');
        context.push_str(prefix_chars(text, max_chars));
    }
    context
}

/// The first `n` characters of `s`, never splitting a character.
pub fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((byte, _)) => &s[..byte],
        None => s,
    }
}
