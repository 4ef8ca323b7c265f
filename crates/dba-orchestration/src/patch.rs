//! Idempotent insertion of directives beneath an anchor line
//!
//! These work on text only. Callers read the file, patch, and rewrite it
//! when the result is [`Cow::Owned`].

use std::borrow::Cow;
use thiserror::Error;

/// The anchor line is not in the file
#[derive(Debug, Clone, Error)]
#[error("anchor line not found: '{anchor}'")]
pub struct AnchorNotFound {
    /// The missing anchor
    pub anchor: String,
}

/// Insert `candidate` on the line right after the first `anchor` line.
///
/// Content that already contains `candidate` anywhere comes back borrowed
/// and unchanged.
pub fn ensure_line_under_anchor<'a>(
    content: &'a str,
    anchor: &str,
    candidate: &str,
) -> Result<Cow<'a, str>, AnchorNotFound> {
    ensure_lines_under_anchor(content, anchor, &[candidate])
}

/// Insert every missing candidate as one block right after the first `anchor`
/// line, in the order given.
pub fn ensure_lines_under_anchor<'a, S: AsRef<str>>(
    content: &'a str,
    anchor: &str,
    candidates: &[S],
) -> Result<Cow<'a, str>, AnchorNotFound> {
    let missing: Vec<&str> = candidates
        .iter()
        .map(AsRef::as_ref)
        .filter(|c| !content.contains(c))
        .collect();
    if missing.is_empty() {
        return Ok(Cow::Borrowed(content));
    }

    let start = content.find(anchor).ok_or_else(|| AnchorNotFound {
        anchor: anchor.to_string(),
    })?;
    let eol = line_ending(content);

    let mut patched = String::with_capacity(content.len() + missing.len() * 64);
    match content[start..].find('\n') {
        Some(offset) => {
            let split = start + offset + 1;
            patched.push_str(&content[..split]);
            for line in &missing {
                patched.push_str(line);
                patched.push_str(eol);
            }
            patched.push_str(&content[split..]);
        }
        // Anchor is the last line and has no terminator
        None => {
            patched.push_str(content);
            for line in &missing {
                patched.push_str(eol);
                patched.push_str(line);
            }
            patched.push_str(eol);
        }
    }
    Ok(Cow::Owned(patched))
}

fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") { "\r\n" } else { "\n" }
}
