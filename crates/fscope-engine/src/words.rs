//! Legacy command-line word splitting.
//!
//! A word is a maximal run of bytes strictly greater than the space
//! character and at most `b'z'`; every other byte (control characters,
//! whitespace, and anything above `z`, including all non-ASCII bytes) acts
//! as a separator. This is the historic printable-ASCII splitting rule and
//! is preserved byte-for-byte for argument compatibility; it is deliberately
//! not Unicode-aware.

pub fn is_word_byte(b: u8) -> bool {
    b > b' ' && b <= b'z'
}

/// The first word of `line`, or `""` when the line contains none.
pub fn first_word(line: &str) -> &str {
    words(line).next().unwrap_or("")
}

/// Iterator over the words of `line`, in order.
///
/// Word bytes are all ASCII, so the yielded slices always fall on UTF-8
/// boundaries even when the line contains multi-byte separators.
pub fn words(line: &str) -> impl Iterator<Item = &str> {
    let bytes = line.as_bytes();
    let mut pos = 0usize;
    std::iter::from_fn(move || {
        while pos < bytes.len() && !is_word_byte(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        while pos < bytes.len() && is_word_byte(bytes[pos]) {
            pos += 1;
        }
        Some(&line[start..pos])
    })
}

/// Everything after the first word (with leading separators dropped), for
/// handlers that re-parse their own arguments.
pub fn rest_after_first(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut pos = 0usize;
    while pos < bytes.len() && !is_word_byte(bytes[pos]) {
        pos += 1;
    }
    while pos < bytes.len() && is_word_byte(bytes[pos]) {
        pos += 1;
    }
    while pos < bytes.len() && !is_word_byte(bytes[pos]) {
        pos += 1;
    }
    &line[pos..]
}
