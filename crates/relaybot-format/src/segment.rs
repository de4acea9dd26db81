//! Length-bounded, code-fence-safe text segmentation.
//!
//! Splits prefer a paragraph break (double newline) and fall back to a
//! single newline; within a delimiter class the largest offset under the
//! limit wins, so each segment is as full as possible. A cut never lands
//! inside a fenced code block. When no cut satisfies the limit (e.g. a
//! single code block longer than the limit) the split fails and the caller
//! must fall back to a different rendering strategy — never truncate.

use thiserror::Error;

const CODE_FENCE: &str = "```";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("no valid break point under the message limit")]
    NoValidBreakPoint,
}

/// Split `text` into segments of at most `limit` bytes.
///
/// Segments are trimmed at each cut point; their concatenation reconstructs
/// the original text modulo that trimmed whitespace. Text at or under the
/// limit comes back as a single untouched segment.
pub fn split(text: &str, limit: usize) -> Result<Vec<String>, SegmentError> {
    if text.len() <= limit {
        return Ok(vec![text.to_string()]);
    }

    let blocks = code_block_ranges(text);
    let cut = best_cut(text, limit, "\n\n", &blocks)
        .or_else(|| best_cut(text, limit, "\n", &blocks))
        .ok_or(SegmentError::NoValidBreakPoint)?;

    let head = text[..cut].trim();
    let tail = text[cut..].trim();

    let mut segments = vec![head.to_string()];
    segments.extend(split(tail, limit)?);
    Ok(segments)
}

/// Fenced code-block ranges, as byte offsets `[start, end)`.
///
/// Fence markers are paired two-at-a-time in document order; an unpaired
/// trailing marker extends its block to the end of the text.
fn code_block_ranges(text: &str) -> Vec<(usize, usize)> {
    let marks: Vec<usize> = text.match_indices(CODE_FENCE).map(|(i, _)| i).collect();
    marks
        .chunks(2)
        .map(|pair| match pair {
            [open, close] => (*open, close + CODE_FENCE.len()),
            _ => (pair[0], text.len()),
        })
        .collect()
}

/// Largest delimiter offset that is under the limit and not strictly inside
/// a code block. An offset right after a block's closing fence is valid.
fn best_cut(text: &str, limit: usize, delimiter: &str, blocks: &[(usize, usize)]) -> Option<usize> {
    text.match_indices(delimiter)
        .map(|(i, _)| i)
        .filter(|&i| i < limit)
        .filter(|&i| !blocks.iter().any(|&(start, end)| i >= start && i < end))
        .max()
}
