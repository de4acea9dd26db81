pub mod format;
pub mod segment;

pub use format::{format, format_with_limit, RenderPart, SummaryPanel, FALLBACK_FILENAME};
pub use segment::{split, SegmentError};
