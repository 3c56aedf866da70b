//! Content extraction from HTML pages
//!
//! Turns the harvested page into the two things the pipeline needs:
//! - the visible text of the page body
//! - the deduplicated set of absolute image URLs it references

mod parser;

pub use parser::{extract_content, ExtractedContent};
