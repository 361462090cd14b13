//! Page range parsing
//!
//! Turns user text like `"1-3, 5, 8-"` into 1-based positions of the
//! current page order. Supported tokens, separated by commas:
//!
//! - `N`    a single position
//! - `A-B`  an inclusive range (reversed bounds are swapped)
//! - `-N`   positions `1..=N`
//! - `N-`   positions `N..=page_count`

use crate::error::PageEditError;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Parse range text into sorted unique positions.
///
/// Empty input yields an empty set; the caller decides what "nothing
/// specified" means.
pub fn parse(input: &str, page_count: usize) -> Result<BTreeSet<usize>, PageEditError> {
    let mut positions = BTreeSet::new();
    for segment in parse_segments(input, page_count)? {
        positions.extend(segment);
    }
    Ok(positions)
}

/// Parse range text into validated segments, in input order.
///
/// Segments are not merged or deduplicated, so `"1-3, 2"` yields two
/// segments. Split export relies on this to produce one file per segment.
pub fn parse_segments(
    input: &str,
    page_count: usize,
) -> Result<Vec<RangeInclusive<usize>>, PageEditError> {
    let mut segments = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        segments.push(parse_token(part, page_count)?);
    }

    Ok(segments)
}

fn parse_token(token: &str, page_count: usize) -> Result<RangeInclusive<usize>, PageEditError> {
    if token == "-" {
        return Err(format_error(token));
    }

    let (start, end) = match token.split_once('-') {
        // "-N": from the first page
        Some(("", end)) => {
            let end = parse_number(end, token, page_count)?;
            check_bounds(end, page_count)?;
            (1, end)
        }
        // "N-": to the last page
        Some((start, "")) => {
            let start = parse_number(start, token, page_count)?;
            check_bounds(start, page_count)?;
            (start, page_count)
        }
        Some((start, end)) => {
            let start = parse_number(start, token, page_count)?;
            let end = parse_number(end, token, page_count)?;
            check_bounds(start, page_count)?;
            check_bounds(end, page_count)?;
            if start > end {
                (end, start)
            } else {
                (start, end)
            }
        }
        None => {
            let page = parse_number(token, token, page_count)?;
            check_bounds(page, page_count)?;
            (page, page)
        }
    };

    Ok(start..=end)
}

fn parse_number(text: &str, token: &str, page_count: usize) -> Result<usize, PageEditError> {
    let text = text.trim();
    // Reject signs and other prefixes that usize::from_str would accept ("+3")
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format_error(token));
    }
    // All digits, so the only possible failure is overflow
    text.parse().map_err(|_| PageEditError::Range {
        position: usize::MAX,
        page_count,
    })
}

fn check_bounds(position: usize, page_count: usize) -> Result<(), PageEditError> {
    if position == 0 || position > page_count {
        return Err(PageEditError::Range {
            position,
            page_count,
        });
    }
    Ok(())
}

fn format_error(token: &str) -> PageEditError {
    PageEditError::Format {
        token: token.to_string(),
    }
}
