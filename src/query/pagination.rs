//! Relay-style pagination over sorted rows.

use serde::Serialize;

use super::cursor::Cursor;
use super::sort::{SortRow, SortSpec};
use crate::errors::EngineResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub first: Option<usize>,
    pub after: Option<String>,
}

/// Page size defaults and bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageLimits {
    pub default_page_size: Option<usize>,
    pub max_page_size: Option<usize>,
}

impl PageLimits {
    fn effective_size(&self, first: Option<usize>) -> Option<usize> {
        let size = first.or(self.default_page_size);
        match (size, self.max_page_size) {
            (Some(size), Some(max)) => Some(size.min(max)),
            (None, Some(max)) => Some(max),
            (size, None) => size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageEdge<R> {
    pub cursor: String,
    pub row: R,
}

#[derive(Debug, Clone)]
pub struct Page<R> {
    pub edges: Vec<PageEdge<R>>,
    pub page_info: PageInfo,
    /// Matching rows regardless of `first`/`after`.
    pub total_count: usize,
}

/// Sort `rows` and cut the page that follows `request.after`.
pub fn paginate<R: SortRow>(
    mut rows: Vec<R>,
    spec: &SortSpec,
    request: &PageRequest,
    limits: PageLimits,
) -> EngineResult<Page<R>> {
    let total_count = rows.len();
    spec.sort(&mut rows);

    let start = match &request.after {
        Some(token) => {
            let cursor = Cursor::decode(token)?;
            cursor.check_against(spec)?;
            rows.partition_point(|row| cursor.compare(spec, row) != std::cmp::Ordering::Greater)
        }
        None => 0,
    };

    let remaining = total_count - start;
    let take = limits
        .effective_size(request.first)
        .map_or(remaining, |size| size.min(remaining));

    let edges: Vec<PageEdge<R>> = rows
        .into_iter()
        .skip(start)
        .take(take)
        .map(|row| PageEdge {
            cursor: Cursor::for_row(&row, spec).encode(),
            row,
        })
        .collect();

    let page_info = PageInfo {
        has_next_page: start + take < total_count,
        has_previous_page: start > 0,
        start_cursor: edges.first().map(|e| e.cursor.clone()),
        end_cursor: edges.last().map(|e| e.cursor.clone()),
    };

    Ok(Page {
        edges,
        page_info,
        total_count,
    })
}
