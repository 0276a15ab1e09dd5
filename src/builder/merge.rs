//! Table merge — joins table fragments split across a page boundary.

use crate::model::{BlockBody, ContentBlock};

/// Merge an incoming table fragment into the immediately preceding sibling
/// block, if it is a table with the same column count.
///
/// Adjacency is implicit in the lookback: intervening content appends a
/// block in between, and an intervening heading moves the insertion point
/// to a different block list entirely. Page-break markers produce no block
/// and so do not break the chain.
///
/// Returns `true` when the fragment was absorbed; the caller then emits no
/// new block. This is a single-lookback heuristic — no multi-page lookahead
/// and no column-count correction.
pub(crate) fn try_merge(
    blocks: &mut [ContentBlock],
    columns: &[String],
    rows: &[Vec<String>],
    page: u32,
) -> bool {
    let Some(last) = blocks.last_mut() else {
        return false;
    };
    let BlockBody::Table {
        columns: prev_columns,
        rows: prev_rows,
        row_count,
        ..
    } = &mut last.body
    else {
        return false;
    };

    if prev_columns.len() != columns.len() {
        return false;
    }

    prev_rows.extend(rows.iter().cloned());
    *row_count = prev_rows.len();
    if let Some(range) = last.pages.as_mut() {
        range.extend_to(page);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockBody, ContentBlock, PageRange};

    fn table_block(columns: &[&str], rows: usize, page: u32) -> ContentBlock {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        let rows = (0..rows)
            .map(|i| vec![format!("r{i}a"), format!("r{i}b")])
            .collect();
        ContentBlock::new(
            BlockBody::table(columns, rows, None),
            0,
            Some(PageRange::single(page)),
        )
    }

    #[test]
    fn test_merges_matching_column_count() {
        let mut blocks = vec![table_block(&["a", "b"], 3, 1)];
        let incoming = vec![vec!["x".to_string(), "y".to_string()]; 2];

        assert!(try_merge(
            &mut blocks,
            &["c".to_string(), "d".to_string()],
            &incoming,
            2
        ));
        assert_eq!(blocks.len(), 1);

        match &blocks[0].body {
            BlockBody::Table {
                rows, row_count, ..
            } => {
                assert_eq!(rows.len(), 5);
                assert_eq!(*row_count, 5);
            }
            _ => panic!("expected table"),
        }
        assert_eq!(blocks[0].pages, Some(PageRange { start: 1, end: 2 }));
    }

    #[test]
    fn test_refuses_different_column_count() {
        let mut blocks = vec![table_block(&["a", "b"], 3, 1)];
        let incoming = vec![vec!["x".to_string()]];

        assert!(!try_merge(&mut blocks, &["only".to_string()], &incoming, 2));
    }

    #[test]
    fn test_refuses_non_table_predecessor() {
        let mut blocks = vec![ContentBlock::new(BlockBody::text("between"), 0, None)];
        assert!(!try_merge(&mut blocks, &["a".to_string()], &[], 1));
    }

    #[test]
    fn test_refuses_empty_sibling_list() {
        let mut blocks: Vec<ContentBlock> = Vec::new();
        assert!(!try_merge(&mut blocks, &["a".to_string()], &[], 1));
    }
}
