//! Integration tests for the tree builder and table merge pass.

use doctree::{
    BlockBody, BlockKind, BuildOptions, Element, Error, HeadingMode, TreeBuilder,
};

fn two_col_rows(n: usize) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| vec![format!("a{i}"), format!("b{i}")])
        .collect()
}

#[test]
fn test_reference_scenario_stream() {
    // heading(1,"Intro"), paragraph("Hello"), table(cols=2,rows=3),
    // page_break, table(cols=2,rows=2), heading(2,"Sub"), paragraph("World")
    let elements = vec![
        Element::heading(1, "Intro"),
        Element::paragraph("Hello"),
        Element::table(["c1", "c2"], two_col_rows(3)),
        Element::PageBreak,
        Element::table(["c1", "c2"], two_col_rows(2)),
        Element::heading(2, "Sub"),
        Element::paragraph("World"),
    ];

    let doc = TreeBuilder::new().build("Doc A", "doc_a.pdf", &elements).unwrap();

    assert_eq!(doc.title, "Doc A");
    assert!(doc.blocks.is_empty());
    assert_eq!(doc.sections.len(), 1);

    let intro = &doc.sections[0];
    assert_eq!(intro.title, "Intro");
    assert_eq!(intro.level, 1);
    assert_eq!(intro.order, 0);
    assert_eq!(intro.blocks.len(), 2);
    assert_eq!(intro.blocks[0].text(), Some("Hello"));
    assert_eq!(intro.blocks[0].order, 0);

    match &intro.blocks[1].body {
        BlockBody::Table {
            rows, row_count, ..
        } => {
            assert_eq!(rows.len(), 5);
            assert_eq!(*row_count, 5);
        }
        other => panic!("expected merged table, got {other:?}"),
    }
    assert_eq!(intro.blocks[1].order, 1);
    let pages = intro.blocks[1].pages.unwrap();
    assert_eq!((pages.start, pages.end), (1, 2));

    let sub = &intro.sections[0];
    assert_eq!(sub.title, "Sub");
    assert_eq!(sub.level, 2);
    assert_eq!(sub.order, 0);
    assert_eq!(sub.blocks[0].text(), Some("World"));
    assert_eq!(sub.blocks[0].order, 0);
}

#[test]
fn test_empty_stream_is_not_an_error() {
    let doc = TreeBuilder::new().build("Empty", "empty.pdf", &[]).unwrap();
    assert_eq!(doc.section_count(), 0);
    assert_eq!(doc.block_count(), 0);
}

#[test]
fn test_level_jumps_clamp_to_parent_plus_one() {
    let doc = TreeBuilder::new()
        .build(
            "Doc",
            "doc.pdf",
            &[
                Element::heading(1, "One"),
                Element::heading(4, "Four"),
                Element::heading(2, "Two"),
            ],
        )
        .unwrap();

    let levels: Vec<u8> = {
        let top = &doc.sections[0];
        let mut levels = vec![top.level];
        levels.extend(top.sections.iter().map(|s| s.level));
        levels
    };
    assert_eq!(levels, vec![1, 2, 2]);
}

#[test]
fn test_levels_increase_by_exactly_one() {
    // Deep jumps anywhere in the stream never produce a child more than one
    // level below its parent.
    let elements = vec![
        Element::heading(2, "A"),
        Element::heading(6, "B"),
        Element::heading(3, "C"),
        Element::heading(1, "D"),
        Element::heading(5, "E"),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    fn check(sections: &[doctree::Section], parent_level: u8) {
        for (i, section) in sections.iter().enumerate() {
            assert_eq!(section.level, parent_level + 1);
            assert_eq!(section.order, i as u32);
            check(&section.sections, section.level);
        }
    }
    check(&doc.sections, 0);
}

#[test]
fn test_strict_mode_rejects_level_gap() {
    let builder = TreeBuilder::with_options(
        BuildOptions::new().with_heading_mode(HeadingMode::Strict),
    );
    let result = builder.build(
        "Doc",
        "doc.pdf",
        &[Element::heading(1, "A"), Element::heading(3, "C")],
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_tables_with_different_column_counts_never_merge() {
    let elements = vec![
        Element::table(["a", "b"], two_col_rows(2)),
        Element::PageBreak,
        Element::table(["a", "b", "c"], vec![vec!["1".into(), "2".into(), "3".into()]]),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    assert_eq!(doc.blocks.len(), 2);
    assert_eq!(doc.blocks[0].order, 0);
    assert_eq!(doc.blocks[1].order, 1);
}

#[test]
fn test_intervening_text_breaks_merge_chain() {
    let elements = vec![
        Element::table(["a", "b"], two_col_rows(2)),
        Element::paragraph("between"),
        Element::table(["a", "b"], two_col_rows(1)),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    let tables = doc
        .blocks
        .iter()
        .filter(|b| b.kind() == BlockKind::Table)
        .count();
    assert_eq!(tables, 2);
    assert_eq!(doc.blocks.len(), 3);
}

#[test]
fn test_whitespace_paragraph_does_not_break_merge_chain() {
    let elements = vec![
        Element::table(["a", "b"], two_col_rows(2)),
        Element::paragraph("  \n "),
        Element::table(["a", "b"], two_col_rows(3)),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    assert_eq!(doc.blocks.len(), 1);
    match &doc.blocks[0].body {
        BlockBody::Table { row_count, .. } => assert_eq!(*row_count, 5),
        other => panic!("expected table, got {other:?}"),
    }
}

#[test]
fn test_heading_between_tables_prevents_merge() {
    let elements = vec![
        Element::heading(1, "A"),
        Element::table(["x", "y"], two_col_rows(1)),
        Element::heading(1, "B"),
        Element::table(["x", "y"], two_col_rows(1)),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    assert_eq!(doc.sections[0].blocks.len(), 1);
    assert_eq!(doc.sections[1].blocks.len(), 1);
}

#[test]
fn test_three_way_merge_across_two_page_breaks() {
    let elements = vec![
        Element::table(["a", "b"], two_col_rows(2)),
        Element::PageBreak,
        Element::table(["a", "b"], two_col_rows(2)),
        Element::PageBreak,
        Element::table(["a", "b"], two_col_rows(2)),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    assert_eq!(doc.blocks.len(), 1);
    match &doc.blocks[0].body {
        BlockBody::Table { row_count, .. } => assert_eq!(*row_count, 6),
        other => panic!("expected table, got {other:?}"),
    }
    let pages = doc.blocks[0].pages.unwrap();
    assert_eq!((pages.start, pages.end), (1, 3));
}

#[test]
fn test_leading_content_attaches_to_document_root() {
    let elements = vec![
        Element::paragraph("abstract"),
        Element::picture(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        Element::heading(1, "Body"),
    ];
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &elements).unwrap();

    assert_eq!(doc.blocks.len(), 2);
    assert_eq!(doc.blocks[0].kind(), BlockKind::Text);
    assert_eq!(doc.blocks[1].kind(), BlockKind::Image);
    assert_eq!(doc.blocks[1].order, 1);
}

#[test]
fn test_unknown_element_type_is_invalid_input() {
    let json = r#"[{"type": "marginalia", "text": "note"}]"#;
    let result = doctree::elements_from_json(json);
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_stream_round_trip_through_wire_format() {
    let elements = vec![
        Element::heading(1, "Intro"),
        Element::table(["k", "v"], two_col_rows(1)),
        Element::PageBreak,
    ];
    let json = serde_json::to_string(&elements).unwrap();
    let parsed = doctree::elements_from_json(&json).unwrap();
    let doc = TreeBuilder::new().build("Doc", "doc.pdf", &parsed).unwrap();
    assert_eq!(doc.sections.len(), 1);
    assert_eq!(doc.sections[0].blocks.len(), 1);
}
