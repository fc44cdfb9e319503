use citeaudit_core::document::{char_at_position, node_size, DocumentNode, Mark};
use citeaudit_core::{map_document, ReferenceSettings};
use proptest::prelude::*;

fn leaf() -> impl Strategy<Value = DocumentNode> {
    prop_oneof![
        4 => "[a-zA-Z0-9 ,.()\\[\\]é&😀]{0,12}".prop_map(|s| DocumentNode::text(s)),
        1 => "[a-z ]{1,8}".prop_map(|s| DocumentNode::text(s).with_mark(Mark::new("bold"))),
        1 => Just(DocumentNode::atom("image")),
        1 => Just(DocumentNode::citation("smith2020", "(Smith, 2020)")),
    ]
}

fn block() -> impl Strategy<Value = DocumentNode> {
    leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            3 => prop::collection::vec(inner.clone(), 0..4).prop_map(DocumentNode::paragraph),
            1 => prop::collection::vec(inner.clone(), 0..3)
                .prop_map(|c| DocumentNode::container("listItem", c)),
            1 => prop_oneof![
                Just("References".to_string()),
                Just("Method".to_string()),
                "[A-Za-z ]{0,10}",
            ]
            .prop_map(|title| DocumentNode::heading(2, vec![DocumentNode::text(title)])),
        ]
    })
}

fn document() -> impl Strategy<Value = DocumentNode> {
    prop::collection::vec(block(), 0..6).prop_map(DocumentNode::doc)
}

proptest! {
    #[test]
    fn every_character_maps_back_to_itself(root in document()) {
        let mapped = map_document(&root, &ReferenceSettings::default().headings);
        prop_assert_eq!(mapped.full_text.chars().count(), mapped.text_index_to_pos.len());
        for (i, ch) in mapped.full_text.chars().enumerate() {
            prop_assert_eq!(char_at_position(&root, mapped.text_index_to_pos[i]), Some(ch));
        }
    }

    #[test]
    fn positions_increase_and_stay_inside_the_document(root in document()) {
        let mapped = map_document(&root, &ReferenceSettings::default().headings);
        let size: usize = root.children().iter().map(node_size).sum();
        for pair in mapped.text_index_to_pos.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
        if let Some(&last) = mapped.text_index_to_pos.last() {
            prop_assert!(last < size);
        }
    }

    #[test]
    fn sections_are_ordered_and_disjoint(root in document()) {
        let mapped = map_document(&root, &ReferenceSettings::default().headings);
        for pair in mapped.sections.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
            prop_assert!(pair[0].text_end <= pair[1].text_start);
        }
        if let Some(last) = mapped.sections.last() {
            prop_assert_eq!(last.text_end, mapped.char_len());
        }
    }

    #[test]
    fn text_runs_are_contiguous(root in document()) {
        let mapped = map_document(&root, &ReferenceSettings::default().headings);
        for run in &mapped.runs {
            let width: usize = mapped
                .slice(run.text_start, run.text_end)
                .chars()
                .map(char::len_utf16)
                .sum();
            prop_assert_eq!(
                mapped.document_range(run.text_start, run.text_end),
                Some((run.pos_start, run.pos_start + width))
            );
        }
    }
}
