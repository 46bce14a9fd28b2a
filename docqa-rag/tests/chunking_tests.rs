//! Property tests for recursive chunking.

use docqa_rag::{Chunker, Document, RecursiveChunker};
use proptest::prelude::*;

/// Text with paragraph breaks, line breaks, spaces and multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zé€0-9 \n]{0,400}"
}

/// A chunk size and an overlap strictly below it.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (4usize..80).prop_flat_map(|size| (Just(size), 0..size))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Dropping each chunk's overlap prefix and concatenating reconstructs
    /// the input exactly.
    #[test]
    fn fresh_text_tiles_the_document(text in arb_text(), (size, overlap) in arb_sizes()) {
        prop_assume!(!text.trim().is_empty());
        let chunker = RecursiveChunker::new(size, overlap);
        let splits = chunker.split(&text);

        let rebuilt: String = splits
            .iter()
            .map(|s| s.text.chars().skip(s.overlap).collect::<String>())
            .collect();
        prop_assert_eq!(rebuilt, text);
    }

    /// No chunk exceeds `chunk_size` characters and offsets match the text.
    #[test]
    fn chunks_fit_and_offsets_are_exact(text in arb_text(), (size, overlap) in arb_sizes()) {
        let chunker = RecursiveChunker::new(size, overlap);
        let chars: Vec<char> = text.chars().collect();

        for split in chunker.split(&text) {
            let len = split.text.chars().count();
            prop_assert!(len <= size, "chunk of {} chars exceeds {}", len, size);
            prop_assert_eq!(split.end - split.start, len);
            let expected: String = chars[split.start..split.end].iter().collect();
            prop_assert_eq!(split.text, expected.as_str());
        }
    }

    /// Every chunk after the first repeats at least `chunk_overlap` characters
    /// of preceding text, or all of it when less precedes.
    #[test]
    fn consecutive_chunks_overlap(text in arb_text(), (size, overlap) in arb_sizes()) {
        let chunker = RecursiveChunker::new(size, overlap);
        let splits = chunker.split(&text);

        if let Some(first) = splits.first() {
            prop_assert_eq!(first.overlap, 0);
        }
        for pair in splits.windows(2) {
            let fresh_start = pair[1].start + pair[1].overlap;
            prop_assert_eq!(fresh_start, pair[0].end);
            prop_assert!(pair[1].overlap >= overlap.min(fresh_start));
        }
    }

    /// Text that fits in one chunk is returned whole.
    #[test]
    fn short_text_is_a_single_chunk(text in "[a-z \n]{1,40}") {
        prop_assume!(!text.trim().is_empty());
        let splits = RecursiveChunker::new(40, 10).split(&text);
        prop_assert_eq!(splits.len(), 1);
        prop_assert_eq!(splits[0].text, text.as_str());
    }
}

#[test]
fn blank_document_yields_no_chunks() {
    let chunker = RecursiveChunker::new(3000, 500);
    assert!(chunker.chunk(&Document::new("d", "")).is_empty());
    assert!(chunker.chunk(&Document::new("d", " \n\n \t")).is_empty());
}

#[test]
fn paragraphs_are_preferred_split_points() {
    let para = "word ".repeat(10);
    let text = format!("{para}\n\n{para}\n\n{para}");
    let chunker = RecursiveChunker::new(70, 0);

    let splits = chunker.split(&text);
    assert_eq!(splits.len(), 3);
    assert!(splits[0].text.ends_with("\n\n"));
    assert!(splits[1].text.starts_with("word"));
}

#[test]
fn chunks_carry_document_identity_and_index() {
    let text = "alpha beta gamma delta ".repeat(50);
    let document = Document::new("report", text).with_metadata("source", "q2.pdf");
    let chunks = RecursiveChunker::new(100, 20).chunk(&document);

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.document_id, "report");
        assert_eq!(chunk.metadata["chunk_index"], i.to_string());
        assert_eq!(chunk.metadata["source"], "q2.pdf");
        assert!(chunk.embedding.is_empty());
    }

    let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), chunks.len());
}

#[test]
fn default_sizes_match_financial_reports() {
    let chunker = RecursiveChunker::new(3000, 500);
    let text = "Revenue grew year over year. ".repeat(400);
    let splits = chunker.split(&text);

    assert!(splits.len() >= 4);
    assert!(splits.iter().all(|s| s.text.chars().count() <= 3000));
    assert!(splits.iter().skip(1).all(|s| s.overlap >= 500));
}
