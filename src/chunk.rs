//! Deterministic text chunker.
//!
//! Two strategies split document text into ordered, trimmed, non-empty
//! fragments:
//!
//! - **Fixed window**: consecutive slices of `size` characters, each window
//!   starting `size - overlap` characters after the previous one. The final
//!   window may be shorter.
//! - **Recursive**: walks a separator hierarchy (paragraph break, line
//!   break, sentence end, space). The first separator present in the block
//!   splits it into pieces, which are greedily packed into groups of at most
//!   `size` characters. Groups that still exceed `size` go through the fixed
//!   window splitter. A block containing none of the separators is emitted
//!   whole, even if it is longer than `size`.
//!
//! Sizes are measured in Unicode scalar values, never bytes, so slicing is
//! always on character boundaries. Splitting is pure: no ids, no clock, no
//! randomness. Validation of `size`/`overlap` happens at the ingest
//! boundary; see [`ChunkingParams::validate`](crate::models::ChunkingParams::validate).

use crate::models::ChunkingStrategy;

/// A split marker in the recursive hierarchy.
///
/// Pieces keep the non-whitespace head of the marker (the `.` of `". "`), so
/// only whitespace is lost at group boundaries.
struct Separator {
    pattern: &'static str,
    kept: &'static str,
    joiner: &'static str,
}

const SEPARATORS: [Separator; 4] = [
    Separator {
        pattern: "\n\n",
        kept: "",
        joiner: "\n\n",
    },
    Separator {
        pattern: "\n",
        kept: "",
        joiner: "\n",
    },
    Separator {
        pattern: ". ",
        kept: ".",
        joiner: " ",
    },
    Separator {
        pattern: " ",
        kept: "",
        joiner: " ",
    },
];

/// Split `text` with the given strategy.
///
/// Returns fragments in document order, each trimmed and non-empty.
/// Empty input yields an empty vector.
pub fn split(text: &str, strategy: ChunkingStrategy, size: usize, overlap: usize) -> Vec<String> {
    match strategy {
        ChunkingStrategy::Fixed => split_fixed(text, size, overlap),
        ChunkingStrategy::Recursive => split_recursive(text, size, overlap),
    }
}

/// Fixed-window split, trimmed and filtered.
pub fn split_fixed(text: &str, size: usize, overlap: usize) -> Vec<String> {
    finalize(fixed_windows(text, size, overlap))
}

/// Raw fixed windows over `text`, before trimming.
///
/// Window `i + 1` starts `size - overlap` characters after window `i`, so the
/// first `overlap` characters of one window repeat the last `overlap`
/// characters of the previous one. A `size` of zero returns the whole text as
/// a single window.
pub fn fixed_windows(text: &str, size: usize, overlap: usize) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    if size == 0 {
        return vec![text];
    }

    // Byte offset of every char, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = bounds.len() - 1;
    let step = size.saturating_sub(overlap).max(1);

    let mut windows = Vec::with_capacity(n / step + 1);
    let mut start = 0;
    while start < n {
        let end = (start + size).min(n);
        windows.push(&text[bounds[start]..bounds[end]]);
        if end == n {
            break;
        }
        start += step;
    }
    windows
}

/// Separator-hierarchy split, trimmed and filtered.
pub fn split_recursive(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();
    let mut level = 0;

    // Descending a level when the separator is absent is the only recursion
    // in the algorithm, so it runs as a loop.
    loop {
        if char_len(text) <= size || level >= SEPARATORS.len() {
            out.push(text);
            break;
        }
        let sep = &SEPARATORS[level];
        if !text.contains(sep.pattern) {
            level += 1;
            continue;
        }
        pack_pieces(text, sep, size, overlap, &mut out);
        break;
    }

    finalize(out)
}

/// Greedily pack the pieces of `block` into groups of at most `size`
/// characters, windowing any group that is still too long.
fn pack_pieces<'a>(
    block: &'a str,
    sep: &Separator,
    size: usize,
    overlap: usize,
    out: &mut Vec<&'a str>,
) {
    let joiner_len = char_len(sep.joiner);
    let mut group_start: Option<usize> = None;
    let mut group_end = 0;
    let mut group_len = 0;
    let mut cursor = 0;

    let mut pieces = block.split(sep.pattern).peekable();
    while let Some(raw) = pieces.next() {
        let piece_start = cursor;
        let is_last = pieces.peek().is_none();
        // The kept head of the separator stays attached to the piece.
        let piece_end = if is_last {
            piece_start + raw.len()
        } else {
            piece_start + raw.len() + sep.kept.len()
        };
        cursor = piece_start + raw.len() + sep.pattern.len();
        let piece_len = char_len(&block[piece_start..piece_end]);

        match group_start {
            None => {
                group_start = Some(piece_start);
                group_end = piece_end;
                group_len = piece_len;
            }
            Some(start) => {
                let candidate = group_len + joiner_len + piece_len;
                if candidate > size {
                    out.extend(fixed_windows(&block[start..group_end], size, overlap));
                    group_start = Some(piece_start);
                    group_end = piece_end;
                    group_len = piece_len;
                } else {
                    group_end = piece_end;
                    group_len = candidate;
                }
            }
        }
    }

    if let Some(start) = group_start {
        out.extend(fixed_windows(&block[start..group_end], size, overlap));
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Trim every fragment and drop the ones that are empty afterwards.
fn finalize(fragments: Vec<&str>) -> Vec<String> {
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| is_retained(f))
        .map(str::to_string)
        .collect()
}

/// Non-empty after trimming.
pub fn is_retained(fragment: &str) -> bool {
    !fragment.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_fixed_exact_boundaries() {
        let chunks = split_fixed("A. B. C.", 4, 0);
        assert_eq!(chunks, vec!["A. B", ". C."]);
    }

    #[test]
    fn test_fixed_empty_text() {
        assert!(split_fixed("", 100, 10).is_empty());
        assert!(split_recursive("", 100, 10).is_empty());
    }

    #[test]
    fn test_fixed_zero_size_returns_whole_text() {
        assert_eq!(split_fixed("  whole text  ", 0, 0), vec!["whole text"]);
    }

    #[test]
    fn test_fixed_overlap_property() {
        let text: String = (0..1000)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let size = 100;
        let overlap = 20;
        let windows = fixed_windows(&text, size, overlap);

        for (i, w) in windows.iter().enumerate() {
            if i + 1 < windows.len() {
                assert_eq!(w.chars().count(), size, "window {} is short", i);
                let tail: String = w.chars().skip(size - overlap).collect();
                let head: String = windows[i + 1].chars().take(overlap).collect();
                assert_eq!(tail, head, "overlap mismatch after window {}", i);
            } else {
                assert!(w.chars().count() <= size);
            }
        }

        // Dropping the repeated prefix of each window rebuilds the input.
        let mut rebuilt = windows[0].to_string();
        for w in &windows[1..] {
            rebuilt.extend(w.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_fixed_multibyte_text() {
        let text = "héllo wörld ñandú ☃☃☃ ünïcödé";
        let windows = fixed_windows(text, 5, 2);
        assert!(windows.iter().all(|w| w.chars().count() <= 5));
        assert!(windows[0].starts_with("héllo"));
        let chunks = split_fixed(text, 5, 2);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_fixed_drops_whitespace_only_windows() {
        let text = format!("abcd{}efgh", " ".repeat(8));
        let chunks = split_fixed(&text, 4, 0);
        assert_eq!(chunks, vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_recursive_small_text_single_chunk() {
        assert_eq!(
            split_recursive("  Hello, world!  ", 500, 50),
            vec!["Hello, world!"]
        );
    }

    #[test]
    fn test_recursive_packs_paragraphs() {
        let text = "Alpha beta.\n\nGamma delta.\n\nEpsilon zeta.";
        let chunks = split_recursive(text, 30, 0);
        assert_eq!(
            chunks,
            vec!["Alpha beta.\n\nGamma delta.", "Epsilon zeta."]
        );
    }

    #[test]
    fn test_recursive_sentences_keep_period() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = split_recursive(text, 20, 0);
        assert_eq!(
            chunks,
            vec!["One two three.", "Four five six.", "Seven eight nine."]
        );
    }

    #[test]
    fn test_recursive_irreducible_atom_emitted_whole() {
        let atom = "x".repeat(120);
        let chunks = split_recursive(&atom, 50, 10);
        assert_eq!(chunks, vec![atom]);
    }

    #[test]
    fn test_recursive_long_token_between_spaces_is_windowed() {
        let text = format!("short {} tail", "y".repeat(80));
        let chunks = split_recursive(&text, 50, 0);
        assert_eq!(
            chunks,
            vec![
                "short".to_string(),
                "y".repeat(50),
                "y".repeat(30),
                "tail".to_string()
            ]
        );
    }

    #[test]
    fn test_recursive_size_bound() {
        let text = (0..200)
            .map(|i| {
                if i % 17 == 0 {
                    format!("Paragraph {} ends here.\n\n", i)
                } else if i % 5 == 0 {
                    format!("Line {} with a supercalifragilisticexpialidocious word.\n", i)
                } else {
                    format!("Sentence number {} talks about chunking. ", i)
                }
            })
            .collect::<String>();

        for size in [50, 80, 200, 500] {
            for chunk in split_recursive(&text, size, 10) {
                if chunk.chars().count() > size {
                    assert!(
                        SEPARATORS.iter().all(|s| !chunk.contains(s.pattern)),
                        "oversized chunk has a usable separator: {:?}",
                        chunk
                    );
                }
            }
        }
    }

    #[test]
    fn test_recursive_lossless_modulo_whitespace() {
        let text = "# Title\n\nFirst paragraph. It has two sentences.\n\n\
                    Second paragraph line one.\nLine two is a bit longer than the rest of them. \
                    And a third sentence.\n\nfin";
        for size in [50, 64, 120] {
            let chunks = split_recursive(text, size, 0);
            assert_eq!(strip_ws(&chunks.concat()), strip_ws(text), "size {}", size);
        }
    }

    #[test]
    fn test_recursive_overlap_applies_inside_windowed_groups() {
        let text = format!("a {}", "z".repeat(100));
        let chunks = split_recursive(&text, 60, 10);
        assert_eq!(chunks[0], "a");
        assert_eq!(chunks[1].chars().count(), 60);
        assert_eq!(chunks[2].chars().count(), 50);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta gamma delta. Epsilon.\nZeta eta theta iota kappa lambda mu";
        for strategy in [ChunkingStrategy::Fixed, ChunkingStrategy::Recursive] {
            assert_eq!(split(text, strategy, 12, 3), split(text, strategy, 12, 3));
        }
    }

    #[test]
    fn test_no_empty_fragments() {
        let text = "\n\n\n\n   \n\nword\n\n\n\n   \n\n";
        for strategy in [ChunkingStrategy::Fixed, ChunkingStrategy::Recursive] {
            let chunks = split(text, strategy, 3, 0);
            assert!(chunks.iter().all(|c| is_retained(c) && c.trim() == c));
        }
    }
}
