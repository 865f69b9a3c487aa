//! Turns raw per-page extracted text into an ordered sequence of clauses.
//!
//! Policy PDFs extract as a stream of lines where headings, list markers, and
//! wrapped fragments are much shorter than full clause sentences. The
//! segmenter exploits that: lines shorter than [`MERGE_THRESHOLD`] characters
//! are treated as fragments and space-joined onto the clause being
//! accumulated, while longer lines flush the accumulator and start a new
//! clause. The pass is a pure function of its input, so identical input always
//! yields identical clauses.

/// Trimmed lines shorter than this many characters are merged into the
/// surrounding clause instead of starting their own.
pub const MERGE_THRESHOLD: usize = 40;

/// Segments per-page text into clauses, preserving document order.
///
/// Pages are concatenated in page order before line-splitting, so a clause
/// wrapped across a page break is reassembled.
pub fn segment_pages(pages: &[String]) -> Vec<String> {
    segment_lines(pages.join("\n").lines(), MERGE_THRESHOLD)
}

/// Segments a single block of text using the default threshold.
pub fn segment_text(text: &str) -> Vec<String> {
    segment_lines(text.lines(), MERGE_THRESHOLD)
}

/// Core accumulation pass over raw lines.
///
/// Blank lines are discarded. A short line (trimmed length strictly below
/// `threshold`) is appended to the accumulation buffer; a long line flushes
/// any buffered clause and becomes the start of the next one. Whatever
/// remains in the buffer at end of input is flushed as the final clause.
/// Every emitted clause is trimmed and non-empty.
pub fn segment_lines<'a, I>(lines: I, threshold: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut clauses = Vec::new();
    let mut buffer = String::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.chars().count() < threshold {
            if !buffer.is_empty() {
                buffer.push(' ');
            }
            buffer.push_str(line);
        } else {
            if !buffer.is_empty() {
                clauses.push(std::mem::take(&mut buffer));
            }
            buffer.push_str(line);
        }
    }

    if !buffer.is_empty() {
        clauses.push(buffer);
    }

    clauses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_clauses() {
        assert!(segment_text("").is_empty());
        assert!(segment_pages(&[]).is_empty());
        assert!(segment_text("\n\n   \n").is_empty());
    }

    #[test]
    fn short_lines_merge_into_a_single_clause() {
        let clauses = segment_text("Section 1\na\nb");
        assert_eq!(clauses, vec!["Section 1 a b".to_string()]);
    }

    #[test]
    fn long_line_flushes_buffered_fragments() {
        let long = "Section 2 sets out the full clause text in a single long line";
        assert!(long.chars().count() >= MERGE_THRESHOLD);

        let input = format!("Section 1\na\nb\n{long}");
        let clauses = segment_text(&input);
        assert_eq!(clauses, vec!["Section 1 a b".to_string(), long.to_string()]);
    }

    #[test]
    fn trailing_fragments_attach_to_preceding_clause() {
        let long = "Claims must be filed within thirty days of the treatment date";
        let clauses = segment_text(&format!("{long}\n(see appendix)"));
        assert_eq!(clauses, vec![format!("{long} (see appendix)")]);
    }

    #[test]
    fn clauses_reproduce_the_trimmed_non_blank_lines() {
        let input = "  alpha  \n\nbeta\nThis is a sufficiently long clause line for the test\ngamma\n";
        let clauses = segment_text(input);

        assert!(clauses.iter().all(|c| !c.is_empty()));
        assert!(clauses.iter().all(|c| c.trim() == c));

        let rejoined: Vec<&str> = clauses
            .iter()
            .flat_map(|c| c.split(' '))
            .filter(|w| !w.is_empty())
            .collect();
        let expected: Vec<&str> = input
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .flat_map(|l| l.split(' '))
            .filter(|w| !w.is_empty())
            .collect();
        assert_eq!(rejoined, expected);
    }

    #[test]
    fn page_breaks_do_not_split_clauses() {
        let pages = vec!["Section 1".to_string(), "subsection a".to_string()];
        assert_eq!(segment_pages(&pages), vec!["Section 1 subsection a".to_string()]);
    }

    #[test]
    fn determinism() {
        let input = "Section 1\na\nA sufficiently long line of clause text goes right here";
        assert_eq!(segment_text(input), segment_text(input));
    }
}
