use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Citation { raw: String, numbers: Vec<u32> },
}

impl Segment {
    pub fn raw(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Citation { raw, .. } => raw,
        }
    }
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\d+(?:,\d+)*\]").unwrap_or_else(|_| Regex::new("^$").unwrap())
    })
}

/// Splits assistant text into text runs and citation markers such as `[1]`
/// or `[2,5]`. Concatenating every segment's `raw()` yields `text` again.
pub fn parse_markers(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pending = String::new();
    let mut cursor = 0;

    for found in marker_regex().find_iter(text) {
        pending.push_str(&text[cursor..found.start()]);
        cursor = found.end();

        match parse_numbers(found.as_str()) {
            Some(numbers) => {
                if !pending.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut pending)));
                }
                segments.push(Segment::Citation {
                    raw: found.as_str().to_string(),
                    numbers,
                });
            }
            None => pending.push_str(found.as_str()),
        }
    }

    pending.push_str(&text[cursor..]);
    if !pending.is_empty() {
        segments.push(Segment::Text(pending));
    }

    segments
}

fn parse_numbers(raw: &str) -> Option<Vec<u32>> {
    raw.trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|num| num.trim().parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Segment {
        Segment::Text(value.to_string())
    }

    fn citation(raw: &str, numbers: &[u32]) -> Segment {
        Segment::Citation {
            raw: raw.to_string(),
            numbers: numbers.to_vec(),
        }
    }

    fn reassemble(segments: &[Segment]) -> String {
        segments.iter().map(Segment::raw).collect()
    }

    #[test]
    fn splits_text_and_markers() {
        let segments = parse_markers("See [1,2] and [3].");
        assert_eq!(
            segments,
            vec![
                text("See "),
                citation("[1,2]", &[1, 2]),
                text(" and "),
                citation("[3]", &[3]),
                text("."),
            ]
        );
    }

    #[test]
    fn reassembles_every_input() {
        let inputs = [
            "",
            "plain text",
            "[1]",
            "[1][2]",
            "line one\nline two [4]\n\n[5,6] tail",
            "not a marker [a] [1, 2] [] [1,] [,1]",
            "nested [[3]] and unicode \u{00e6}\u{00f8}\u{00e5} [7]",
            "overflow [99999999999] stays text",
        ];
        for input in inputs {
            assert_eq!(reassemble(&parse_markers(input)), input, "input: {input:?}");
        }
    }

    #[test]
    fn whitespace_inside_brackets_is_not_a_marker() {
        let segments = parse_markers("see [1, 2]");
        assert_eq!(segments, vec![text("see [1, 2]")]);
    }

    #[test]
    fn newlines_are_kept_in_text() {
        let segments = parse_markers("a\nb [1]\nc");
        assert_eq!(
            segments,
            vec![text("a\nb "), citation("[1]", &[1]), text("\nc")]
        );
    }

    #[test]
    fn duplicate_and_zero_numbers_are_passed_through() {
        let segments = parse_markers("[0,3,3]");
        assert_eq!(segments, vec![citation("[0,3,3]", &[0, 3, 3])]);
    }

    #[test]
    fn oversized_numbers_merge_into_surrounding_text() {
        let segments = parse_markers("a [4294967296] b [2]");
        assert_eq!(
            segments,
            vec![text("a [4294967296] b "), citation("[2]", &[2])]
        );
    }
}
