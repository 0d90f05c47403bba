use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{DocumentRef, DocumentTable};

fn reference_group_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[DOC:[^\]]+\]").unwrap_or_else(|_| Regex::new("^$").unwrap()))
}

fn document_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"DOC:\d+").unwrap_or_else(|_| Regex::new("^$").unwrap()))
}

/// Rewrites `[DOC:x]` reference groups from the query service into
/// sequential `[n]` citations.
///
/// Documents are numbered from 1 in order of first citation; documents with
/// the same trimmed content and url share a number. The returned table is
/// keyed `DOC:<n-1>` so the client can resolve citation `n`.
pub fn format_response_with_sources(
    response: &str,
    docs: &DocumentTable,
) -> (String, DocumentTable) {
    let mut sentences = Vec::new();
    let mut groups = Vec::new();
    let mut cursor = 0;
    for found in reference_group_regex().find_iter(response) {
        sentences.push(&response[cursor..found.start()]);
        groups.push(found.as_str());
        cursor = found.end();
    }
    let tail = &response[cursor..];

    let mut first_by_source: HashMap<(&str, &str), &str> = HashMap::new();
    let mut canonical: HashMap<&str, &str> = HashMap::new();
    let mut ordered: Vec<&str> = Vec::new();
    for group in &groups {
        for found in document_id_regex().find_iter(group) {
            let doc_id = found.as_str();
            let Some(doc) = docs.get(doc_id) else {
                continue;
            };
            let source = (doc.content.trim(), doc.url.trim());
            let first = *first_by_source.entry(source).or_insert_with(|| {
                ordered.push(doc_id);
                doc_id
            });
            canonical.insert(doc_id, first);
        }
    }

    let numbers: HashMap<&str, usize> = ordered
        .iter()
        .enumerate()
        .map(|(index, doc_id)| (*doc_id, index + 1))
        .collect();

    let mut formatted = String::new();
    for (sentence, group) in sentences.iter().zip(&groups) {
        let cited: BTreeSet<usize> = document_id_regex()
            .find_iter(group)
            .filter_map(|found| canonical.get(found.as_str()))
            .filter_map(|doc_id| numbers.get(doc_id).copied())
            .collect();

        formatted.push_str(sentence.trim());
        if cited.is_empty() {
            formatted.push(' ');
        } else {
            let labels: Vec<String> = cited.iter().map(usize::to_string).collect();
            formatted.push_str(&format!(" [{}] ", labels.join(",")));
        }
    }
    formatted.push_str(tail.trim());

    let sources = ordered
        .iter()
        .filter_map(|doc_id| {
            let number = numbers.get(doc_id)?;
            let doc: &DocumentRef = docs.get(*doc_id)?;
            Some((format!("DOC:{}", number - 1), doc.clone()))
        })
        .collect();

    (formatted.trim().to_string(), sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &str, &str)]) -> DocumentTable {
        entries
            .iter()
            .map(|(id, content, url)| {
                (
                    id.to_string(),
                    DocumentRef {
                        content: content.to_string(),
                        url: url.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn renumbers_in_order_of_first_citation() {
        let docs = table(&[
            ("DOC:3", "third", "https://udi.no/3"),
            ("DOC:7", "seventh", "https://udi.no/7"),
        ]);
        let (text, sources) = format_response_with_sources(
            "You need a permit [DOC:7]. Apply online [DOC:3, DOC:7]. Done.",
            &docs,
        );

        assert_eq!(text, "You need a permit [1] . Apply online [1,2] . Done.");
        assert_eq!(sources["DOC:0"].content, "seventh");
        assert_eq!(sources["DOC:1"].content, "third");
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn identical_sources_share_a_number() {
        let docs = table(&[
            ("DOC:0", "same text ", "https://a.b/"),
            ("DOC:1", "same text", " https://a.b/"),
            ("DOC:2", "other", "https://c.d/"),
        ]);
        let (text, sources) =
            format_response_with_sources("One [DOC:1] two [DOC:0, DOC:2]", &docs);

        assert_eq!(text, "One [1] two [1,2]");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources["DOC:0"].content, "same text");
        assert_eq!(sources["DOC:1"].content, "other");
    }

    #[test]
    fn unknown_references_are_dropped() {
        let docs = table(&[("DOC:0", "known", "https://a.b/")]);
        let (text, sources) =
            format_response_with_sources("Lost [DOC:9]. Found [DOC:0].", &docs);

        assert_eq!(text, "Lost . Found [1] .");
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn citations_sort_numerically() {
        let docs: DocumentTable = (0..12)
            .map(|n| {
                (
                    format!("DOC:{n}"),
                    DocumentRef {
                        content: format!("doc {n}"),
                        url: format!("https://a.b/{n}"),
                    },
                )
            })
            .collect();
        let refs: Vec<String> = (0..12).map(|n| format!("DOC:{n}")).collect();
        let response = format!("Everything [{}] then [DOC:11, DOC:1]", refs.join(", "));
        let (text, _) = format_response_with_sources(&response, &docs);

        assert!(text.ends_with("then [2,12]"), "got {text}");
    }

    #[test]
    fn text_without_references_is_trimmed() {
        let (text, sources) =
            format_response_with_sources("  plain answer \n", &DocumentTable::new());
        assert_eq!(text, "plain answer");
        assert!(sources.is_empty());
    }
}
