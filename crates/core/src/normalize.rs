//! Description cleanup.
//!
//! Tariff PDFs render hierarchy depth as leading dashes and flag conditional
//! rates with a trailing `(+)`. [`normalize_description`] removes both at
//! extraction time; [`clean_for_index`] is the stricter pass applied before
//! embedding. Both are idempotent.

const FOOTNOTE_MARKER: &str = "(+)";
const TRAILING_PUNCTUATION: [char; 4] = ['.', ',', ';', ':'];

pub fn join_lines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Extraction-time pass: single line, no indentation dashes, no trailing
/// footnote marker.
pub fn normalize_description(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let joined = join_lines(raw);
    let mut text = joined
        .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .trim_end();

    while let Some(stripped) = text.strip_suffix(FOOTNOTE_MARKER) {
        text = stripped.trim_end();
    }

    text.trim().to_string()
}

/// Indexing-time pass: drops every footnote marker (with an optional
/// trailing dot) and trailing punctuation.
pub fn clean_for_index(text: &str) -> String {
    let mut cleaned = join_lines(text);

    while cleaned.contains(FOOTNOTE_MARKER) {
        cleaned = cleaned.replace("(+).", "").replace(FOOTNOTE_MARKER, "");
    }

    cleaned
        .trim()
        .trim_end_matches(|c: char| TRAILING_PUNCTUATION.contains(&c) || c.is_whitespace())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_dashes_and_newlines_are_removed() {
        let raw = "- - Pure-bred breeding\nanimals";
        assert_eq!(
            normalize_description(Some(raw)),
            "Pure-bred breeding animals"
        );
    }

    #[test]
    fn dash_runs_split_across_lines_are_removed() {
        assert_eq!(normalize_description(Some("-\n- - Other")), "Other");
        assert_eq!(normalize_description(Some("--- Mules")), "Mules");
    }

    #[test]
    fn trailing_footnote_marker_is_stripped() {
        assert_eq!(normalize_description(Some("Black tea (+)")), "Black tea");
        assert_eq!(normalize_description(Some("Black tea(+)  ")), "Black tea");
        assert_eq!(normalize_description(Some("Black tea (+) (+)")), "Black tea");
        assert_eq!(
            normalize_description(Some("Tea (+) in packets")),
            "Tea (+) in packets"
        );
    }

    #[test]
    fn absent_description_is_empty() {
        assert_eq!(normalize_description(None), "");
        assert_eq!(normalize_description(Some(" - ")), "");
        assert_eq!(normalize_description(Some("(+)")), "");
    }

    #[test]
    fn extraction_pass_keeps_inner_punctuation() {
        assert_eq!(
            normalize_description(Some("Live horses, asses, mules and hinnies.")),
            "Live horses, asses, mules and hinnies."
        );
    }

    #[test]
    fn index_pass_strips_markers_and_trailing_punctuation() {
        assert_eq!(clean_for_index("Live horses, asses, mules."), "Live horses, asses, mules");
        assert_eq!(clean_for_index("Green tea (+)."), "Green tea");
        assert_eq!(clean_for_index("Tea (+) in packets;"), "Tea  in packets");
        assert_eq!(clean_for_index("Other:\r\n"), "Other");
        assert_eq!(clean_for_index("Other .,"), "Other");
    }

    #[test]
    fn nested_markers_do_not_survive_the_index_pass() {
        assert_eq!(clean_for_index("Mate ((+)+)"), "Mate");
    }

    #[test]
    fn both_passes_are_idempotent() {
        let samples = [
            "",
            "   ",
            "- - Pure-bred breeding\nanimals (+)",
            "--\n-(+)",
            "Tea (+) in packets;.",
            "Mate ((+)+).",
            "Other, .:;",
            "- Fish, fresh or chilled (+). ",
            "Horses\r\n- Other (+)(+)",
        ];
        for sample in samples {
            let once = normalize_description(Some(sample));
            assert_eq!(normalize_description(Some(&once)), once, "sample {sample:?}");

            let cleaned = clean_for_index(sample);
            assert_eq!(clean_for_index(&cleaned), cleaned, "sample {sample:?}");
        }
    }
}
