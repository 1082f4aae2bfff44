use crate::models::{RawPage, StyledRun};

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Italic runs opening with "Of " are chapter sub-headings ("Of Hijacking")
/// set between sections; kept in the stream they read as statutory text.
pub fn is_decorative_heading(run: &StyledRun) -> bool {
    run.italic && run.text.trim_start().to_lowercase().starts_with("of ")
}

/// Concatenates runs in document order, skipping blank runs and decorative
/// headings. Adjacent runs get a single space unless the earlier one already
/// ends in whitespace, which keeps `-\n` line ends intact for dehyphenation.
pub fn join_runs<'a, I>(runs: I) -> String
where
    I: IntoIterator<Item = &'a StyledRun>,
{
    let mut joined = String::new();
    for run in runs {
        if run.text.trim().is_empty() || is_decorative_heading(run) {
            continue;
        }
        if !joined.is_empty() && !joined.ends_with(char::is_whitespace) {
            joined.push(' ');
        }
        joined.push_str(&run.text);
    }
    joined
}

pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = text.replace("-\n", "");
    let text = text.replace('\n', " ");
    normalize_whitespace(&text)
}

pub fn normalize_pages(pages: &[RawPage]) -> String {
    clean_text(&join_runs(pages.iter().flat_map(|page| page.runs.iter())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(runs: Vec<StyledRun>) -> RawPage {
        RawPage { number: 22, runs }
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("A  \t  lot\nof\u{a0}  spacing "), "A lot of spacing");
    }

    #[test]
    fn hyphenated_line_breaks_rejoin_words() {
        assert_eq!(clean_text("culp-\nable homi-\r\ncide"), "culpable homicide");
    }

    #[test]
    fn line_breaks_collapse_to_single_spaces() {
        assert_eq!(clean_text("  first line\n\nsecond   line\n"), "first line second line");
    }

    #[test]
    fn italic_of_headings_are_dropped() {
        let pages = vec![page(vec![
            StyledRun::plain("301. Culpable homicide by causing death of person other than person whose death was intended.\n"),
            StyledRun::italic("Of Hijacking\n"),
            StyledRun::plain("302. Whoever commits qatl-i-amd shall be punished."),
        ])];

        let normalized = normalize_pages(&pages);
        assert!(!normalized.contains("Hijacking"));
        assert!(normalized.contains("intended. 302. Whoever"));
    }

    #[test]
    fn plain_runs_starting_with_of_are_kept() {
        let pages = vec![page(vec![
            StyledRun::plain("of the offence"),
            StyledRun::italic("offence"),
        ])];
        assert_eq!(normalize_pages(&pages), "of the offence offence");
    }

    #[test]
    fn runs_split_across_a_hyphenated_line_join() {
        let pages = vec![
            page(vec![StyledRun::plain("punish-\n")]),
            page(vec![StyledRun::plain("ment"), StyledRun::plain("of death")]),
        ];
        assert_eq!(normalize_pages(&pages), "punishment of death");
    }

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(normalize_pages(&[]), "");
        assert_eq!(normalize_pages(&[page(vec![StyledRun::plain("   ")])]), "");
    }
}
