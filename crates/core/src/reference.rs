use regex::Regex;
use std::sync::OnceLock;

const SECTION_REF_PATTERN: &str = r"\b(?:section|sec|s\.?)\s*(\d+[a-zA-Z\-]*)";

fn section_ref_regex() -> Result<&'static Regex, regex::Error> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(regex) = PATTERN.get() {
        return Ok(regex);
    }
    let regex = Regex::new(SECTION_REF_PATTERN)?;
    Ok(PATTERN.get_or_init(|| regex))
}

pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// First explicit statutory reference in a question ("sec 302", "s.10-B"),
/// lower-cased. Stored ids are matched against it by substring, not equality.
pub fn parse_section_ref(question: &str) -> Result<Option<String>, regex::Error> {
    let normalized = normalize_question(question);
    Ok(section_ref_regex()?
        .captures(&normalized)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(question: &str) -> Option<String> {
        parse_section_ref(question).expect("section reference pattern compiles")
    }

    #[test]
    fn section_ref_pattern_compiles() {
        assert!(section_ref_regex().is_ok());
        assert_eq!(section_ref_regex().map(Regex::as_str).ok(), Some(SECTION_REF_PATTERN));
    }

    #[test]
    fn section_keyword_reference_is_parsed() {
        assert_eq!(
            parse("What is the punishment under Section 302?"),
            Some("302".to_string())
        );
    }

    #[test]
    fn abbreviations_are_recognised() {
        assert_eq!(parse("explain sec 420"), Some("420".to_string()));
        assert_eq!(parse("what does s. 375 say"), Some("375".to_string()));
        assert_eq!(parse("s.302"), Some("302".to_string()));
        assert_eq!(parse("s302"), Some("302".to_string()));
    }

    #[test]
    fn suffixes_are_captured_and_lowercased() {
        assert_eq!(parse("Is SECTION 402A bailable?"), Some("402a".to_string()));
        assert_eq!(parse("section 10-B"), Some("10-b".to_string()));
    }

    #[test]
    fn only_first_reference_is_used() {
        assert_eq!(
            parse("compare section 302 and section 304"),
            Some("302".to_string())
        );
    }

    #[test]
    fn questions_without_reference_yield_none() {
        assert_eq!(parse("What is the punishment for theft?"), None);
        assert_eq!(parse("how many cases in 2020"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn keyword_must_start_a_word() {
        // "crimes 302": the trailing s of "crimes" is not a keyword
        assert_eq!(parse("crimes 302"), None);
    }
}
