//! Splits the normalized code text into numbered sections.
//!
//! A header is a section number (`302`, `402A`, `10-B`) followed by `". "`
//! and then an uppercase letter or `[`. The trailing-character check keeps
//! most in-sentence references ("under section 302 of this Code") from
//! opening a section, but it is a heuristic and misfires on some layouts.

use crate::error::IngestError;
use crate::models::Section;
use regex::Regex;

pub const SECTION_HEADER_PATTERN: &str = r"\b(\d{1,4}(?:[A-Z]{0,2}|-[A-Z]{1,2})?)\. ";

pub struct SectionSegmenter {
    header: Regex,
    min_body_chars: usize,
}

#[derive(Debug, Clone, Copy)]
struct HeaderMatch {
    start: usize,
    end: usize,
    id_end: usize,
}

impl SectionSegmenter {
    pub fn new(min_body_chars: usize) -> Result<Self, IngestError> {
        Ok(Self {
            header: Regex::new(SECTION_HEADER_PATTERN)?,
            min_body_chars,
        })
    }

    pub fn segment(&self, normalized: &str, start_page: u32) -> Vec<Section> {
        let headers = self.find_headers(normalized);
        let mut sections = Vec::new();

        for (ordinal, header) in headers.iter().enumerate() {
            let body_end = headers
                .get(ordinal + 1)
                .map(|next| next.start)
                .unwrap_or(normalized.len());
            let id = &normalized[header.start..header.id_end];
            let body = normalized[header.end..body_end].trim();

            if body.chars().count() < self.min_body_chars {
                continue;
            }

            sections.push(Section {
                id: id.to_string(),
                text: format!("{id}. {body}"),
                page_estimate: start_page.saturating_add(ordinal as u32),
            });
        }

        sections
    }

    /// Header positions in text order. A rejected candidate resumes the scan
    /// one byte past its start, as a lookahead-based splitter would.
    fn find_headers(&self, text: &str) -> Vec<HeaderMatch> {
        let mut found = Vec::new();
        let mut position = 0;

        while position <= text.len() {
            let Some(captures) = self.header.captures_at(text, position) else {
                break;
            };
            let (Some(whole), Some(id)) = (captures.get(0), captures.get(1)) else {
                break;
            };

            if opens_section(&text[whole.end()..]) {
                found.push(HeaderMatch {
                    start: whole.start(),
                    end: whole.end(),
                    id_end: id.end(),
                });
                position = whole.end();
            } else {
                // headers start with an ASCII digit, so start + 1 is a char boundary
                position = whole.start() + 1;
            }
        }

        found
    }
}

fn opens_section(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_some_and(|next| next.is_ascii_uppercase() || next == '[')
}

pub fn segment_sections(
    normalized: &str,
    start_page: u32,
    min_body_chars: usize,
) -> Result<Vec<Section>, IngestError> {
    Ok(SectionSegmenter::new(min_body_chars)?.segment(normalized, start_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> Vec<Section> {
        segment_sections(text, 21, 30).unwrap()
    }

    #[test]
    fn two_sections_are_split_with_headers_restated() {
        let text = "302. Whoever commits murder shall be punished with death or imprisonment for life. \
                    303. Punishment for abetment of the offence shall extend to ten years.";
        let sections = segment(text);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].id, "302");
        assert_eq!(
            sections[0].text,
            "302. Whoever commits murder shall be punished with death or imprisonment for life."
        );
        assert_eq!(sections[0].page_estimate, 21);
        assert_eq!(sections[1].id, "303");
        assert!(sections[1].text.starts_with("303. Punishment for abetment"));
        assert_eq!(sections[1].page_estimate, 22);
    }

    #[test]
    fn preamble_before_first_header_is_ignored() {
        let text = "CHAPTER XVI OF OFFENCES AFFECTING THE HUMAN BODY \
                    299. Definitions. In this Chapter, unless there is anything repugnant.";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "299");
        assert!(!sections[0].text.contains("CHAPTER"));
    }

    #[test]
    fn lettered_and_hyphenated_suffixes_are_ids() {
        let text = "402A. Hijacking. Whoever unlawfully seizes an aircraft is guilty of hijacking. \
                    10-B. Words referring to acts include illegal omissions in every part of this Code. \
                    364AB. [Kidnapping or abducting in order to murder shall be punished.]";
        let ids: Vec<_> = segment(text).into_iter().map(|section| section.id).collect();
        assert_eq!(ids, vec!["402A", "10-B", "364AB"]);
    }

    #[test]
    fn mid_sentence_references_do_not_open_sections() {
        let text = "304. Whoever is liable under section 302. of this Code for murder shall be punished \
                    as provided in s. 302 above and no further.";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "304");
        assert!(sections[0].text.contains("section 302. of this Code"));
    }

    #[test]
    fn short_bodies_are_discarded_as_noise() {
        let text = "Page 12. See below. 305. Whoever abets the commission of suicide by any child shall be punished.";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "305");
        // the skipped "12" header still advances the page estimate
        assert_eq!(sections[0].page_estimate, 22);
        for section in &sections {
            let body = section.text.splitn(2, ". ").nth(1).unwrap_or_default();
            assert!(body.chars().count() >= 30);
        }
    }

    #[test]
    fn missing_trailing_period_is_not_a_header() {
        let text = "306 Whoever abets suicide shall be punished with imprisonment for ten years.";
        assert!(segment(text).is_empty());
    }

    #[test]
    fn no_matches_yields_empty_collection() {
        assert!(segment("").is_empty());
        assert!(segment("plain prose without any numbered provisions at all").is_empty());
    }

    #[test]
    fn rejected_candidate_does_not_hide_following_header() {
        let text = "12. 3. Whoever does an act shall be punished according to this Code.";
        let sections = segment(text);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].id, "3");
    }

    #[test]
    fn section_text_round_trips_to_source_region() {
        let text = "CHAPTER I 1. Title and extent. This Act shall be called the Penal Code. \
                    2. Punishment of offences committed within the territory of the state.";
        for section in segment(text) {
            assert!(text.contains(&section.text), "{} not found in source", section.text);
        }
    }

    #[test]
    fn unicode_body_lengths_are_counted_in_characters() {
        let kept = format!("7. A{}", "é".repeat(29));
        assert_eq!(segment(&kept).len(), 1);

        let dropped = format!("8. B{}", "é".repeat(28));
        assert!(segment(&dropped).is_empty());
    }
}
