//! Rule-based named-entity recognizer for numeric spans.
//!
//! Labels money amounts, percentages, dates, ordinals and plain cardinals.
//! Patterns are tried in priority order and a span claimed by an earlier
//! label is never re-labelled, so `$10,000` is MONEY and never also CARDINAL.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    Money,
    Percent,
    Date,
    Ordinal,
    Cardinal,
}

/// A labelled span of the input. `start..end` are byte offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub label: EntityLabel,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Entity recognizer backend. Carried by the pipeline as `Arc<dyn EntityRecognizer>`.
pub trait EntityRecognizer: Send + Sync {
    /// Returns non-overlapping entities sorted by start offset.
    fn recognize(&self, text: &str) -> Vec<Entity>;
}

const NUMBER: &str = r"(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";
const SCALE: &str = r"(?:thousand|million|billion|trillion)";
const MONTH: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

struct Pattern {
    label: EntityLabel,
    regex: Regex,
    /// Capture group that delimits the entity (0 = whole match).
    group: usize,
}

/// Default recognizer. Compiled once at startup and shared read-only.
pub struct RuleBasedRecognizer {
    patterns: Vec<Pattern>,
}

impl RuleBasedRecognizer {
    pub fn new() -> Result<Self, regex::Error> {
        let specs: Vec<(EntityLabel, String, usize)> = vec![
            (
                EntityLabel::Money,
                format!(r"(?i)\$\s?{NUMBER}(?:\s+{SCALE}\b)?"),
                0,
            ),
            (
                EntityLabel::Money,
                format!(r"(?i)\b{NUMBER}(?:\s+{SCALE})?\s+(?:dollars|usd)\b"),
                0,
            ),
            (
                EntityLabel::Percent,
                format!(r"(?i)\b{NUMBER}(?:\s?%|\s+percent\b)"),
                0,
            ),
            (
                EntityLabel::Date,
                format!(
                    r"(?i)\b{MONTH}\.?\s+(?:\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?)\b"
                ),
                0,
            ),
            // Bare years, so "as of 2024" never reads as a count.
            (EntityLabel::Date, r"\b(?:19|20)\d{2}\b".to_string(), 0),
            (EntityLabel::Ordinal, r"(?i)\b\d+(?:st|nd|rd|th)\b".to_string(), 0),
            (
                EntityLabel::Cardinal,
                format!(r"(?i)\b{NUMBER}(?:\s+{SCALE})?\b"),
                0,
            ),
        ];

        let patterns = specs
            .into_iter()
            .map(|(label, pattern, group)| {
                Ok(Pattern {
                    label,
                    regex: Regex::new(&pattern)?,
                    group,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self { patterns })
    }
}

impl EntityRecognizer for RuleBasedRecognizer {
    fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(m) = caps.get(pattern.group) else {
                    continue;
                };
                let overlaps = entities
                    .iter()
                    .any(|e| m.start() < e.end && e.start < m.end());
                if overlaps {
                    continue;
                }
                entities.push(Entity {
                    label: pattern.label,
                    text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        entities.sort_by_key(|e| e.start);
        entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str) -> Vec<(EntityLabel, String)> {
        RuleBasedRecognizer::new()
            .unwrap()
            .recognize(text)
            .into_iter()
            .map(|e| (e.label, e.text))
            .collect()
    }

    #[test]
    fn test_dollar_amount_is_money() {
        assert_eq!(
            labels("The goal is $10,000."),
            vec![(EntityLabel::Money, "$10,000".to_string())]
        );
    }

    #[test]
    fn test_scale_word_included_in_money() {
        assert_eq!(
            labels("raising $2 million for schools"),
            vec![(EntityLabel::Money, "$2 million".to_string())]
        );
    }

    #[test]
    fn test_dollars_suffix_is_money() {
        assert_eq!(
            labels("about 5,000 dollars left"),
            vec![(EntityLabel::Money, "5,000 dollars".to_string())]
        );
    }

    #[test]
    fn test_plain_number_is_cardinal() {
        assert_eq!(
            labels("supported by 250 donors"),
            vec![(EntityLabel::Cardinal, "250".to_string())]
        );
    }

    #[test]
    fn test_percent_is_not_cardinal() {
        assert_eq!(
            labels("75% funded, 40 percent of donors"),
            vec![
                (EntityLabel::Percent, "75%".to_string()),
                (EntityLabel::Percent, "40 percent".to_string()),
            ]
        );
    }

    #[test]
    fn test_dates_and_ordinals_are_not_cardinal() {
        let found = labels("Founded in 2015, our 3rd drive ends March 31, 2025.");
        assert_eq!(
            found,
            vec![
                (EntityLabel::Date, "2015".to_string()),
                (EntityLabel::Ordinal, "3rd".to_string()),
                (EntityLabel::Date, "March 31, 2025".to_string()),
            ]
        );
    }

    #[test]
    fn test_bare_year_is_date() {
        assert_eq!(
            labels("318 donors have given as of 2024."),
            vec![
                (EntityLabel::Cardinal, "318".to_string()),
                (EntityLabel::Date, "2024".to_string()),
            ]
        );
    }

    #[test]
    fn test_year_range_is_date() {
        assert_eq!(
            labels("active 1998 to 2023"),
            vec![
                (EntityLabel::Date, "1998".to_string()),
                (EntityLabel::Date, "2023".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers_outside_year_range_stay_cardinal() {
        assert_eq!(
            labels("1850 and 2150 and 12,024"),
            vec![
                (EntityLabel::Cardinal, "1850".to_string()),
                (EntityLabel::Cardinal, "2150".to_string()),
                (EntityLabel::Cardinal, "12,024".to_string()),
            ]
        );
    }

    #[test]
    fn test_lowercase_month_date() {
        assert_eq!(
            labels("the drive ends march 31"),
            vec![(EntityLabel::Date, "march 31".to_string())]
        );
    }

    #[test]
    fn test_entities_sorted_and_non_overlapping() {
        let recognizer = RuleBasedRecognizer::new().unwrap();
        let text = "120 donors gave $3,400 toward a $5,000 goal";
        let entities = recognizer.recognize(text);
        let kinds: Vec<EntityLabel> = entities.iter().map(|e| e.label).collect();
        assert_eq!(
            kinds,
            vec![EntityLabel::Cardinal, EntityLabel::Money, EntityLabel::Money]
        );
        for pair in entities.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(&text[entities[1].start..entities[1].end], "$3,400");
    }

    #[test]
    fn test_no_numbers_no_entities() {
        assert!(labels("Help us build wells in rural villages.").is_empty());
    }

    #[test]
    fn test_digits_inside_words_ignored() {
        assert!(labels("COVID19 relief").is_empty());
    }
}
