//! Numeric extraction: turns the synthesized campaign description into
//! (goal, remaining, donors).
//!
//! Classification is keyword-gated over the WHOLE text, not the entity's
//! sentence: if "goal" appears anywhere, every money entity is read as the
//! goal; otherwise, if "remaining" appears anywhere, as the remaining funds.
//! Later entities overwrite earlier ones. See DESIGN.md, open question 1.

pub mod ner;

use thiserror::Error;

use crate::extraction::ner::{EntityLabel, EntityRecognizer};

const MILLION: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("invalid number '{0}' in extracted amount")]
    InvalidNumber(String),

    #[error("extracted amount '{0}' is out of range")]
    Overflow(String),
}

/// Fundraising figures recovered from free text. Zero means "not found".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub goal: u64,
    pub remaining: u64,
    pub donors: u64,
}

pub fn extract_numbers(
    text: &str,
    recognizer: &dyn EntityRecognizer,
) -> Result<ExtractionResult, ExtractionError> {
    let lowered = text.to_lowercase();
    let mentions_goal = lowered.contains("goal");
    let mentions_remaining = lowered.contains("remaining");
    let mentions_donors = lowered.contains("donors");

    let mut result = ExtractionResult::default();

    for entity in recognizer.recognize(text) {
        match entity.label {
            EntityLabel::Money if mentions_goal => {
                let multiplier = if entity.text.contains("million") {
                    MILLION
                } else {
                    1
                };
                result.goal = parse_money(&entity.text)?
                    .checked_mul(multiplier)
                    .ok_or_else(|| ExtractionError::Overflow(entity.text.clone()))?;
            }
            EntityLabel::Money if mentions_remaining => {
                result.remaining = parse_money(&entity.text)?;
            }
            EntityLabel::Cardinal if mentions_donors => {
                result.donors = parse_integer(&entity.text.replace(',', ""))?;
            }
            _ => {}
        }
    }

    Ok(result)
}

/// `"$2 million"` → 2, `"$10,000"` → 10000. Scale words are left to the caller.
fn parse_money(text: &str) -> Result<u64, ExtractionError> {
    let cleaned = text.replace([',', '$'], "");
    let first = cleaned
        .split_whitespace()
        .next()
        .ok_or_else(|| ExtractionError::InvalidNumber(text.to_string()))?;
    parse_integer(first)
}

fn parse_integer(token: &str) -> Result<u64, ExtractionError> {
    let token = token.trim();
    token.parse::<u64>().map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow => ExtractionError::Overflow(token.to_string()),
        _ => ExtractionError::InvalidNumber(token.to_string()),
    })
}
