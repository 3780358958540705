//! Validation and coercion of raw extraction output.
//!
//! The extraction collaborator returns loosely typed JSON. Every candidate
//! is checked against its field's kind; a candidate that fails is dropped
//! on its own and never defaulted. Credit ratings and trade-in answers
//! that can't be read unambiguously are flagged so the next reply asks
//! about them again.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FieldRejection;

use super::model::{
    CarCondition, CarType, CreditRating, Field, FieldKind, FieldValue, NOT_APPLICABLE,
    TransactionType,
};

/// Untyped key→value pairs as returned by the extraction collaborator.
pub type RawCandidates = serde_json::Map<String, Value>;

/// Validated output of `normalize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedCandidates {
    /// Values that passed validation, ready for merging.
    pub values: Vec<(Field, FieldValue)>,
    /// Fields whose answer was ambiguous and must be asked again.
    pub needs_clarification: Vec<Field>,
    /// Candidates that were dropped, with the reason.
    pub rejected: Vec<(String, FieldRejection)>,
}

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9']+").expect("valid regex"));

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?|\.\d+)([kK])?$").expect("valid regex")
});

/// Answers that mean "nothing to record here".
///
/// These normalize to the sentinel, which merge never writes, so a field
/// answered this way stays unknown and is asked again.
const SEMANTIC_NEGATIVES: &[&str] = &[
    "no",
    "none",
    "i don't have any",
    "nothing",
    "no preference",
    "n/a",
    "na",
];

const TRADE_IN_YES: &[&str] = &["yes", "true", "y", "1", "have", "available"];
const TRADE_IN_NO: &[&str] = &["no", "false", "n", "0", "don't", "none", "not"];
/// Words that settle a yes even when a negative word also appears.
const EXPLICIT_YES: &[&str] = &["yes", "true", "y", "1"];
const HEDGES: &[&str] = &[
    "maybe",
    "not sure",
    "unsure",
    "perhaps",
    "possibly",
    "might",
    "don't know",
    "no idea",
];

/// Keyword table for credit ratings. Multi-word phrases come first so
/// "very good" is consumed before "good" is looked for.
const CREDIT_KEYWORDS: &[(&str, CreditRating)] = &[
    ("very good", CreditRating::VeryGood),
    ("very well", CreditRating::VeryGood),
    ("great", CreditRating::VeryGood),
    ("excellent", CreditRating::Excellent),
    ("perfect", CreditRating::Excellent),
    ("outstanding", CreditRating::Excellent),
    ("exceptional", CreditRating::Excellent),
    ("good", CreditRating::Good),
    ("okay", CreditRating::Good),
    ("ok", CreditRating::Good),
    ("fine", CreditRating::Good),
    ("fair", CreditRating::Fair),
    ("average", CreditRating::Fair),
    ("moderate", CreditRating::Fair),
    ("poor", CreditRating::Poor),
    ("bad", CreditRating::Poor),
    ("low", CreditRating::Poor),
];

const NEGATIONS: &[&str] = &["not", "isn't", "wasn't", "never"];

/// Alternate key spellings the model is known to produce.
const FIELD_ALIASES: &[(&str, Field)] = &[
    ("car_make", Field::Make),
    ("car_model", Field::Model),
    ("zip_code", Field::Zip),
    ("zipcode", Field::Zip),
];

/// Validate every candidate, dropping the ones that fail.
pub fn normalize(raw: &RawCandidates) -> NormalizedCandidates {
    let mut out = NormalizedCandidates::default();

    for (key, value) in raw {
        let Some(field) = resolve_field(key) else {
            debug!(key = %key, "Ignoring unknown extraction key");
            out.rejected.push((key.clone(), FieldRejection::UnknownField));
            continue;
        };

        match normalize_field(field, value) {
            Ok(Some(v)) => out.values.push((field, v)),
            Ok(None) => {}
            Err(rejection) => {
                warn!(field = %field, reason = %rejection, "Dropping extracted value");
                if needs_clarification(field, &rejection) && !out.needs_clarification.contains(&field)
                {
                    out.needs_clarification.push(field);
                }
                out.rejected.push((key.clone(), rejection));
            }
        }
    }
    out
}

fn resolve_field(key: &str) -> Option<Field> {
    let key = key.trim().to_ascii_lowercase();
    Field::from_name(&key).or_else(|| {
        FIELD_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, field)| *field)
    })
}

fn needs_clarification(field: Field, rejection: &FieldRejection) -> bool {
    match field {
        Field::CreditRating => matches!(
            rejection,
            FieldRejection::Ambiguous(_) | FieldRejection::Unrecognized(_)
        ),
        Field::HasTradeIn => matches!(rejection, FieldRejection::Ambiguous(_)),
        _ => false,
    }
}

/// Validate a single candidate.
///
/// `Ok(None)` means the model reported nothing for this field (JSON null).
pub fn normalize_field(field: Field, value: &Value) -> Result<Option<FieldValue>, FieldRejection> {
    if value.is_null() {
        return Ok(None);
    }

    let kind = field.kind();
    if kind != FieldKind::Boolean {
        if let Value::String(s) = value {
            if is_semantic_negative(s) {
                return Ok(Some(FieldValue::NotApplicable));
            }
        }
    }

    let normalized = match kind {
        FieldKind::Text => FieldValue::Text(as_text(value)?),
        FieldKind::Money => FieldValue::Number(parse_amount(&as_scalar_text(value)?)?),
        FieldKind::Mileage => {
            let text = as_scalar_text(value)?;
            FieldValue::Number(parse_amount(strip_mileage_units(&text))?)
        }
        FieldKind::Zip => FieldValue::Text(parse_zip(&as_scalar_text(value)?)?),
        FieldKind::Year => FieldValue::Text(parse_year(&as_scalar_text(value)?)?),
        FieldKind::CreditRating => FieldValue::Credit(parse_credit_rating(&as_scalar_text(value)?)?),
        FieldKind::CarCondition => {
            FieldValue::Condition(parse_car_condition(&as_scalar_text(value)?)?)
        }
        FieldKind::TransactionType => {
            FieldValue::Transaction(parse_transaction_type(&as_scalar_text(value)?)?)
        }
        FieldKind::CarType => FieldValue::Body(parse_car_type(&as_scalar_text(value)?)?),
        FieldKind::Boolean => match value {
            Value::Bool(b) => FieldValue::Flag(*b),
            _ => FieldValue::Flag(parse_yes_no(&as_scalar_text(value)?)?),
        },
    };
    Ok(Some(normalized))
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strings and numbers as text.
fn as_scalar_text(value: &Value) -> Result<String, FieldRejection> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(FieldRejection::WrongType {
            expected: "string or number",
            got: value_type(other),
        }),
    }
}

/// Free text. Lists of strings (e.g. desired features) are joined.
fn as_text(value: &Value) -> Result<String, FieldRejection> {
    let text = match value {
        Value::Array(items) => {
            let parts: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
            let parts = parts.ok_or(FieldRejection::WrongType {
                expected: "list of strings",
                got: "mixed array",
            })?;
            parts
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        }
        other => as_scalar_text(other)?,
    };
    if text.is_empty() {
        return Err(FieldRejection::Empty);
    }
    Ok(text)
}

fn is_semantic_negative(text: &str) -> bool {
    let cleaned = text
        .trim()
        .trim_end_matches(['.', '!'])
        .to_lowercase()
        .replace('\u{2019}', "'");
    cleaned == NOT_APPLICABLE.to_lowercase() || SEMANTIC_NEGATIVES.contains(&cleaned.as_str())
}

fn words(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    WORD.find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Words joined by single spaces and padded, for whole-phrase matching.
fn padded_words(text: &str) -> String {
    format!(" {} ", words(text).join(" "))
}

fn contains_phrase(padded: &str, phrase: &str) -> bool {
    padded.contains(&format!(" {phrase} "))
}

/// Parse a money or distance amount.
///
/// Currency symbols, thousands separators and whitespace are stripped; a
/// trailing `k` multiplies by 1000. Anything else left over rejects the
/// value.
pub fn parse_amount(text: &str) -> Result<f64, FieldRejection> {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',') && !c.is_whitespace())
        .collect();

    let caps = AMOUNT
        .captures(&stripped)
        .ok_or_else(|| FieldRejection::NotNumeric(text.to_string()))?;
    let base: f64 = caps[1]
        .parse()
        .map_err(|_| FieldRejection::NotNumeric(text.to_string()))?;
    let amount = if caps.get(2).is_some() {
        base * 1000.0
    } else {
        base
    };
    if !amount.is_finite() {
        return Err(FieldRejection::NotNumeric(text.to_string()));
    }
    Ok(amount)
}

fn strip_mileage_units(text: &str) -> &str {
    let lowered = text.to_ascii_lowercase();
    for unit in [
        "miles per year",
        "miles a year",
        "miles/year",
        "mi/yr",
        "miles",
        "mi",
    ] {
        if lowered.ends_with(unit) {
            return text[..text.len() - unit.len()].trim_end();
        }
    }
    text
}

fn parse_zip(text: &str) -> Result<String, FieldRejection> {
    if text.len() == 5 && text.chars().all(|c| c.is_ascii_digit()) {
        Ok(text.to_string())
    } else {
        Err(FieldRejection::InvalidZip(text.to_string()))
    }
}

fn parse_year(text: &str) -> Result<String, FieldRejection> {
    match text.parse::<u16>() {
        Ok(year) if (1900..=2025).contains(&year) => Ok(year.to_string()),
        _ => Err(FieldRejection::YearOutOfRange(text.to_string())),
    }
}

fn credit_band(score: u16) -> CreditRating {
    match score {
        800.. => CreditRating::Excellent,
        740..=799 => CreditRating::VeryGood,
        670..=739 => CreditRating::Good,
        580..=669 => CreditRating::Fair,
        _ => CreditRating::Poor,
    }
}

/// Map free text onto the five-point credit scale.
///
/// A bare score between 300 and 850 uses the usual bands. Otherwise the
/// text must name exactly one rating; negated, conflicting or unknown
/// descriptions are rejected so the customer can be asked again.
pub fn parse_credit_rating(text: &str) -> Result<CreditRating, FieldRejection> {
    if let Ok(score) = text.trim().parse::<u16>() {
        if (300..=850).contains(&score) {
            return Ok(credit_band(score));
        }
        return Err(FieldRejection::Unrecognized(text.to_string()));
    }

    let mut hay = padded_words(text);
    if NEGATIONS.iter().any(|n| contains_phrase(&hay, n)) {
        return Err(FieldRejection::Ambiguous(text.to_string()));
    }

    let mut matched: Vec<CreditRating> = Vec::new();
    for (phrase, rating) in CREDIT_KEYWORDS {
        let needle = format!(" {phrase} ");
        if hay.contains(&needle) {
            hay = hay.replace(&needle, " ");
            if !matched.contains(rating) {
                matched.push(*rating);
            }
        }
    }

    match matched.as_slice() {
        [rating] => Ok(*rating),
        [] => Err(FieldRejection::Unrecognized(text.to_string())),
        _ => Err(FieldRejection::Ambiguous(text.to_string())),
    }
}

/// Read a yes/no answer about a trade-in.
pub fn parse_yes_no(text: &str) -> Result<bool, FieldRejection> {
    let lowered = text.trim().to_lowercase().replace('\u{2019}', "'");
    if TRADE_IN_YES.contains(&lowered.as_str()) {
        return Ok(true);
    }
    if TRADE_IN_NO.contains(&lowered.as_str()) {
        return Ok(false);
    }

    let hay = padded_words(&lowered);
    if HEDGES.iter().any(|h| contains_phrase(&hay, h)) {
        return Err(FieldRejection::Ambiguous(text.to_string()));
    }

    let has = |set: &[&str]| set.iter().any(|w| contains_phrase(&hay, w));
    let negative = has(TRADE_IN_NO);
    let positive = has(TRADE_IN_YES);
    let explicit_yes = has(EXPLICIT_YES);

    match (positive, negative, explicit_yes) {
        (_, true, false) => Ok(false),
        (true, false, _) => Ok(true),
        _ => Err(FieldRejection::Ambiguous(text.to_string())),
    }
}

/// Pick the single option named in `text`, or reject.
fn pick_one<T: Copy + PartialEq>(
    text: &str,
    options: &[(&str, T)],
) -> Result<T, FieldRejection> {
    let hay = padded_words(&text.replace(['-', '_'], " "));
    let mut found: Vec<T> = Vec::new();
    for (phrase, value) in options {
        if contains_phrase(&hay, phrase) && !found.contains(value) {
            found.push(*value);
        }
    }
    match found.as_slice() {
        [one] => Ok(*one),
        [] => Err(FieldRejection::Unrecognized(text.to_string())),
        _ => Err(FieldRejection::Ambiguous(text.to_string())),
    }
}

pub fn parse_car_condition(text: &str) -> Result<CarCondition, FieldRejection> {
    pick_one(
        text,
        &[
            ("new", CarCondition::New),
            ("pre owned", CarCondition::PreOwned),
            ("preowned", CarCondition::PreOwned),
            ("used", CarCondition::PreOwned),
            ("second hand", CarCondition::PreOwned),
            ("secondhand", CarCondition::PreOwned),
        ],
    )
}

pub fn parse_transaction_type(text: &str) -> Result<TransactionType, FieldRejection> {
    pick_one(
        text,
        &[
            ("buy", TransactionType::Buy),
            ("buying", TransactionType::Buy),
            ("purchase", TransactionType::Buy),
            ("purchasing", TransactionType::Buy),
            ("lease", TransactionType::Lease),
            ("leasing", TransactionType::Lease),
        ],
    )
}

pub fn parse_car_type(text: &str) -> Result<CarType, FieldRejection> {
    pick_one(
        text,
        &[
            ("suv", CarType::Suv),
            ("crossover", CarType::Suv),
            ("sedan", CarType::Sedan),
            ("truck", CarType::Truck),
            ("pickup", CarType::Truck),
            ("van", CarType::Van),
            ("minivan", CarType::Van),
            ("coupe", CarType::Coupe),
        ],
    )
}
