//! Write-once merge of validated candidates into the customer record.

use serde::Serialize;
use tracing::debug;

use crate::error::IntakeError;

use super::model::{CustomerRecord, Field, FieldValue};

/// A field that was filled in by a merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: Field,
    pub value: String,
}

/// Apply `candidates` to `record`.
///
/// A candidate is written only when its field is still missing and its
/// canonical value differs from what is stored (compared
/// case-insensitively). Fields that already hold a value are never
/// overwritten, and the not-applicable sentinel is never written here.
/// Applying the same candidates twice changes nothing the second time.
pub fn merge(
    record: &mut CustomerRecord,
    candidates: &[(Field, FieldValue)],
) -> Result<Vec<FieldChange>, IntakeError> {
    let mut changes = Vec::new();

    for (field, value) in candidates {
        if *value == FieldValue::NotApplicable {
            continue;
        }
        if !record.is_missing(*field) {
            continue;
        }

        let incoming = value.canonical();
        let unchanged = record
            .canonical(*field)
            .is_some_and(|current| current.eq_ignore_ascii_case(&incoming));
        if unchanged {
            continue;
        }

        record.set(*field, value.clone())?;
        debug!(field = %field, value = %incoming, "Field collected");
        changes.push(FieldChange {
            field: *field,
            value: incoming,
        });
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::model::{CreditRating, Slot};

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn fills_missing_fields() {
        let mut record = CustomerRecord::default();
        let changes = merge(
            &mut record,
            &[
                (Field::FirstName, text("Dana")),
                (Field::MaxBudget, FieldValue::Number(30000.0)),
            ],
        )
        .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(record.first_name, Slot::Value("Dana".into()));
        assert_eq!(record.max_budget, Slot::Value(30000.0));
    }

    #[test]
    fn existing_values_are_never_overwritten() {
        let mut record = CustomerRecord {
            first_name: Slot::Value("Dana".into()),
            ..Default::default()
        };
        let changes = merge(&mut record, &[(Field::FirstName, text("Dan"))]).unwrap();
        assert!(changes.is_empty());
        assert_eq!(record.first_name, Slot::Value("Dana".into()));
    }

    #[test]
    fn sentinel_candidates_are_ignored() {
        let mut record = CustomerRecord::default();
        let changes = merge(
            &mut record,
            &[(Field::DesiredFeatures, FieldValue::NotApplicable)],
        )
        .unwrap();
        assert!(changes.is_empty());
        assert_eq!(record.desired_features, Slot::Unknown);
    }

    #[test]
    fn sentinel_fields_are_not_filled() {
        let mut record = CustomerRecord {
            lease_term: Slot::NotApplicable,
            ..Default::default()
        };
        merge(&mut record, &[(Field::LeaseTerm, text("36 months"))]).unwrap();
        assert_eq!(record.lease_term, Slot::NotApplicable);
    }

    #[test]
    fn blank_values_can_be_filled() {
        let mut record = CustomerRecord {
            email: Slot::Value(String::new()),
            ..Default::default()
        };
        merge(&mut record, &[(Field::Email, text("dana@example.com"))]).unwrap();
        assert_eq!(record.email, Slot::Value("dana@example.com".into()));
    }

    #[test]
    fn merge_is_idempotent() {
        let candidates = [
            (Field::Email, text("dana@example.com")),
            (Field::CreditRating, FieldValue::Credit(CreditRating::Good)),
        ];
        let mut record = CustomerRecord::default();
        merge(&mut record, &candidates).unwrap();
        let once = record.clone();
        let changes = merge(&mut record, &candidates).unwrap();
        assert!(changes.is_empty());
        assert_eq!(record, once);
    }

    #[test]
    fn first_duplicate_wins() {
        let mut record = CustomerRecord::default();
        let changes = merge(
            &mut record,
            &[(Field::Make, text("Toyota")), (Field::Make, text("Honda"))],
        )
        .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(record.make, Slot::Value("Toyota".into()));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let mut record = CustomerRecord::default();
        assert!(merge(&mut record, &[(Field::Zip, FieldValue::Flag(true))]).is_err());
    }
}
