//! Which fields each phase requires, and the buy/lease rules that decide
//! the transaction-details requirements.

use std::collections::BTreeMap;

use tracing::debug;

use super::model::{CarCondition, CustomerRecord, Field, Slot, TransactionType};
use super::state::IntakePhase;

/// Required fields per phase, in the order they should be asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementTable {
    phases: BTreeMap<IntakePhase, Vec<Field>>,
}

impl RequirementTable {
    /// The fixed requirements, with an empty transaction-details phase.
    pub fn base() -> Self {
        let phases = BTreeMap::from([
            (
                IntakePhase::PersonalInfo,
                vec![
                    Field::FirstName,
                    Field::LastName,
                    Field::Email,
                    Field::Phone,
                    Field::Zip,
                ],
            ),
            (
                IntakePhase::Budget,
                vec![Field::MinBudget, Field::MaxBudget, Field::CreditRating],
            ),
            (
                IntakePhase::CarSelection,
                vec![Field::CarCondition, Field::TransactionType],
            ),
            (
                IntakePhase::CarDetails,
                vec![
                    Field::CarType,
                    Field::Make,
                    Field::Model,
                    Field::Year,
                    Field::DesiredFeatures,
                ],
            ),
            (IntakePhase::TradeIn, vec![Field::HasTradeIn]),
            (IntakePhase::TransactionDetails, Vec::new()),
        ]);
        Self { phases }
    }

    pub fn required(&self, phase: IntakePhase) -> &[Field] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    fn set_transaction_details(&mut self, fields: &[Field]) {
        self.phases
            .insert(IntakePhase::TransactionDetails, fields.to_vec());
    }
}

impl Default for RequirementTable {
    fn default() -> Self {
        Self::base()
    }
}

/// Enforce the buy/lease rules on `record` and return the resulting table.
///
/// - A pre-owned car is always bought, so `transaction_type` becomes `buy`.
/// - On `buy` the lease-only fields are forced to the sentinel; on `lease`
///   the buy-only fields are. Fields of the active branch that still hold
///   the sentinel from an earlier branch are reopened as unknown.
/// - With no transaction type the transaction-details phase requires nothing.
///
/// Running it again on an unchanged record changes nothing.
pub fn recompute(record: &mut CustomerRecord) -> RequirementTable {
    if record.car_condition.value() == Some(&CarCondition::PreOwned)
        && record.transaction_type.value() != Some(&TransactionType::Buy)
    {
        debug!("pre-owned car, forcing transaction_type to buy");
        record.transaction_type = Slot::Value(TransactionType::Buy);
    }

    let mut table = RequirementTable::base();
    let (active, inactive): (&[Field], &[Field]) = match record.transaction_type.value() {
        Some(TransactionType::Buy) => (&Field::BUY_ONLY[..], &Field::LEASE_ONLY[..]),
        Some(TransactionType::Lease) => (&Field::LEASE_ONLY[..], &Field::BUY_ONLY[..]),
        None => return table,
    };

    for field in inactive {
        record.mark_not_applicable(*field);
    }
    for field in active {
        record.clear_not_applicable(*field);
    }
    table.set_transaction_details(active);
    table
}
