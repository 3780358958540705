//! Intake state machine. Tracks which phase the conversation is in.

use serde::{Deserialize, Serialize};

use crate::error::IntakeError;

use super::model::{CustomerRecord, Field};
use super::policy::RequirementTable;

/// The phases of the intake conversation.
///
/// Progresses linearly: PersonalInfo → Budget → CarSelection → CarDetails →
/// TradeIn → TransactionDetails. Finishing the last phase sets the
/// completion flag on `IntakeState`; there is no way back to an earlier
/// phase once it has been left.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IntakePhase {
    #[default]
    PersonalInfo,
    Budget,
    CarSelection,
    CarDetails,
    TradeIn,
    TransactionDetails,
}

impl IntakePhase {
    pub const ALL: [IntakePhase; 6] = [
        IntakePhase::PersonalInfo,
        IntakePhase::Budget,
        IntakePhase::CarSelection,
        IntakePhase::CarDetails,
        IntakePhase::TradeIn,
        IntakePhase::TransactionDetails,
    ];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: IntakePhase) -> bool {
        self.next() == Some(target)
    }

    /// Get the next phase in the linear progression, if any.
    pub fn next(&self) -> Option<IntakePhase> {
        use IntakePhase::*;
        match self {
            PersonalInfo => Some(Budget),
            Budget => Some(CarSelection),
            CarSelection => Some(CarDetails),
            CarDetails => Some(TradeIn),
            TradeIn => Some(TransactionDetails),
            TransactionDetails => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalInfo => "personal_info",
            Self::Budget => "budget",
            Self::CarSelection => "car_selection",
            Self::CarDetails => "car_details",
            Self::TradeIn => "trade_in",
            Self::TransactionDetails => "transaction_details",
        }
    }
}

impl std::fmt::Display for IntakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required fields of `phase` that are still null or empty, in table order.
///
/// Not-applicable fields count as filled.
pub fn missing_fields(
    record: &CustomerRecord,
    table: &RequirementTable,
    phase: IntakePhase,
) -> Vec<Field> {
    table
        .required(phase)
        .iter()
        .copied()
        .filter(|f| record.is_missing(*f))
        .collect()
}

/// Persisted progress through the intake phases.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntakeState {
    /// Current phase.
    pub phase: IntakePhase,
    /// Set once the final phase has no missing fields.
    pub all_information_collected: bool,
}

impl IntakeState {
    /// Move to the next phase. At the final phase this flips the completion
    /// flag instead and returns `None`.
    pub fn advance(&mut self) -> Option<IntakePhase> {
        match self.phase.next() {
            Some(next) => {
                debug_assert!(self.phase.can_transition_to(next));
                self.phase = next;
                Some(next)
            }
            None => {
                self.all_information_collected = true;
                None
            }
        }
    }

    /// Advance past every phase whose required fields are all present.
    ///
    /// Returns the phases entered, in order. Stops at the first phase with
    /// something missing, or at completion.
    pub fn advance_while_complete(
        &mut self,
        record: &CustomerRecord,
        table: &RequirementTable,
    ) -> Vec<IntakePhase> {
        let mut entered = Vec::new();
        while !self.all_information_collected && missing_fields(record, table, self.phase).is_empty()
        {
            match self.advance() {
                Some(next) => entered.push(next),
                None => break,
            }
        }
        entered
    }

    /// Check a caller-supplied state against the record it came with.
    ///
    /// Every phase before the current one must be fully answered, and a
    /// completed session must sit on the final phase with nothing missing.
    pub fn validate(
        &self,
        record: &CustomerRecord,
        table: &RequirementTable,
    ) -> Result<(), IntakeError> {
        for phase in IntakePhase::ALL.into_iter().filter(|p| *p < self.phase) {
            let missing = missing_fields(record, table, phase);
            if !missing.is_empty() {
                return Err(IntakeError::InvariantViolation(format!(
                    "phase {} is current but earlier phase {phase} is missing {}",
                    self.phase,
                    join_fields(&missing)
                )));
            }
        }

        if self.all_information_collected {
            if self.phase.next().is_some() {
                return Err(IntakeError::InvariantViolation(format!(
                    "marked complete while still in phase {}",
                    self.phase
                )));
            }
            let missing = missing_fields(record, table, self.phase);
            if !missing.is_empty() {
                return Err(IntakeError::InvariantViolation(format!(
                    "marked complete but missing {}",
                    join_fields(&missing)
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
