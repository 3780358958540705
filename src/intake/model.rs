//! Customer record and the closed registry of fields it can hold.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IntakeError;

/// Wire form of the not-applicable sentinel.
pub const NOT_APPLICABLE: &str = "N/A";

/// Every attribute the assistant can collect.
///
/// Extraction output is keyed by these names; anything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Phone,
    Zip,
    MinBudget,
    MaxBudget,
    CreditRating,
    CarCondition,
    TransactionType,
    CarType,
    Make,
    Model,
    Year,
    MaxMileage,
    DesiredFeatures,
    HasTradeIn,
    PaymentMethod,
    MaxMonthlyPayment,
    MaxDownPayment,
    MaxFinanceTerm,
    LeaseTerm,
    AnnualMileage,
    LeaseDownPayment,
}

/// How raw extraction values for a field are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Money,
    Mileage,
    Zip,
    Year,
    CreditRating,
    CarCondition,
    TransactionType,
    CarType,
    Boolean,
}

impl Field {
    pub const ALL: [Field; 24] = [
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Phone,
        Field::Zip,
        Field::MinBudget,
        Field::MaxBudget,
        Field::CreditRating,
        Field::CarCondition,
        Field::TransactionType,
        Field::CarType,
        Field::Make,
        Field::Model,
        Field::Year,
        Field::MaxMileage,
        Field::DesiredFeatures,
        Field::HasTradeIn,
        Field::PaymentMethod,
        Field::MaxMonthlyPayment,
        Field::MaxDownPayment,
        Field::MaxFinanceTerm,
        Field::LeaseTerm,
        Field::AnnualMileage,
        Field::LeaseDownPayment,
    ];

    /// Buy-only fields, blanked to the sentinel on a lease.
    pub const BUY_ONLY: [Field; 4] = [
        Field::PaymentMethod,
        Field::MaxMonthlyPayment,
        Field::MaxDownPayment,
        Field::MaxFinanceTerm,
    ];

    /// Lease-only fields, blanked to the sentinel on a purchase.
    pub const LEASE_ONLY: [Field; 3] = [
        Field::LeaseTerm,
        Field::AnnualMileage,
        Field::LeaseDownPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Zip => "zip",
            Self::MinBudget => "min_budget",
            Self::MaxBudget => "max_budget",
            Self::CreditRating => "credit_rating",
            Self::CarCondition => "car_condition",
            Self::TransactionType => "transaction_type",
            Self::CarType => "car_type",
            Self::Make => "make",
            Self::Model => "model",
            Self::Year => "year",
            Self::MaxMileage => "max_mileage",
            Self::DesiredFeatures => "desired_features",
            Self::HasTradeIn => "has_trade_in",
            Self::PaymentMethod => "payment_method",
            Self::MaxMonthlyPayment => "max_monthly_payment",
            Self::MaxDownPayment => "max_down_payment",
            Self::MaxFinanceTerm => "max_finance_term",
            Self::LeaseTerm => "lease_term",
            Self::AnnualMileage => "annual_mileage",
            Self::LeaseDownPayment => "lease_down_payment",
        }
    }

    /// Look up a field by its wire name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Zip => FieldKind::Zip,
            Self::Year => FieldKind::Year,
            Self::MinBudget
            | Self::MaxBudget
            | Self::MaxMonthlyPayment
            | Self::MaxDownPayment
            | Self::LeaseDownPayment => FieldKind::Money,
            Self::MaxMileage | Self::AnnualMileage => FieldKind::Mileage,
            Self::CreditRating => FieldKind::CreditRating,
            Self::CarCondition => FieldKind::CarCondition,
            Self::TransactionType => FieldKind::TransactionType,
            Self::CarType => FieldKind::CarType,
            Self::HasTradeIn => FieldKind::Boolean,
            Self::FirstName
            | Self::LastName
            | Self::Email
            | Self::Phone
            | Self::Make
            | Self::Model
            | Self::DesiredFeatures
            | Self::PaymentMethod
            | Self::MaxFinanceTerm
            | Self::LeaseTerm => FieldKind::Text,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarCondition {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "pre-owned")]
    PreOwned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Lease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditRating {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarType {
    Suv,
    Sedan,
    Truck,
    Van,
    Coupe,
}

impl CarCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::PreOwned => "pre-owned",
        }
    }
}

impl std::fmt::Display for CarCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Lease => "lease",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CreditRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::VeryGood => "Very Good",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

impl std::fmt::Display for CreditRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suv => "suv",
            Self::Sedan => "sedan",
            Self::Truck => "truck",
            Self::Van => "van",
            Self::Coupe => "coupe",
        }
    }
}

impl std::fmt::Display for CarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical string form used for case-insensitive comparisons.
pub trait Canonical {
    fn canonical(&self) -> String;
}

impl Canonical for String {
    fn canonical(&self) -> String {
        self.trim().to_string()
    }
}

impl Canonical for f64 {
    fn canonical(&self) -> String {
        self.to_string()
    }
}

impl Canonical for bool {
    fn canonical(&self) -> String {
        self.to_string()
    }
}

impl Canonical for CarCondition {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

impl Canonical for TransactionType {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

impl Canonical for CreditRating {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

impl Canonical for CarType {
    fn canonical(&self) -> String {
        self.as_str().to_string()
    }
}

/// One slot of the customer record.
///
/// `Unknown` and `NotApplicable` are kept apart: an unknown slot still has
/// to be asked for, a not-applicable slot counts as filled but is never
/// reported as customer data.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Slot<T> {
    #[default]
    Unknown,
    NotApplicable,
    Value(T),
}

impl<T: Canonical> Slot<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Self::NotApplicable)
    }

    /// Unknown, or holding a value whose canonical form is empty.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Unknown => true,
            Self::NotApplicable => false,
            Self::Value(v) => v.canonical().is_empty(),
        }
    }

    /// Back to unknown if currently not-applicable; values are kept.
    fn clear_not_applicable(&mut self) {
        if self.is_not_applicable() {
            *self = Self::Unknown;
        }
    }

    pub fn canonical(&self) -> Option<String> {
        match self {
            Self::Unknown => None,
            Self::NotApplicable => Some(NOT_APPLICABLE.to_string()),
            Self::Value(v) => Some(v.canonical()),
        }
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_none(),
            Self::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
            Self::Value(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Slot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(Self::Unknown),
            serde_json::Value::String(s) if s == NOT_APPLICABLE => Ok(Self::NotApplicable),
            other => serde_json::from_value(other)
                .map(Self::Value)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// A validated value ready to be merged into a `CustomerRecord`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Credit(CreditRating),
    Condition(CarCondition),
    Transaction(TransactionType),
    Body(CarType),
    NotApplicable,
}

impl FieldValue {
    pub fn canonical(&self) -> String {
        match self {
            Self::Text(v) => v.canonical(),
            Self::Number(v) => v.canonical(),
            Self::Flag(v) => v.canonical(),
            Self::Credit(v) => v.canonical(),
            Self::Condition(v) => v.canonical(),
            Self::Transaction(v) => v.canonical(),
            Self::Body(v) => v.canonical(),
            Self::NotApplicable => NOT_APPLICABLE.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Flag(_) => "boolean",
            Self::Credit(_) => "credit rating",
            Self::Condition(_) => "car condition",
            Self::Transaction(_) => "transaction type",
            Self::Body(_) => "car type",
            Self::NotApplicable => "not-applicable",
        }
    }
}

/// Everything known about one customer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerRecord {
    pub first_name: Slot<String>,
    pub last_name: Slot<String>,
    pub email: Slot<String>,
    pub phone: Slot<String>,
    pub zip: Slot<String>,

    pub min_budget: Slot<f64>,
    pub max_budget: Slot<f64>,
    pub credit_rating: Slot<CreditRating>,

    pub car_condition: Slot<CarCondition>,
    pub transaction_type: Slot<TransactionType>,

    pub car_type: Slot<CarType>,
    pub make: Slot<String>,
    pub model: Slot<String>,
    pub year: Slot<String>,
    pub max_mileage: Slot<f64>,
    pub desired_features: Slot<String>,

    pub has_trade_in: Slot<bool>,

    pub payment_method: Slot<String>,
    pub max_monthly_payment: Slot<f64>,
    pub max_down_payment: Slot<f64>,
    pub max_finance_term: Slot<String>,

    pub lease_term: Slot<String>,
    pub annual_mileage: Slot<f64>,
    pub lease_down_payment: Slot<f64>,
}

enum SlotRef<'a> {
    Text(&'a Slot<String>),
    Number(&'a Slot<f64>),
    Flag(&'a Slot<bool>),
    Credit(&'a Slot<CreditRating>),
    Condition(&'a Slot<CarCondition>),
    Transaction(&'a Slot<TransactionType>),
    Body(&'a Slot<CarType>),
}

enum SlotMut<'a> {
    Text(&'a mut Slot<String>),
    Number(&'a mut Slot<f64>),
    Flag(&'a mut Slot<bool>),
    Credit(&'a mut Slot<CreditRating>),
    Condition(&'a mut Slot<CarCondition>),
    Transaction(&'a mut Slot<TransactionType>),
    Body(&'a mut Slot<CarType>),
}

impl SlotRef<'_> {
    fn is_missing(&self) -> bool {
        match self {
            Self::Text(s) => s.is_missing(),
            Self::Number(s) => s.is_missing(),
            Self::Flag(s) => s.is_missing(),
            Self::Credit(s) => s.is_missing(),
            Self::Condition(s) => s.is_missing(),
            Self::Transaction(s) => s.is_missing(),
            Self::Body(s) => s.is_missing(),
        }
    }

    fn is_not_applicable(&self) -> bool {
        match self {
            Self::Text(s) => s.is_not_applicable(),
            Self::Number(s) => s.is_not_applicable(),
            Self::Flag(s) => s.is_not_applicable(),
            Self::Credit(s) => s.is_not_applicable(),
            Self::Condition(s) => s.is_not_applicable(),
            Self::Transaction(s) => s.is_not_applicable(),
            Self::Body(s) => s.is_not_applicable(),
        }
    }

    fn canonical(&self) -> Option<String> {
        match self {
            Self::Text(s) => s.canonical(),
            Self::Number(s) => s.canonical(),
            Self::Flag(s) => s.canonical(),
            Self::Credit(s) => s.canonical(),
            Self::Condition(s) => s.canonical(),
            Self::Transaction(s) => s.canonical(),
            Self::Body(s) => s.canonical(),
        }
    }
}

impl SlotMut<'_> {
    fn mark_not_applicable(self) {
        match self {
            Self::Text(s) => *s = Slot::NotApplicable,
            Self::Number(s) => *s = Slot::NotApplicable,
            Self::Flag(s) => *s = Slot::NotApplicable,
            Self::Credit(s) => *s = Slot::NotApplicable,
            Self::Condition(s) => *s = Slot::NotApplicable,
            Self::Transaction(s) => *s = Slot::NotApplicable,
            Self::Body(s) => *s = Slot::NotApplicable,
        }
    }

    fn clear_not_applicable(self) {
        match self {
            Self::Text(s) => s.clear_not_applicable(),
            Self::Number(s) => s.clear_not_applicable(),
            Self::Flag(s) => s.clear_not_applicable(),
            Self::Credit(s) => s.clear_not_applicable(),
            Self::Condition(s) => s.clear_not_applicable(),
            Self::Transaction(s) => s.clear_not_applicable(),
            Self::Body(s) => s.clear_not_applicable(),
        }
    }
}

impl CustomerRecord {
    fn slot(&self, field: Field) -> SlotRef<'_> {
        match field {
            Field::FirstName => SlotRef::Text(&self.first_name),
            Field::LastName => SlotRef::Text(&self.last_name),
            Field::Email => SlotRef::Text(&self.email),
            Field::Phone => SlotRef::Text(&self.phone),
            Field::Zip => SlotRef::Text(&self.zip),
            Field::MinBudget => SlotRef::Number(&self.min_budget),
            Field::MaxBudget => SlotRef::Number(&self.max_budget),
            Field::CreditRating => SlotRef::Credit(&self.credit_rating),
            Field::CarCondition => SlotRef::Condition(&self.car_condition),
            Field::TransactionType => SlotRef::Transaction(&self.transaction_type),
            Field::CarType => SlotRef::Body(&self.car_type),
            Field::Make => SlotRef::Text(&self.make),
            Field::Model => SlotRef::Text(&self.model),
            Field::Year => SlotRef::Text(&self.year),
            Field::MaxMileage => SlotRef::Number(&self.max_mileage),
            Field::DesiredFeatures => SlotRef::Text(&self.desired_features),
            Field::HasTradeIn => SlotRef::Flag(&self.has_trade_in),
            Field::PaymentMethod => SlotRef::Text(&self.payment_method),
            Field::MaxMonthlyPayment => SlotRef::Number(&self.max_monthly_payment),
            Field::MaxDownPayment => SlotRef::Number(&self.max_down_payment),
            Field::MaxFinanceTerm => SlotRef::Text(&self.max_finance_term),
            Field::LeaseTerm => SlotRef::Text(&self.lease_term),
            Field::AnnualMileage => SlotRef::Number(&self.annual_mileage),
            Field::LeaseDownPayment => SlotRef::Number(&self.lease_down_payment),
        }
    }

    fn slot_mut(&mut self, field: Field) -> SlotMut<'_> {
        match field {
            Field::FirstName => SlotMut::Text(&mut self.first_name),
            Field::LastName => SlotMut::Text(&mut self.last_name),
            Field::Email => SlotMut::Text(&mut self.email),
            Field::Phone => SlotMut::Text(&mut self.phone),
            Field::Zip => SlotMut::Text(&mut self.zip),
            Field::MinBudget => SlotMut::Number(&mut self.min_budget),
            Field::MaxBudget => SlotMut::Number(&mut self.max_budget),
            Field::CreditRating => SlotMut::Credit(&mut self.credit_rating),
            Field::CarCondition => SlotMut::Condition(&mut self.car_condition),
            Field::TransactionType => SlotMut::Transaction(&mut self.transaction_type),
            Field::CarType => SlotMut::Body(&mut self.car_type),
            Field::Make => SlotMut::Text(&mut self.make),
            Field::Model => SlotMut::Text(&mut self.model),
            Field::Year => SlotMut::Text(&mut self.year),
            Field::MaxMileage => SlotMut::Number(&mut self.max_mileage),
            Field::DesiredFeatures => SlotMut::Text(&mut self.desired_features),
            Field::HasTradeIn => SlotMut::Flag(&mut self.has_trade_in),
            Field::PaymentMethod => SlotMut::Text(&mut self.payment_method),
            Field::MaxMonthlyPayment => SlotMut::Number(&mut self.max_monthly_payment),
            Field::MaxDownPayment => SlotMut::Number(&mut self.max_down_payment),
            Field::MaxFinanceTerm => SlotMut::Text(&mut self.max_finance_term),
            Field::LeaseTerm => SlotMut::Text(&mut self.lease_term),
            Field::AnnualMileage => SlotMut::Number(&mut self.annual_mileage),
            Field::LeaseDownPayment => SlotMut::Number(&mut self.lease_down_payment),
        }
    }

    /// Null or empty: still has to be collected.
    pub fn is_missing(&self, field: Field) -> bool {
        self.slot(field).is_missing()
    }

    pub fn is_not_applicable(&self, field: Field) -> bool {
        self.slot(field).is_not_applicable()
    }

    /// Canonical string form of the stored value; `None` when unknown.
    pub fn canonical(&self, field: Field) -> Option<String> {
        self.slot(field).canonical()
    }

    /// Store a validated value in its slot.
    ///
    /// The value's type must match the field's slot; the sentinel is
    /// rejected here and only set through `mark_not_applicable`.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<(), IntakeError> {
        let given = value.type_name();
        let mismatch = || IntakeError::FieldTypeMismatch { field, given };
        match (self.slot_mut(field), value) {
            (SlotMut::Text(s), FieldValue::Text(v)) => *s = Slot::Value(v),
            (SlotMut::Number(s), FieldValue::Number(v)) => *s = Slot::Value(v),
            (SlotMut::Flag(s), FieldValue::Flag(v)) => *s = Slot::Value(v),
            (SlotMut::Credit(s), FieldValue::Credit(v)) => *s = Slot::Value(v),
            (SlotMut::Condition(s), FieldValue::Condition(v)) => *s = Slot::Value(v),
            (SlotMut::Transaction(s), FieldValue::Transaction(v)) => *s = Slot::Value(v),
            (SlotMut::Body(s), FieldValue::Body(v)) => *s = Slot::Value(v),
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Force a field to the not-applicable sentinel.
    pub fn mark_not_applicable(&mut self, field: Field) {
        self.slot_mut(field).mark_not_applicable()
    }

    /// Turn a not-applicable field back into an unknown one. Real values are
    /// left alone.
    pub fn clear_not_applicable(&mut self, field: Field) {
        self.slot_mut(field).clear_not_applicable()
    }

    /// Fields holding real customer data, keyed by wire name.
    ///
    /// Unknown and not-applicable slots are left out.
    pub fn filled_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let full = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return serde_json::Map::new(),
        };
        Field::ALL
            .into_iter()
            .filter(|f| !self.is_missing(*f) && !self.is_not_applicable(*f))
            .filter_map(|f| {
                full.get(f.as_str())
                    .map(|v| (f.as_str().to_string(), v.clone()))
            })
            .collect()
    }
}
