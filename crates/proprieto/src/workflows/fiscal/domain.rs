use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::{EntityRef, FiscalError};

/// Share every property is declared against; co-owner percentages must add up to it.
pub const FULL_OWNERSHIP: Decimal = dec!(100);

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Identifier wrapper for properties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// Identifier wrapper for owners (users holding a share in a property).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

/// Identifier wrapper for rental contracts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Romanian postal address split into the components ANAF forms ask for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    pub locality: String,
    pub county: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Address {
    /// Single-line rendering, e.g. `Str. Lalelelor nr. 4, Cluj-Napoca, jud. Cluj, 400001`.
    pub fn formatted(&self) -> String {
        let mut parts = Vec::new();

        match (non_blank(&self.street), non_blank(&self.number)) {
            (Some(street), Some(number)) => parts.push(format!("Str. {street} nr. {number}")),
            (Some(street), None) => parts.push(format!("Str. {street}")),
            (None, Some(number)) => parts.push(format!("nr. {number}")),
            (None, None) => {}
        }

        if !self.locality.trim().is_empty() {
            parts.push(self.locality.trim().to_string());
        }
        if !self.county.trim().is_empty() {
            parts.push(format!("jud. {}", self.county.trim()));
        }
        if let Some(code) = non_blank(&self.postal_code) {
            parts.push(code.to_string());
        }

        parts.join(", ")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Rental property as held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub address: Address,
    pub rooms: u16,
    #[serde(default = "full_ownership")]
    pub declared_ownership_total: Decimal,
}

fn full_ownership() -> Decimal {
    FULL_OWNERSHIP
}

/// Fields supplied when a property is first registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProperty {
    pub name: String,
    pub address: Address,
    pub rooms: u16,
}

/// Join row between a property and one of its owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyOwnership {
    pub property_id: PropertyId,
    pub owner_id: OwnerId,
    pub percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Ron,
    Eur,
    Usd,
}

impl Currency {
    /// Amounts in RON are reported to ANAF as-is; everything else needs a rate.
    pub fn is_foreign(self) -> bool {
        !matches!(self, Currency::Ron)
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::Ron => "RON",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    #[default]
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl PaymentFrequency {
    pub fn label(self) -> &'static str {
        match self {
            PaymentFrequency::Monthly => "monthly",
            PaymentFrequency::Quarterly => "quarterly",
            PaymentFrequency::Semiannual => "semiannual",
            PaymentFrequency::Annual => "annual",
        }
    }
}

/// Tenant identity and contact details. Identifier formats are checked upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Contract row exactly as the record store hands it over. Dates stay textual
/// until [`Contract::try_from`] validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: ContractId,
    pub property_id: PropertyId,
    pub tenant: Tenant,
    #[serde(default)]
    pub monthly_rent: Option<Decimal>,
    pub currency: Currency,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub deposit: Option<Decimal>,
}

impl ContractRecord {
    pub fn from_new(id: ContractId, contract: NewContract) -> Self {
        Self {
            id,
            property_id: contract.property_id,
            tenant: contract.tenant,
            monthly_rent: Some(contract.monthly_rent),
            currency: contract.currency,
            payment_frequency: contract.payment_frequency,
            start_date: Some(contract.start_date.format(DATE_FORMAT).to_string()),
            end_date: contract
                .end_date
                .map(|date| date.format(DATE_FORMAT).to_string()),
            document_ref: contract.document_ref,
            deposit: contract.deposit,
        }
    }
}

/// Contract fields accepted from owners and admins when registering a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContract {
    pub property_id: PropertyId,
    pub tenant: Tenant,
    pub monthly_rent: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub document_ref: Option<String>,
    #[serde(default)]
    pub deposit: Option<Decimal>,
}

/// Validated contract terms the income normalizer works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub id: ContractId,
    pub property_id: PropertyId,
    pub tenant: Tenant,
    pub monthly_rent: Decimal,
    pub currency: Currency,
    pub payment_frequency: PaymentFrequency,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl TryFrom<&ContractRecord> for Contract {
    type Error = FiscalError;

    fn try_from(record: &ContractRecord) -> Result<Self, Self::Error> {
        let entity = || EntityRef::Contract(record.id.clone());

        let start = match record.start_date.as_deref().map(str::trim) {
            None | Some("") => return Err(FiscalError::data(entity(), "start date is missing")),
            Some(raw) => parse_date(raw)
                .ok_or_else(|| FiscalError::data(entity(), format!("start date '{raw}' is not YYYY-MM-DD")))?,
        };

        let end = match record.end_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                parse_date(raw)
                    .ok_or_else(|| FiscalError::data(entity(), format!("end date '{raw}' is not YYYY-MM-DD")))?,
            ),
        };

        if let Some(end) = end {
            if end < start {
                return Err(FiscalError::data(
                    entity(),
                    format!("end date {end} precedes start date {start}"),
                ));
            }
        }

        let monthly_rent = record
            .monthly_rent
            .ok_or_else(|| FiscalError::data(entity(), "monthly rent is missing"))?;
        if monthly_rent < Decimal::ZERO {
            return Err(FiscalError::data(
                entity(),
                format!("monthly rent {monthly_rent} is negative"),
            ));
        }

        Ok(Self {
            id: record.id.clone(),
            property_id: record.property_id.clone(),
            tenant: record.tenant.clone(),
            monthly_rent,
            currency: record.currency,
            payment_frequency: record.payment_frequency,
            start,
            end,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// Calendar year income is measured against, `[Jan 1, Dec 31]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiscalYearWindow {
    year: i32,
    first_day: NaiveDate,
    last_day: NaiveDate,
}

impl FiscalYearWindow {
    pub fn new(year: i32) -> Result<Self, FiscalError> {
        let bounds = NaiveDate::from_ymd_opt(year, 1, 1).zip(NaiveDate::from_ymd_opt(year, 12, 31));
        match bounds {
            Some((first_day, last_day)) => Ok(Self {
                year,
                first_day,
                last_day,
            }),
            None => Err(FiscalError::validation(
                EntityRef::FiscalYear(year),
                "year is outside the supported calendar range",
            )),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last_day
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Owner,
    Admin,
}

/// Caller identity passed explicitly into every service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    pub user_id: OwnerId,
    pub role: Role,
}

impl AccessContext {
    pub fn owner(user_id: impl Into<String>) -> Self {
        Self {
            user_id: OwnerId(user_id.into()),
            role: Role::Owner,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: OwnerId(user_id.into()),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Which contracts a summary covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "owner_id", rename_all = "snake_case")]
pub enum SummaryScope {
    AllContracts,
    Owner(OwnerId),
}

impl SummaryScope {
    pub fn owner(&self) -> Option<&OwnerId> {
        match self {
            SummaryScope::AllContracts => None,
            SummaryScope::Owner(owner_id) => Some(owner_id),
        }
    }

    pub fn includes(&self, owner_id: &OwnerId) -> bool {
        match self {
            SummaryScope::AllContracts => true,
            SummaryScope::Owner(scoped) => scoped == owner_id,
        }
    }
}
