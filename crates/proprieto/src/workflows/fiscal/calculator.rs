use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Serialize, Serializer};

use super::error::{EntityRef, FiscalError};
use crate::config::FiscalConfig;

/// Share of gross rental income kept after the flat 20% deemed-expense deduction.
pub const NET_INCOME_RATIO: Decimal = dec!(0.80);
pub const INCOME_TAX_RATE: Decimal = dec!(0.10);
pub const CASS_RATE: Decimal = dec!(0.10);

/// CASS bracket, expressed in multiples of the gross minimum wage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CassTier {
    Exempt,
    SixMinimumWages,
    TwelveMinimumWages,
    TwentyFourMinimumWages,
}

impl CassTier {
    /// Highest bracket first, the order thresholds are evaluated in.
    pub fn descending() -> [CassTier; 3] {
        [
            CassTier::TwentyFourMinimumWages,
            CassTier::TwelveMinimumWages,
            CassTier::SixMinimumWages,
        ]
    }

    pub fn level(self) -> u8 {
        match self {
            CassTier::Exempt => 0,
            CassTier::SixMinimumWages => 1,
            CassTier::TwelveMinimumWages => 2,
            CassTier::TwentyFourMinimumWages => 3,
        }
    }

    pub fn wage_multiple(self) -> Option<Decimal> {
        match self {
            CassTier::Exempt => None,
            CassTier::SixMinimumWages => Some(dec!(6)),
            CassTier::TwelveMinimumWages => Some(dec!(12)),
            CassTier::TwentyFourMinimumWages => Some(dec!(24)),
        }
    }
}

impl Serialize for CassTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

/// D212 figures for one taxpayer scope. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalResult {
    pub gross_income: Decimal,
    pub net_income: Decimal,
    pub income_tax: Decimal,
    pub cass: Decimal,
    pub cass_tier: CassTier,
    /// Income base the CASS was computed on; zero when exempt.
    pub cass_base: Decimal,
    pub explanation: String,
    pub total_tax: Decimal,
}

/// Income tax and CASS for rental income under the D212 rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalCalculator {
    minimum_wage_reference: Decimal,
}

impl FiscalCalculator {
    pub fn new(minimum_wage_reference: Decimal) -> Result<Self, FiscalError> {
        if minimum_wage_reference <= Decimal::ZERO {
            return Err(FiscalError::validation(
                EntityRef::Input("minimum_wage_reference"),
                format!("minimum wage must be positive, got {minimum_wage_reference}"),
            ));
        }
        Ok(Self {
            minimum_wage_reference,
        })
    }

    pub fn from_config(config: &FiscalConfig) -> Result<Self, FiscalError> {
        Self::new(config.minimum_wage_reference)
    }

    pub fn minimum_wage_reference(&self) -> Decimal {
        self.minimum_wage_reference
    }

    /// Threshold (RON) a bracket starts at; zero for `Exempt`.
    pub fn threshold(&self, tier: CassTier) -> Decimal {
        tier.wage_multiple()
            .map_or(Decimal::ZERO, |multiple| multiple * self.minimum_wage_reference)
    }

    pub fn tier_for(&self, net_income: Decimal) -> CassTier {
        CassTier::descending()
            .into_iter()
            .find(|tier| net_income >= self.threshold(*tier))
            .unwrap_or(CassTier::Exempt)
    }

    pub fn calculate(&self, gross_income: Decimal) -> Result<FiscalResult, FiscalError> {
        if gross_income < Decimal::ZERO {
            return Err(FiscalError::validation(
                EntityRef::Input("gross_income"),
                format!("gross income cannot be negative, got {gross_income}"),
            ));
        }

        let net_income = gross_income * NET_INCOME_RATIO;
        let income_tax = net_income * INCOME_TAX_RATE;
        let cass_tier = self.tier_for(net_income);
        let cass_base = self.threshold(cass_tier);
        let cass = cass_base * CASS_RATE;

        Ok(FiscalResult {
            gross_income,
            net_income,
            income_tax,
            cass,
            cass_tier,
            cass_base,
            explanation: self.explain(net_income, cass_tier),
            total_tax: income_tax + cass,
        })
    }

    fn explain(&self, net_income: Decimal, tier: CassTier) -> String {
        match tier.wage_multiple() {
            None => format!(
                "Net income {:.2} RON is below 6 minimum wages ({:.2} RON); no CASS is due.",
                net_income,
                self.threshold(CassTier::SixMinimumWages)
            ),
            Some(multiple) => format!(
                "Net income {:.2} RON reaches {} minimum wages; CASS is 10% of {:.2} RON (tier {}).",
                net_income,
                multiple,
                self.threshold(tier),
                tier.level()
            ),
        }
    }
}
