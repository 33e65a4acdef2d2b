use std::io;

use serde::Serialize;

use super::aggregator::ContractIncome;
use super::service::FiscalSummary;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write D212 rows: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush D212 rows: {0}")]
    Flush(#[from] io::Error),
    #[error("D212 export is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

const D212_HEADER: [&str; 12] = [
    "fiscal_year",
    "contract_id",
    "property",
    "address",
    "tenant",
    "tenant_tax_id",
    "owner_id",
    "share_percent",
    "currency",
    "monthly_rent",
    "active_months",
    "gross_income_ron",
];

/// One CSV line of the D212 rental income annex.
#[derive(Debug, Serialize)]
struct D212Row<'a> {
    fiscal_year: i32,
    contract_id: &'a str,
    property: &'a str,
    address: &'a str,
    tenant: &'a str,
    tenant_tax_id: &'a str,
    owner_id: &'a str,
    share_percent: String,
    currency: &'static str,
    monthly_rent: String,
    active_months: u32,
    gross_income_ron: String,
}

impl<'a> D212Row<'a> {
    fn new(fiscal_year: i32, line: &'a ContractIncome) -> Self {
        Self {
            fiscal_year,
            contract_id: &line.contract_id.0,
            property: &line.property_name,
            address: &line.property_address,
            tenant: &line.tenant_name,
            tenant_tax_id: line.tenant_tax_id.as_deref().unwrap_or_default(),
            owner_id: &line.owner_id.0,
            share_percent: format!("{:.2}", line.share_percent),
            currency: line.currency.code(),
            monthly_rent: format!("{:.2}", line.monthly_rent),
            active_months: line.active_months,
            gross_income_ron: format!("{:.2}", line.gross_income),
        }
    }
}

/// Header plus one row per breakdown line; totals stay in the JSON summary.
pub fn write_d212_csv<W: io::Write>(writer: W, summary: &FiscalSummary) -> Result<(), ExportError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(D212_HEADER)?;
    for line in &summary.breakdown {
        csv_writer.serialize(D212Row::new(summary.fiscal_year, line))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn d212_csv_string(summary: &FiscalSummary) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_d212_csv(&mut buffer, summary)?;
    Ok(String::from_utf8(buffer)?)
}
