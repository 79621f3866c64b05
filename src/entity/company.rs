use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::{Address, AdviserRef, IdName, SectorRef};
use super::Archivable;

/// Company record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub reference_code: Option<String>,
    pub company_number: Option<String>,
    pub vat_number: Option<String>,
    pub duns_number: Option<String>,
    pub trading_names: Vec<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub business_type: Option<IdName>,
    pub sector: Option<SectorRef>,
    pub employee_range: Option<IdName>,
    pub turnover_range: Option<IdName>,
    pub export_experience_category: Option<IdName>,
    pub headquarter_type: Option<IdName>,
    pub uk_region: Option<IdName>,
    pub global_headquarters: Option<IdName>,
    pub account_manager: Option<AdviserRef>,
    pub registered_address: Address,
    pub trading_address: Address,
    pub export_to_countries: Vec<IdName>,
    pub future_interest_countries: Vec<IdName>,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_on: Option<DateTime<Utc>>,
    /// Bookkeeping only; never indexed.
    pub modified_by: Option<AdviserRef>,
    pub archivable: Archivable,
}

impl Company {
    /// Minimal company, everything optional left empty.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            reference_code: None,
            company_number: None,
            vat_number: None,
            duns_number: None,
            trading_names: Vec::new(),
            description: None,
            website: None,
            business_type: None,
            sector: None,
            employee_range: None,
            turnover_range: None,
            export_experience_category: None,
            headquarter_type: None,
            uk_region: None,
            global_headquarters: None,
            account_manager: None,
            registered_address: Address::default(),
            trading_address: Address::default(),
            export_to_countries: Vec::new(),
            future_interest_countries: Vec::new(),
            created_on: None,
            modified_on: None,
            modified_by: None,
            archivable: Archivable::default(),
        }
    }

    /// Country used for "where is this company" questions: trading address
    /// first, registered address otherwise.
    pub fn address_country(&self) -> Option<&IdName> {
        self.trading_address
            .country
            .as_ref()
            .or(self.registered_address.country.as_ref())
    }

    pub(crate) fn references(&self, relation: &str) -> Vec<Uuid> {
        match relation {
            "account_manager" => self.account_manager.iter().map(|a| a.id).collect(),
            "global_headquarters" => self.global_headquarters.iter().map(|c| c.id).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_country_prefers_trading() {
        let uk = IdName::new(Uuid::new_v4(), "United Kingdom");
        let us = IdName::new(Uuid::new_v4(), "United States");
        let mut company = Company::new(Uuid::new_v4(), "abc");
        company.registered_address.country = Some(us.clone());
        assert_eq!(company.address_country(), Some(&us));

        company.trading_address.country = Some(uk.clone());
        assert_eq!(company.address_country(), Some(&uk));
    }
}
