use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::company::Company;
use super::metadata::{full_name, Address, AdviserRef, IdName};
use super::Archivable;

/// Company summary loaded with a contact. Carries the trading address so a
/// contact can inherit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: Uuid,
    pub name: String,
    pub trading_address: Address,
}

impl From<&Company> for CompanyRef {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            trading_address: company.trading_address.clone(),
        }
    }
}

/// Contact summary embedded in interactions and orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl ContactRef {
    pub fn name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

impl From<&Contact> for ContactRef {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id,
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
        }
    }
}

/// Contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub title: Option<IdName>,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub company: Option<CompanyRef>,
    pub adviser: Option<AdviserRef>,
    pub primary: bool,
    pub email: Option<String>,
    pub telephone_countrycode: Option<String>,
    pub telephone_number: Option<String>,
    pub address_same_as_company: bool,
    pub address: Address,
    pub notes: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_on: Option<DateTime<Utc>>,
    pub modified_by: Option<AdviserRef>,
    pub archivable: Archivable,
}

impl Contact {
    pub fn new(id: Uuid, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            title: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            job_title: None,
            company: None,
            adviser: None,
            primary: false,
            email: None,
            telephone_countrycode: None,
            telephone_number: None,
            address_same_as_company: false,
            address: Address::default(),
            notes: None,
            created_on: None,
            modified_on: None,
            modified_by: None,
            archivable: Archivable::default(),
        }
    }

    pub fn name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }

    /// The address to publish: the company's trading address when the
    /// contact is flagged as sharing it, otherwise the contact's own.
    pub fn effective_address(&self) -> &Address {
        match (&self.company, self.address_same_as_company) {
            (Some(company), true) => &company.trading_address,
            _ => &self.address,
        }
    }

    pub(crate) fn references(&self, relation: &str) -> Vec<Uuid> {
        match relation {
            "company" => self.company.iter().map(|c| c.id).collect(),
            "adviser" => self.adviser.iter().map(|a| a.id).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_address_falls_back_to_company() {
        let mut company = Company::new(Uuid::new_v4(), "Acme");
        company.trading_address.town = Some("Leeds".into());

        let mut contact = Contact::new(Uuid::new_v4(), "Ada", "Lovelace");
        contact.address.town = Some("London".into());
        contact.company = Some(CompanyRef::from(&company));
        assert_eq!(contact.effective_address().town.as_deref(), Some("London"));

        contact.address_same_as_company = true;
        assert_eq!(contact.effective_address().town.as_deref(), Some("Leeds"));
    }

    #[test]
    fn test_flag_without_company_keeps_own_address() {
        let mut contact = Contact::new(Uuid::new_v4(), "Ada", "Lovelace");
        contact.address.town = Some("London".into());
        contact.address_same_as_company = true;
        assert_eq!(contact.effective_address().town.as_deref(), Some("London"));
    }
}
