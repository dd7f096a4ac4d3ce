use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Marital status options offered by the wizard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    #[default]
    Single,
    Married,
    Divorced,
    Widowed,
    RegisteredPartnership,
}

/// Billing details collected on the last wizard step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    #[serde(default)]
    pub billing_name: String,
    #[serde(default)]
    pub billing_street: String,
    #[serde(default)]
    pub billing_postal_code: String,
    #[serde(default)]
    pub billing_city: String,
    #[serde(default)]
    pub billing_email: String,
}

/// Flat record of every wizard field value.
///
/// Fields for steps the user has not visited yet hold their defaults, so a
/// persisted draft is always complete. Wire casing matches the backend
/// (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteForm {
    pub tax_year: i32,
    #[serde(default)]
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub incomes: u32,
    #[serde(default)]
    pub wealth_items: u32,
    #[serde(default)]
    pub properties: u32,
    #[serde(default)]
    pub new_properties: u32,
    #[serde(flatten)]
    pub billing: BillingDetails,
}

impl Default for QuoteForm {
    fn default() -> Self {
        Self {
            tax_year: default_tax_year(),
            marital_status: MaritalStatus::default(),
            children: 0,
            incomes: 0,
            wealth_items: 0,
            properties: 0,
            new_properties: 0,
            billing: BillingDetails::default(),
        }
    }
}

/// Declarations are filed for the previous calendar year
pub fn default_tax_year() -> i32 {
    chrono::Utc::now().year() - 1
}

/// Partial form update applied before a forward transition.
///
/// Only the fields present in the request are touched, the rest of the form
/// keeps its current values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteFormUpdate {
    pub tax_year: Option<i32>,
    pub marital_status: Option<MaritalStatus>,
    pub children: Option<u32>,
    pub incomes: Option<u32>,
    pub wealth_items: Option<u32>,
    pub properties: Option<u32>,
    pub new_properties: Option<u32>,
    pub billing_name: Option<String>,
    pub billing_street: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_city: Option<String>,
    pub billing_email: Option<String>,
}

impl QuoteForm {
    pub fn apply(&mut self, update: QuoteFormUpdate) {
        if let Some(v) = update.tax_year {
            self.tax_year = v;
        }
        if let Some(v) = update.marital_status {
            self.marital_status = v;
        }
        if let Some(v) = update.children {
            self.children = v;
        }
        if let Some(v) = update.incomes {
            self.incomes = v;
        }
        if let Some(v) = update.wealth_items {
            self.wealth_items = v;
        }
        if let Some(v) = update.properties {
            self.properties = v;
        }
        if let Some(v) = update.new_properties {
            self.new_properties = v;
        }
        if let Some(v) = update.billing_name {
            self.billing.billing_name = v;
        }
        if let Some(v) = update.billing_street {
            self.billing.billing_street = v;
        }
        if let Some(v) = update.billing_postal_code {
            self.billing.billing_postal_code = v;
        }
        if let Some(v) = update.billing_city {
            self.billing.billing_city = v;
        }
        if let Some(v) = update.billing_email {
            self.billing.billing_email = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_previous_tax_year() {
        let form = QuoteForm::default();
        assert_eq!(form.tax_year, chrono::Utc::now().year() - 1);
        assert_eq!(form.marital_status, MaritalStatus::Single);
        assert_eq!(form.properties, 0);
    }

    #[test]
    fn wire_casing_is_camel_case_and_flat() {
        let form = QuoteForm::default();
        let value = serde_json::to_value(&form).unwrap();
        assert!(value.get("taxYear").is_some());
        assert!(value.get("maritalStatus").is_some());
        // billing fields are flattened into the same record
        assert!(value.get("billingName").is_some());
        assert!(value.get("billing").is_none());
    }

    #[test]
    fn partial_update_leaves_other_fields_untouched() {
        let mut form = QuoteForm::default();
        form.children = 2;
        form.apply(QuoteFormUpdate {
            properties: Some(3),
            ..Default::default()
        });
        assert_eq!(form.properties, 3);
        assert_eq!(form.children, 2);
    }
}
