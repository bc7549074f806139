//! Company onboarding record and its conditional rules.
//!
//! Steps: 1 company, 2 registered address, 3 Amazon DSP, 4 plan and billing,
//! 5 reminders.

use crate::domain::models::{Reminders, MAX_REMINDER_DAYS};
use crate::domain::plan::Plan;
use crate::domain::validation::{
    is_ca_business_number, is_ca_postal_code, is_present, is_us_tax_id, is_us_zip,
    is_valid_email, is_valid_phone, Rule, RuleSet, ValidationErrors,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const ONBOARDING_STEPS: u8 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Country {
    #[serde(rename = "US")]
    UnitedStates,
    #[serde(rename = "CA")]
    Canada,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state_province: String,
    #[serde(default)]
    pub zip_postal_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOnboarding {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub country: Option<Country>,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub registered_address: Address,
    #[serde(default)]
    pub is_amazon_dsp: bool,
    #[serde(default)]
    pub dsp_short_code: String,
    #[serde(default)]
    pub station_code: String,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub billing_email: String,
    #[serde(default)]
    pub cardholder_name: String,
    #[serde(default)]
    pub sms_consent: bool,
    #[serde(default)]
    pub reminders: Reminders,
}

impl CompanyOnboarding {
    fn is_us(&self) -> bool {
        self.country == Some(Country::UnitedStates)
    }

    fn is_canada(&self) -> bool {
        self.country == Some(Country::Canada)
    }

    fn on_paid_plan(&self) -> bool {
        self.plan.map(|p| p.is_paid()).unwrap_or(false)
    }
}

fn is_alnum_len(value: &str, min: usize, max: usize) -> bool {
    let v = value.trim();
    (min..=max).contains(&v.len()) && v.chars().all(|c| c.is_ascii_alphanumeric())
}

static SCHEMA: Lazy<RuleSet<CompanyOnboarding>> = Lazy::new(|| {
    RuleSet::new(vec![
        // company
        Rule::always(
            1,
            "companyName",
            |r: &CompanyOnboarding| is_present(&r.company_name),
            "Company name is required",
        ),
        Rule::always(
            1,
            "country",
            |r: &CompanyOnboarding| r.country.is_some(),
            "Please select a country",
        ),
        Rule::always(
            1,
            "contactEmail",
            |r: &CompanyOnboarding| is_present(&r.contact_email),
            "Email is required",
        ),
        Rule::always(
            1,
            "contactEmail",
            |r: &CompanyOnboarding| is_valid_email(&r.contact_email),
            "Please enter a valid email address",
        ),
        Rule::always(
            1,
            "phone",
            |r: &CompanyOnboarding| is_present(&r.phone),
            "Phone number is required",
        ),
        Rule::always(
            1,
            "phone",
            |r: &CompanyOnboarding| is_valid_phone(&r.phone),
            "Phone number must start with + and contain 11-17 digits",
        ),
        Rule::when(
            1,
            "taxId",
            |r: &CompanyOnboarding| r.is_us(),
            |r: &CompanyOnboarding| is_us_tax_id(&r.tax_id),
            "Tax ID must be in format XX-XXXXXXX",
        ),
        Rule::when(
            1,
            "taxId",
            |r: &CompanyOnboarding| r.is_canada(),
            |r: &CompanyOnboarding| is_ca_business_number(&r.tax_id),
            "Business number must be exactly 9 digits",
        ),
        // registered address
        Rule::always(
            2,
            "registeredAddress.street",
            |r: &CompanyOnboarding| is_present(&r.registered_address.street),
            "Street address is required",
        ),
        Rule::always(
            2,
            "registeredAddress.city",
            |r: &CompanyOnboarding| is_present(&r.registered_address.city),
            "City is required",
        ),
        Rule::always(
            2,
            "registeredAddress.stateProvince",
            |r: &CompanyOnboarding| is_present(&r.registered_address.state_province),
            "State/Province is required",
        ),
        Rule::always(
            2,
            "registeredAddress.zipPostalCode",
            |r: &CompanyOnboarding| is_present(&r.registered_address.zip_postal_code),
            "ZIP/Postal code is required",
        ),
        Rule::when(
            2,
            "registeredAddress.zipPostalCode",
            |r: &CompanyOnboarding| r.is_us(),
            |r: &CompanyOnboarding| is_us_zip(&r.registered_address.zip_postal_code),
            "ZIP code must be in format 12345 or 12345-6789",
        ),
        Rule::when(
            2,
            "registeredAddress.zipPostalCode",
            |r: &CompanyOnboarding| r.is_canada(),
            |r: &CompanyOnboarding| is_ca_postal_code(&r.registered_address.zip_postal_code),
            "Postal code must be in format A1A 1A1",
        ),
        // amazon dsp
        Rule::when(
            3,
            "dspShortCode",
            |r: &CompanyOnboarding| r.is_amazon_dsp,
            |r: &CompanyOnboarding| is_present(&r.dsp_short_code),
            "DSP short code is required for Amazon DSPs",
        ),
        Rule::when(
            3,
            "dspShortCode",
            |r: &CompanyOnboarding| r.is_amazon_dsp,
            |r: &CompanyOnboarding| is_alnum_len(&r.dsp_short_code, 2, 6),
            "DSP short code must be 2-6 letters or digits",
        ),
        Rule::when(
            3,
            "stationCode",
            |r: &CompanyOnboarding| r.is_amazon_dsp,
            |r: &CompanyOnboarding| is_present(&r.station_code),
            "Station code is required for Amazon DSPs",
        ),
        Rule::when(
            3,
            "stationCode",
            |r: &CompanyOnboarding| r.is_amazon_dsp,
            |r: &CompanyOnboarding| is_alnum_len(&r.station_code, 4, 4),
            "Station code must be 4 letters or digits",
        ),
        // plan and billing
        Rule::always(
            4,
            "plan",
            |r: &CompanyOnboarding| r.plan.is_some(),
            "Please select a plan",
        ),
        Rule::when(
            4,
            "billingEmail",
            |r: &CompanyOnboarding| r.on_paid_plan(),
            |r: &CompanyOnboarding| is_present(&r.billing_email),
            "Billing email is required for paid plans",
        ),
        Rule::when(
            4,
            "billingEmail",
            |r: &CompanyOnboarding| r.on_paid_plan(),
            |r: &CompanyOnboarding| is_valid_email(&r.billing_email),
            "Please enter a valid billing email",
        ),
        Rule::when(
            4,
            "cardholderName",
            |r: &CompanyOnboarding| r.on_paid_plan(),
            |r: &CompanyOnboarding| is_present(&r.cardholder_name),
            "Cardholder name is required for paid plans",
        ),
        // reminders
        Rule::when(
            5,
            "reminders.sms",
            |r: &CompanyOnboarding| r.reminders.sms,
            |r: &CompanyOnboarding| r.plan.map(|p| p.allows_sms()).unwrap_or(false),
            "SMS reminders are available on paid plans only",
        ),
        Rule::when(
            5,
            "smsConsent",
            |r: &CompanyOnboarding| r.reminders.sms,
            |r: &CompanyOnboarding| r.sms_consent,
            "SMS consent is required to enable SMS reminders",
        ),
        Rule::always(
            5,
            "reminders.days",
            |r: &CompanyOnboarding| r.reminders.days.len() <= MAX_REMINDER_DAYS,
            "You can select up to 3 reminder days",
        ),
        Rule::always(
            5,
            "reminders.days",
            |r: &CompanyOnboarding| r.reminders.days.iter().all(|d| (1..=365).contains(d)),
            "Reminder days must be between 1 and 365",
        ),
    ])
});

pub fn validate(record: &CompanyOnboarding) -> ValidationErrors {
    SCHEMA.validate(record)
}

pub fn validate_step(record: &CompanyOnboarding, step: u8) -> ValidationErrors {
    SCHEMA.validate_step(record, step)
}

/// Every step passes; the record can be submitted.
pub fn is_complete(record: &CompanyOnboarding) -> bool {
    SCHEMA.is_valid(record)
}

/// First step with a failing rule, if any.
pub fn first_invalid_step(record: &CompanyOnboarding) -> Option<u8> {
    SCHEMA
        .steps()
        .into_iter()
        .find(|step| !validate_step(record, *step).is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_us_company() -> CompanyOnboarding {
        CompanyOnboarding {
            company_name: "Rapid Routes LLC".to_string(),
            country: Some(Country::UnitedStates),
            tax_id: "12-3456789".to_string(),
            contact_email: "ops@rapidroutes.com".to_string(),
            phone: "+1 555 123 4567".to_string(),
            registered_address: Address {
                street: "100 Main St".to_string(),
                city: "Austin".to_string(),
                state_province: "TX".to_string(),
                zip_postal_code: "78701".to_string(),
            },
            plan: Some(Plan::Free),
            reminders: Reminders::default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let record = valid_us_company();
        assert!(validate(&record).is_empty());
        assert!(is_complete(&record));
        assert_eq!(first_invalid_step(&record), None);
    }

    #[test]
    fn test_tax_id_depends_on_country() {
        let mut record = valid_us_company();
        record.tax_id = "123456789".to_string();
        assert_eq!(
            validate_step(&record, 1).get("taxId"),
            Some("Tax ID must be in format XX-XXXXXXX")
        );

        record.country = Some(Country::Canada);
        record.registered_address.zip_postal_code = "K1A 0B1".to_string();
        assert!(validate(&record).is_empty());

        record.tax_id = "12-3456789".to_string();
        assert_eq!(
            validate(&record).get("taxId"),
            Some("Business number must be exactly 9 digits")
        );
    }

    #[test]
    fn test_nested_postal_code_path() {
        let mut record = valid_us_company();
        record.registered_address.zip_postal_code = "K1A 0B1".to_string();
        let errors = validate(&record);
        assert_eq!(
            errors.get("registeredAddress.zipPostalCode"),
            Some("ZIP code must be in format 12345 or 12345-6789")
        );
        assert!(!is_complete(&record));
        assert_eq!(first_invalid_step(&record), Some(2));
    }

    #[test]
    fn test_required_message_wins_over_format() {
        let mut record = valid_us_company();
        record.contact_email = String::new();
        assert_eq!(validate(&record).get("contactEmail"), Some("Email is required"));
    }

    #[test]
    fn test_dsp_fields_only_when_dsp() {
        let mut record = valid_us_company();
        assert!(validate_step(&record, 3).is_empty());

        record.is_amazon_dsp = true;
        let errors = validate_step(&record, 3);
        assert!(errors.contains("dspShortCode"));
        assert!(errors.contains("stationCode"));

        record.dsp_short_code = "RRLX".to_string();
        record.station_code = "DAU1".to_string();
        assert!(validate_step(&record, 3).is_empty());
    }

    #[test]
    fn test_billing_required_on_paid_plan() {
        let mut record = valid_us_company();
        record.plan = Some(Plan::Starter);
        let errors = validate_step(&record, 4);
        assert!(errors.contains("billingEmail"));
        assert!(errors.contains("cardholderName"));

        record.billing_email = "billing@rapidroutes.com".to_string();
        record.cardholder_name = "Dana Reyes".to_string();
        assert!(validate_step(&record, 4).is_empty());
    }

    #[test]
    fn test_sms_requires_paid_plan_and_consent() {
        let mut record = valid_us_company();
        record.reminders.sms = true;
        let errors = validate_step(&record, 5);
        assert_eq!(
            errors.get("reminders.sms"),
            Some("SMS reminders are available on paid plans only")
        );
        assert!(errors.contains("smsConsent"));

        record.plan = Some(Plan::Professional);
        record.sms_consent = true;
        assert!(validate_step(&record, 5).is_empty());
    }

    #[test]
    fn test_reminder_days_limit() {
        let mut record = valid_us_company();
        record.reminders.days = vec![30, 14, 7, 1];
        assert_eq!(
            validate_step(&record, 5).get("reminders.days"),
            Some("You can select up to 3 reminder days")
        );
    }

    #[test]
    fn test_deserialize_from_camel_case() {
        let json = serde_json::json!({
            "companyName": "North Haul",
            "country": "CA",
            "taxId": "123456789",
            "registeredAddress": { "zipPostalCode": "m5v3l9" },
            "isAmazonDsp": false
        });
        let record: CompanyOnboarding = serde_json::from_value(json).unwrap();
        assert_eq!(record.country, Some(Country::Canada));
        assert!(validate_step(&record, 2).get("registeredAddress.zipPostalCode").is_none());
    }
}
