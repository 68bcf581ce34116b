use serde::{Deserialize, Serialize};
use url::Url;

use super::DocumentKind;
use crate::error::FieldErrors;

const MAX_TEXT_LENGTH: usize = 255;
const MAX_LONG_TEXT_LENGTH: usize = 2000;
const MAX_RETURN_PERIOD_DAYS: u32 = 365;

/// Company and website details shared by every document kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetails {
    pub company_name: String,
    pub inn: String,
    pub ogrn: Option<String>,
    pub legal_address: Option<String>,
    pub contact_email: String,
    pub phone: Option<String>,
    pub website_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyForm {
    #[serde(flatten)]
    pub company: CompanyDetails,
    pub registrar: Option<String>,
    pub hosting_provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermsForm {
    #[serde(flatten)]
    pub company: CompanyDetails,
    pub jurisdiction_city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentForm {
    #[serde(flatten)]
    pub company: CompanyDetails,
    pub processing_purposes: Option<String>,
    pub third_parties: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferForm {
    #[serde(flatten)]
    pub company: CompanyDetails,
    pub subject: Option<String>,
    pub payment_terms: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieForm {
    #[serde(flatten)]
    pub company: CompanyDetails,
    pub analytics_services: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnForm {
    #[serde(flatten)]
    pub company: CompanyDetails,
    pub return_period_days: Option<u32>,
}

/// Validated input for exactly one document kind. Stored as the document's
/// `form_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocumentForm {
    Privacy(PrivacyForm),
    Terms(TermsForm),
    Consent(ConsentForm),
    Offer(OfferForm),
    Cookie(CookieForm),
    Return(ReturnForm),
}

impl DocumentForm {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentForm::Privacy(_) => DocumentKind::Privacy,
            DocumentForm::Terms(_) => DocumentKind::Terms,
            DocumentForm::Consent(_) => DocumentKind::Consent,
            DocumentForm::Offer(_) => DocumentKind::Offer,
            DocumentForm::Cookie(_) => DocumentKind::Cookie,
            DocumentForm::Return(_) => DocumentKind::Return,
        }
    }

    pub fn company(&self) -> &CompanyDetails {
        match self {
            DocumentForm::Privacy(form) => &form.company,
            DocumentForm::Terms(form) => &form.company,
            DocumentForm::Consent(form) => &form.company,
            DocumentForm::Offer(form) => &form.company,
            DocumentForm::Cookie(form) => &form.company,
            DocumentForm::Return(form) => &form.company,
        }
    }

    /// Flattens the form back into request fields, e.g. to merge a partial edit.
    pub fn to_fields(&self) -> FormFields {
        let company = self.company().clone();
        let mut fields = FormFields {
            company_name: Some(company.company_name),
            inn: Some(company.inn),
            ogrn: company.ogrn,
            legal_address: company.legal_address,
            contact_email: Some(company.contact_email),
            phone: company.phone,
            website_url: company.website_url,
            ..FormFields::default()
        };
        match self {
            DocumentForm::Privacy(form) => {
                fields.registrar = form.registrar.clone();
                fields.hosting_provider = form.hosting_provider.clone();
            }
            DocumentForm::Terms(form) => {
                fields.jurisdiction_city = form.jurisdiction_city.clone();
            }
            DocumentForm::Consent(form) => {
                fields.processing_purposes = form.processing_purposes.clone();
                fields.third_parties = form.third_parties.clone();
            }
            DocumentForm::Offer(form) => {
                fields.subject = form.subject.clone();
                fields.payment_terms = form.payment_terms.clone();
            }
            DocumentForm::Cookie(form) => {
                fields.analytics_services = form.analytics_services.clone();
            }
            DocumentForm::Return(form) => {
                fields.return_period_days = form.return_period_days;
            }
        }
        fields
    }
}

/// Raw form payload as submitted by the client. Every field is optional here;
/// [`FormFields::validate`] decides what each document kind needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormFields {
    pub company_name: Option<String>,
    pub inn: Option<String>,
    pub ogrn: Option<String>,
    pub legal_address: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub website_url: Option<String>,
    pub registrar: Option<String>,
    pub hosting_provider: Option<String>,
    pub jurisdiction_city: Option<String>,
    pub processing_purposes: Option<String>,
    pub third_parties: Option<String>,
    pub subject: Option<String>,
    pub payment_terms: Option<String>,
    pub analytics_services: Option<String>,
    pub return_period_days: Option<u32>,
}

impl FormFields {
    /// Fields present in `self` win; absent ones fall back to `base`. A blank
    /// string still wins, which is how an edit clears an optional value.
    pub fn overlay(self, base: FormFields) -> FormFields {
        FormFields {
            company_name: self.company_name.or(base.company_name),
            inn: self.inn.or(base.inn),
            ogrn: self.ogrn.or(base.ogrn),
            legal_address: self.legal_address.or(base.legal_address),
            contact_email: self.contact_email.or(base.contact_email),
            phone: self.phone.or(base.phone),
            website_url: self.website_url.or(base.website_url),
            registrar: self.registrar.or(base.registrar),
            hosting_provider: self.hosting_provider.or(base.hosting_provider),
            jurisdiction_city: self.jurisdiction_city.or(base.jurisdiction_city),
            processing_purposes: self.processing_purposes.or(base.processing_purposes),
            third_parties: self.third_parties.or(base.third_parties),
            subject: self.subject.or(base.subject),
            payment_terms: self.payment_terms.or(base.payment_terms),
            analytics_services: self.analytics_services.or(base.analytics_services),
            return_period_days: self.return_period_days.or(base.return_period_days),
        }
    }

    pub fn validate(&self, kind: DocumentKind) -> Result<DocumentForm, FieldErrors> {
        let mut errors = FieldErrors::new();

        let company_name = required(&mut errors, "companyName", &self.company_name);
        let inn = required(&mut errors, "inn", &self.inn);
        if let Some(inn) = inn.as_deref() {
            if !is_digits_of_len(inn, &[10, 12]) {
                errors.insert("inn".into(), "must contain 10 or 12 digits".into());
            }
        }
        let ogrn = optional(&mut errors, "ogrn", &self.ogrn, MAX_TEXT_LENGTH);
        if let Some(ogrn) = ogrn.as_deref() {
            if !is_digits_of_len(ogrn, &[13, 15]) {
                errors.insert("ogrn".into(), "must contain 13 or 15 digits".into());
            }
        }
        let contact_email = required(&mut errors, "contactEmail", &self.contact_email);
        if let Some(email) = contact_email.as_deref() {
            if !is_valid_email(email) {
                errors.insert("contactEmail".into(), "must be a valid email address".into());
            }
        }
        let phone = optional(&mut errors, "phone", &self.phone, MAX_TEXT_LENGTH);
        if let Some(phone) = phone.as_deref() {
            if !is_valid_phone(phone) {
                errors.insert("phone".into(), "must contain 10 to 15 digits".into());
            }
        }
        let website_url = if kind.requires_website() {
            required(&mut errors, "websiteUrl", &self.website_url)
        } else {
            optional(&mut errors, "websiteUrl", &self.website_url, MAX_TEXT_LENGTH)
        };
        if let Some(url) = website_url.as_deref() {
            if !is_valid_website(url) {
                errors.insert("websiteUrl".into(), "must be an http(s) URL".into());
            }
        }
        let legal_address = optional(
            &mut errors,
            "legalAddress",
            &self.legal_address,
            MAX_LONG_TEXT_LENGTH,
        );

        let form = match kind {
            DocumentKind::Privacy => {
                let registrar = optional(&mut errors, "registrar", &self.registrar, MAX_TEXT_LENGTH);
                let hosting_provider = optional(
                    &mut errors,
                    "hostingProvider",
                    &self.hosting_provider,
                    MAX_TEXT_LENGTH,
                );
                FormKindDetails::Privacy {
                    registrar,
                    hosting_provider,
                }
            }
            DocumentKind::Terms => FormKindDetails::Terms {
                jurisdiction_city: optional(
                    &mut errors,
                    "jurisdictionCity",
                    &self.jurisdiction_city,
                    MAX_TEXT_LENGTH,
                ),
            },
            DocumentKind::Consent => {
                let processing_purposes = optional(
                    &mut errors,
                    "processingPurposes",
                    &self.processing_purposes,
                    MAX_LONG_TEXT_LENGTH,
                );
                let third_parties = optional(
                    &mut errors,
                    "thirdParties",
                    &self.third_parties,
                    MAX_LONG_TEXT_LENGTH,
                );
                FormKindDetails::Consent {
                    processing_purposes,
                    third_parties,
                }
            }
            DocumentKind::Offer => {
                let subject = optional(&mut errors, "subject", &self.subject, MAX_LONG_TEXT_LENGTH);
                let payment_terms = optional(
                    &mut errors,
                    "paymentTerms",
                    &self.payment_terms,
                    MAX_LONG_TEXT_LENGTH,
                );
                FormKindDetails::Offer {
                    subject,
                    payment_terms,
                }
            }
            DocumentKind::Cookie => FormKindDetails::Cookie {
                analytics_services: optional(
                    &mut errors,
                    "analyticsServices",
                    &self.analytics_services,
                    MAX_TEXT_LENGTH,
                ),
            },
            DocumentKind::Return => {
                if let Some(days) = self.return_period_days {
                    if days == 0 || days > MAX_RETURN_PERIOD_DAYS {
                        errors.insert(
                            "returnPeriodDays".into(),
                            format!("must be between 1 and {MAX_RETURN_PERIOD_DAYS}"),
                        );
                    }
                }
                FormKindDetails::Return {
                    return_period_days: self.return_period_days,
                }
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        // Required fields are guaranteed present once `errors` is empty.
        let company = CompanyDetails {
            company_name: company_name.unwrap_or_default(),
            inn: inn.unwrap_or_default(),
            ogrn,
            legal_address,
            contact_email: contact_email.unwrap_or_default(),
            phone,
            website_url,
        };

        Ok(form.into_form(company))
    }
}

enum FormKindDetails {
    Privacy {
        registrar: Option<String>,
        hosting_provider: Option<String>,
    },
    Terms {
        jurisdiction_city: Option<String>,
    },
    Consent {
        processing_purposes: Option<String>,
        third_parties: Option<String>,
    },
    Offer {
        subject: Option<String>,
        payment_terms: Option<String>,
    },
    Cookie {
        analytics_services: Option<String>,
    },
    Return {
        return_period_days: Option<u32>,
    },
}

impl FormKindDetails {
    fn into_form(self, company: CompanyDetails) -> DocumentForm {
        match self {
            FormKindDetails::Privacy {
                registrar,
                hosting_provider,
            } => DocumentForm::Privacy(PrivacyForm {
                company,
                registrar,
                hosting_provider,
            }),
            FormKindDetails::Terms { jurisdiction_city } => DocumentForm::Terms(TermsForm {
                company,
                jurisdiction_city,
            }),
            FormKindDetails::Consent {
                processing_purposes,
                third_parties,
            } => DocumentForm::Consent(ConsentForm {
                company,
                processing_purposes,
                third_parties,
            }),
            FormKindDetails::Offer {
                subject,
                payment_terms,
            } => DocumentForm::Offer(OfferForm {
                company,
                subject,
                payment_terms,
            }),
            FormKindDetails::Cookie { analytics_services } => DocumentForm::Cookie(CookieForm {
                company,
                analytics_services,
            }),
            FormKindDetails::Return { return_period_days } => DocumentForm::Return(ReturnForm {
                company,
                return_period_days,
            }),
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<String> {
    let value = trimmed(value);
    match value {
        None => {
            errors.insert(field.to_string(), "is required".into());
            None
        }
        Some(v) if v.chars().count() > MAX_TEXT_LENGTH => {
            errors.insert(
                field.to_string(),
                format!("must be at most {MAX_TEXT_LENGTH} characters"),
            );
            None
        }
        Some(v) => Some(v),
    }
}

fn optional(
    errors: &mut FieldErrors,
    field: &str,
    value: &Option<String>,
    max_len: usize,
) -> Option<String> {
    let value = trimmed(value)?;
    if value.chars().count() > max_len {
        errors.insert(
            field.to_string(),
            format!("must be at most {max_len} characters"),
        );
        return None;
    }
    Some(value)
}

fn is_digits_of_len(value: &str, lengths: &[usize]) -> bool {
    value.chars().all(|c| c.is_ascii_digit()) && lengths.contains(&value.len())
}

pub(crate) fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn is_valid_phone(value: &str) -> bool {
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | '-' | ' ');
    if !value.chars().all(allowed) {
        return false;
    }
    let digits = value.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

fn is_valid_website(value: &str) -> bool {
    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("https://{value}")
    };
    match Url::parse(&candidate) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| host.contains('.'))
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn romashka() -> FormFields {
        FormFields {
            company_name: Some("ООО Ромашка".into()),
            inn: Some("1234567890".into()),
            contact_email: Some("info@romashka.ru".into()),
            website_url: Some("https://romashka.ru".into()),
            ..FormFields::default()
        }
    }

    #[test]
    fn minimal_privacy_form_is_valid() {
        let form = romashka().validate(DocumentKind::Privacy).expect("valid");
        assert_eq!(form.kind(), DocumentKind::Privacy);
        assert_eq!(form.company().company_name, "ООО Ромашка");
        assert_eq!(form.company().ogrn, None);
    }

    #[test]
    fn trims_and_drops_blank_optionals() {
        let fields = FormFields {
            company_name: Some("  ООО Ромашка  ".into()),
            phone: Some("   ".into()),
            ..romashka()
        };
        let form = fields.validate(DocumentKind::Terms).expect("valid");
        assert_eq!(form.company().company_name, "ООО Ромашка");
        assert_eq!(form.company().phone, None);
    }

    #[test]
    fn reports_every_missing_required_field() {
        let errors = FormFields::default()
            .validate(DocumentKind::Privacy)
            .expect_err("invalid");
        for field in ["companyName", "inn", "contactEmail", "websiteUrl"] {
            assert_eq!(errors.get(field).map(String::as_str), Some("is required"));
        }
    }

    #[test]
    fn website_is_optional_for_offer() {
        let fields = FormFields {
            website_url: None,
            ..romashka()
        };
        assert!(fields.validate(DocumentKind::Offer).is_ok());
        assert!(fields.validate(DocumentKind::Cookie).is_err());
    }

    #[test]
    fn rejects_malformed_identifiers() {
        let fields = FormFields {
            inn: Some("12345".into()),
            ogrn: Some("12ab".into()),
            contact_email: Some("not-an-email".into()),
            phone: Some("call me".into()),
            website_url: Some("ftp://romashka.ru".into()),
            ..romashka()
        };
        let errors = fields.validate(DocumentKind::Privacy).expect_err("invalid");
        assert!(errors.contains_key("inn"));
        assert!(errors.contains_key("ogrn"));
        assert!(errors.contains_key("contactEmail"));
        assert!(errors.contains_key("phone"));
        assert!(errors.contains_key("websiteUrl"));
    }

    #[test]
    fn accepts_twelve_digit_inn_and_bare_domain() {
        let fields = FormFields {
            inn: Some("123456789012".into()),
            ogrn: Some("1027700132195".into()),
            phone: Some("+7 (495) 123-45-67".into()),
            website_url: Some("romashka.ru".into()),
            ..romashka()
        };
        assert!(fields.validate(DocumentKind::Privacy).is_ok());
    }

    #[test]
    fn return_period_must_be_sensible() {
        let fields = FormFields {
            return_period_days: Some(0),
            ..romashka()
        };
        let errors = fields.validate(DocumentKind::Return).expect_err("invalid");
        assert!(errors.contains_key("returnPeriodDays"));
    }

    #[test]
    fn overlay_keeps_base_values_and_lets_blank_clear() {
        let base = FormFields {
            phone: Some("+7 495 123 45 67".into()),
            ..romashka()
        };
        let edit = FormFields {
            company_name: Some("ООО Лютик".into()),
            phone: Some(String::new()),
            ..FormFields::default()
        };
        let form = edit
            .overlay(base)
            .validate(DocumentKind::Privacy)
            .expect("valid");
        assert_eq!(form.company().company_name, "ООО Лютик");
        assert_eq!(form.company().inn, "1234567890");
        assert_eq!(form.company().phone, None);
    }

    #[test]
    fn stored_form_data_is_tagged_camel_case_json() {
        let form = FormFields {
            hosting_provider: Some("Timeweb".into()),
            ..romashka()
        }
        .validate(DocumentKind::Privacy)
        .expect("valid");

        let value = serde_json::to_value(&form).expect("serialize");
        assert_eq!(value["type"], "privacy");
        assert_eq!(value["companyName"], "ООО Ромашка");
        assert_eq!(value["hostingProvider"], "Timeweb");

        let restored: DocumentForm = serde_json::from_value(value).expect("deserialize");
        assert_eq!(restored, form);
        assert_eq!(restored.to_fields().hosting_provider.as_deref(), Some("Timeweb"));
    }
}
