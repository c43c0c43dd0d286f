//! Static notification template catalog.
//!
//! One subject/body pair per (event type, language), with English as the
//! fallback row. Rendering is a pure function of its inputs: no I/O, no
//! stored templates, no user-supplied template code.

use crate::notification::EventType;

use super::substitution::substitute_string;
use super::types::{Language, RenderedMessage, TemplateError, TemplateResult};

/// Context keys an event type's templates require.
///
/// A submission missing one of these renders nothing and fails
/// permanently; extra keys are ignored.
pub fn required_keys(event_type: EventType) -> &'static [&'static str] {
    match event_type {
        EventType::PaymentSuccess | EventType::PaymentFailed => {
            &["property_title", "location", "amount"]
        }
        EventType::ListingApproved => &["property_title", "location"],
        EventType::TenantUpdate => &["property_title", "tenant_name"],
    }
}

fn subject_template(event_type: EventType, language: Language) -> &'static str {
    match (event_type, language) {
        (EventType::PaymentSuccess, Language::En) => "Payment Successful",
        (EventType::PaymentSuccess, Language::Am) => "ክፍያ ተሳክቷል",
        (EventType::PaymentSuccess, Language::Om) => "Kaffaltiin Milkaa'eera",
        (EventType::PaymentFailed, Language::En) => "Payment Failed",
        (EventType::PaymentFailed, Language::Am) => "ክፍያ አልተሳካም",
        (EventType::PaymentFailed, Language::Om) => "Kaffaltiin Hin Milkoofne",
        (EventType::ListingApproved, Language::En) => "Listing Approved",
        (EventType::ListingApproved, Language::Am) => "ዝርዝር ጸድቋል",
        (EventType::ListingApproved, Language::Om) => "Tarreen Mirkanoofte",
        (EventType::TenantUpdate, Language::En) => "Tenant Update",
        (EventType::TenantUpdate, Language::Am) => "የተከራይ ማሻሻያ",
        (EventType::TenantUpdate, Language::Om) => "Odeeffannoo Kirreessaa",
    }
}

fn body_template(event_type: EventType, language: Language) -> &'static str {
    match (event_type, language) {
        (EventType::PaymentSuccess, Language::En) => {
            "Your payment for '{{property_title}}' in {{location}} of {{amount}} ETB was successful. Thank you!"
        }
        (EventType::PaymentSuccess, Language::Am) => {
            "ክፍያዎ ለ'{{property_title}}' በ{{location}} {{amount}} ብር ተሳክቷል። እናመሰግናለን!"
        }
        (EventType::PaymentSuccess, Language::Om) => {
            "Kaffaltiin keessan '{{property_title}}' {{location}} keessatti {{amount}} qarshii milkaa'eera. Galatoomaa!"
        }
        (EventType::PaymentFailed, Language::En) => {
            "Your payment for '{{property_title}}' in {{location}} of {{amount}} ETB failed. Please try again."
        }
        (EventType::PaymentFailed, Language::Am) => {
            "ክፍያዎ ለ'{{property_title}}' በ{{location}} {{amount}} ብር አልተሳካም። እባክዎ እንደገና ይሞክሩ።"
        }
        (EventType::PaymentFailed, Language::Om) => {
            "Kaffaltiin keessan '{{property_title}}' {{location}} keessatti {{amount}} qarshii hin milkoofne. Irra deebi'aa yaalaa."
        }
        (EventType::ListingApproved, Language::En) => {
            "Your listing '{{property_title}}' in {{location}} has been approved and is now live!"
        }
        (EventType::ListingApproved, Language::Am) => {
            "የእርስዎ ዝርዝር '{{property_title}}' በ{{location}} ጸድቋል እና አሁን ቀጥታ ነው።"
        }
        (EventType::ListingApproved, Language::Om) => {
            "Tarreen keessan '{{property_title}}' {{location}} keessatti mirkanaa'ee jira, amma online jira!"
        }
        (EventType::TenantUpdate, Language::En) => {
            "Update for your listing '{{property_title}}': A tenant named {{tenant_name}} is interested."
        }
        (EventType::TenantUpdate, Language::Am) => {
            "ለዝርዝርዎ '{{property_title}}' ማሻሻያ: {{tenant_name}} የሚባል ተከራይ ፍላጎት አለው።"
        }
        (EventType::TenantUpdate, Language::Om) => {
            "Tarree keessan '{{property_title}}' irratti odeeffannoo haaraa: Kirreessaan maqaan isaa {{tenant_name}} jedhamu fedhii qaba."
        }
    }
}

/// Render subject and body for an event in the given language.
///
/// The context must be a JSON object containing every key in
/// [`required_keys`] for the event type.
pub fn render(
    event_type: EventType,
    language: Language,
    context: &serde_json::Value,
) -> TemplateResult<RenderedMessage> {
    let variables = context.as_object().ok_or(TemplateError::ContextNotObject)?;

    for key in required_keys(event_type) {
        if !variables.contains_key(*key) {
            return Err(TemplateError::MissingContextKey { event_type, key });
        }
    }

    Ok(RenderedMessage {
        subject: substitute_string(subject_template(event_type, language), variables),
        body: substitute_string(body_template(event_type, language), variables),
    })
}
