//! The deterministic document-control section.
//!
//! Reference metadata, the delegation roster and the attachment list are
//! derived from the request and organization config alone.

use crate::config::OrganizationConfig;
use crate::request::SynthesisRequest;
use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Build the document-control section object.
///
/// `reference` is the document's reference id; `issued` its issue date.
pub fn build(
    request: &SynthesisRequest,
    organization: &OrganizationConfig,
    reference: Uuid,
    issued: NaiveDate,
) -> Map<String, Value> {
    let mut section = Map::new();
    section.insert(
        "document_control".to_string(),
        document_control(request, organization, reference, issued),
    );
    section.insert("delegation".to_string(), delegation(organization));
    section.insert(
        "attachments".to_string(),
        Value::Array(
            attachments(request, organization)
                .into_iter()
                .map(Value::String)
                .collect(),
        ),
    );
    section
}

fn document_control(
    request: &SynthesisRequest,
    org: &OrganizationConfig,
    reference: Uuid,
    issued: NaiveDate,
) -> Value {
    let short = reference.simple().to_string();
    let short = short.get(..8).unwrap_or(&short).to_uppercase();
    json!({
        "reference_id": format!("{}-{}-{}", org.acronym, request.year(), short),
        "uuid": reference.to_string(),
        "title": format!("Delegation Briefing: {}", request.event_name()),
        "subtitle": format!("{}, {} | {} to {}", request.city(), request.country(), request.start_string(), request.end_string()),
        "classification": org.classification,
        "issue_date": issued.format("%Y-%m-%d").to_string(),
        "prepared_for": format!("{}, {}", org.principal_name, org.principal_title),
        "prepared_by": format!("{}, {}", org.issuing_office, org.name),
        "event_name": request.event_name(),
        "event_type": request.event_type(),
        "event_start": request.start_string(),
        "event_end": request.end_string(),
        "number_of_days": request.number_of_days(),
        "city": request.city(),
        "country": request.country(),
        "venue": request.venue_or_city(),
    })
}

fn delegation(org: &OrganizationConfig) -> Value {
    Value::Array(
        org.delegation
            .iter()
            .map(|member| {
                json!({
                    "name": member.name,
                    "title": member.title,
                    "department": member.department,
                    "strategic_role": member.strategic_role,
                })
            })
            .collect(),
    )
}

/// File names of the standard briefing attachments.
pub fn attachments(request: &SynthesisRequest, org: &OrganizationConfig) -> Vec<String> {
    let event = request.event_name();
    let country = request.country();
    let year = request.year();
    vec![
        format!("{} - Official Program {}.pdf", event, year),
        format!("{} Economic Brief {}.pdf", country, year),
        format!("{} - Health Sector Transformation Program.pdf", org.national_strategy),
        format!("{} Strategic Plan.pdf", org.name),
        "Official Delegation CVs.pdf".to_string(),
        format!("{}-{} Bilateral Brief.pdf", org.home_country, country),
        format!("Keynote Speaker Profiles - {} {}.pdf", event, year),
        format!("Entry Requirements for {} (Official Passports).pdf", country),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::required::REQUIRED_FIELDS;
    use crate::record::DocumentRecord;
    use crate::synthesis::Section;

    fn request() -> SynthesisRequest {
        SynthesisRequest::builder("Random Expo", "Nairobi", "Kenya", "2026-06-10")
            .end_date("2026-06-12")
            .build()
            .unwrap()
    }

    fn reference() -> Uuid {
        Uuid::parse_str("6f1c2b9e-0d7a-4e55-9a2b-3c4d5e6f7a8b").unwrap()
    }

    #[test]
    fn test_document_control_fields() {
        let org = OrganizationConfig::default();
        let issued = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let section = build(&request(), &org, reference(), issued);

        let control = &section["document_control"];
        assert_eq!(control["reference_id"], "SFDA-2026-6F1C2B9E");
        assert_eq!(control["issue_date"], "2026-05-01");
        assert_eq!(control["number_of_days"], 3);
        assert_eq!(control["classification"], json!(org.classification));
        assert_eq!(
            section["delegation"].as_array().unwrap().len(),
            org.delegation.len()
        );
        assert_eq!(section["attachments"].as_array().unwrap().len(), 8);
    }

    #[test]
    fn test_covers_required_document_control_paths() {
        let org = OrganizationConfig::default();
        let issued = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let record = DocumentRecord::from_map(build(&request(), &org, reference(), issued));
        for (path, _) in REQUIRED_FIELDS {
            let top = path.split('.').next().unwrap();
            if Section::DocumentControl.owned_keys().contains(&top) {
                assert!(record.get_path(path).is_some(), "{} missing", path);
            }
        }
    }

    #[test]
    fn test_attachments_name_event_and_country() {
        let names = attachments(&request(), &OrganizationConfig::default());
        assert!(names[0].starts_with("Random Expo - Official Program 2026"));
        assert!(names.iter().any(|n| n.contains("Saudi Arabia-Kenya")));
    }
}
