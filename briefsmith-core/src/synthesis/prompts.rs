//! Prompt assembly for sectioned generation.

use super::sections::{SchemaContext, Section};
use crate::config::Sentinels;
use crate::knowledge::OverrideVariables;

/// System instructions shared by every section call.
pub fn system_protocol(language: &str, sentinels: &Sentinels) -> String {
    format!(
        "You are a senior government intelligence analyst preparing an official delegation \
         briefing.\n\
         ANTI-HALLUCINATION PROTOCOL:\n\
         1. Use only facts present in the research provided. Never invent names, titles, \
         addresses, phone numbers, statistics or session titles.\n\
         2. Blocks marked AUTHORITATIVE or VERIFIED FACTS override anything else in the \
         research.\n\
         3. For a person that is not confirmed write \"{unknown}\". For any other fact \
         that is not confirmed write \"{tbd}\". Research lines marked \"{not_found}\" are \
         unconfirmed.\n\
         4. Replace every <placeholder> in the template; never return the placeholder text.\n\
         5. Write narrative fields in {language}. Keep proper names, titles and \
         organizations exactly as the research spells them.\n\
         6. Return one JSON object with exactly the keys of the template and nothing else.",
        unknown = sentinels.unknown_person,
        tbd = sentinels.tbd,
        not_found = sentinels.not_found,
        language = language,
    )
}

/// The user prompt for one generated section.
pub fn section_prompt(
    section: Section,
    ctx: &SchemaContext<'_>,
    overrides: &OverrideVariables,
    corpus: &str,
) -> String {
    let r = ctx.request;
    let mut prompt = String::new();

    let required: Vec<String> = overrides
        .slice(section.owned_keys())
        .map(|(path, value)| format!("- {}: {}", path, value))
        .collect();
    if !required.is_empty() {
        prompt.push_str("REQUIRED VALUES (copy exactly, do not rephrase):\n");
        prompt.push_str(&required.join("\n"));
        prompt.push_str("\n\n");
    }

    prompt.push_str(&format!(
        "EVENT: {}\nLOCATION: {}, {}\nVENUE: {}\nDATES: {} to {} ({} days)\nTYPE: {}\n",
        r.event_name(),
        r.city(),
        r.country(),
        r.venue_or_city(),
        r.start_string(),
        r.end_string(),
        r.number_of_days(),
        r.event_type(),
    ));
    if let Some(context) = r.context() {
        prompt.push_str(&format!("CONTEXT: {}\n", context));
    }
    prompt.push_str(&format!(
        "DELEGATION: {} ({}), travelling from {}\n\n",
        ctx.organization.name, ctx.organization.acronym, ctx.organization.home_country
    ));

    prompt.push_str("RESEARCH:\n");
    prompt.push_str(corpus);
    prompt.push_str("\n\n");

    let schema = section.schema(ctx);
    let rendered = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string());
    prompt.push_str(&format!(
        "Fill in the {} section. Return JSON matching this template:\n{}",
        section, rendered
    ));
    prompt
}
