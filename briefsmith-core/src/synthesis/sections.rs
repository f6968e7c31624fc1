//! Document sections: which top-level keys each one owns and the schema
//! template its prompt embeds.

use crate::config::OrganizationConfig;
use crate::request::SynthesisRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A disjoint slice of the document schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Reference metadata, delegation and attachments; built without generation.
    DocumentControl,
    /// Conference metadata, country statistics and diplomatic missions.
    Facts,
    /// Speakers, sessions, tracks and past outcomes.
    People,
    /// Summaries and strategic analysis.
    Narrative,
    /// Day-by-day agenda, weather and prayer times.
    Schedule,
    /// Intelligence bullets, bilateral and political analysis.
    Intelligence,
    /// Bilateral meetings, suggested meetings and talking points.
    Annexes,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::DocumentControl,
        Section::Facts,
        Section::People,
        Section::Narrative,
        Section::Schedule,
        Section::Intelligence,
        Section::Annexes,
    ];

    /// Sections produced by a generation call, in generation order.
    pub const GENERATED: [Section; 6] = [
        Section::Facts,
        Section::People,
        Section::Narrative,
        Section::Schedule,
        Section::Intelligence,
        Section::Annexes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::DocumentControl => "document_control",
            Section::Facts => "facts",
            Section::People => "people",
            Section::Narrative => "narrative",
            Section::Schedule => "schedule",
            Section::Intelligence => "intelligence",
            Section::Annexes => "annexes",
        }
    }

    pub fn is_generated(&self) -> bool {
        !matches!(self, Section::DocumentControl)
    }

    /// Top-level record keys this section writes.
    pub fn owned_keys(&self) -> &'static [&'static str] {
        match self {
            Section::DocumentControl => &["document_control", "delegation", "attachments"],
            Section::Facts => &[
                "conference_data",
                "country_info",
                "embassy",
                "consulate",
                "key_ambassadors",
                "bilateral_fields",
            ],
            Section::People => &[
                "speakers",
                "sessions",
                "conference_tracks",
                "previous_outcomes",
            ],
            Section::Narrative => &[
                "report_subtitle",
                "visit_objectives",
                "executive_summary",
                "geopolitical_summary",
                "conference_summary",
                "conference_history",
                "participation_history",
                "strategy_alignment",
                "regulatory_relevance",
                "investment_implications",
                "institutional_positioning",
                "organization_relevance",
            ],
            Section::Schedule => &["schedule_days", "weather", "prayer_times"],
            Section::Intelligence => &[
                "intel_global_significance",
                "intel_regulatory_impact",
                "intel_long_term_value",
                "bilateral_relations",
                "entry_requirements",
                "leadership_brief",
                "political_economic_orientation",
                "political_strategic_priorities",
                "trade_exchange",
            ],
            Section::Annexes => &["bilateral_meetings", "suggested_meetings", "talking_points"],
        }
    }

    /// Section that owns a top-level key, if any.
    pub fn owner_of(key: &str) -> Option<Section> {
        Self::ALL
            .into_iter()
            .find(|section| section.owned_keys().contains(&key))
    }

    /// Whether `object` carries at least one owned key with real content.
    pub fn accepts(&self, object: &Map<String, Value>) -> bool {
        self.owned_keys()
            .iter()
            .any(|key| object.get(*key).is_some_and(is_substantive))
    }

    /// Keep only the keys this section owns.
    pub fn retain_owned(&self, object: Map<String, Value>) -> Map<String, Value> {
        object
            .into_iter()
            .filter(|(key, _)| self.owned_keys().contains(&key.as_str()))
            .collect()
    }

    /// JSON template with `<placeholder>` markers for the section prompt.
    pub fn schema(&self, ctx: &SchemaContext<'_>) -> Value {
        match self {
            Section::DocumentControl => Value::Object(Map::new()),
            Section::Facts => facts_schema(ctx),
            Section::People => people_schema(ctx),
            Section::Narrative => narrative_schema(ctx),
            Section::Schedule => schedule_schema(ctx),
            Section::Intelligence => intelligence_schema(ctx),
            Section::Annexes => annexes_schema(ctx),
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a generated value carries content beyond empty strings and
/// unreplaced `<placeholder>` markers.
pub fn is_substantive(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => {
            let t = s.trim();
            !t.is_empty() && !(t.starts_with('<') && t.ends_with('>'))
        }
        Value::Array(items) => items.iter().any(is_substantive),
        Value::Object(map) => map.values().any(is_substantive),
    }
}

/// Request and organization facts the schema templates are filled from.
pub struct SchemaContext<'a> {
    pub request: &'a SynthesisRequest,
    pub organization: &'a OrganizationConfig,
}

impl SchemaContext<'_> {
    fn days(&self) -> impl Iterator<Item = (String, String)> + '_ {
        (0..self.request.number_of_days())
            .map(|i| (SynthesisRequest::day_label(i), self.request.date_string(i)))
    }

    /// Weekday name and date of every requested day.
    fn weekdays(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.request
            .dates()
            .into_iter()
            .map(|d| (d.format("%A").to_string(), d.format("%Y-%m-%d").to_string()))
    }
}

fn facts_schema(ctx: &SchemaContext<'_>) -> Value {
    let r = ctx.request;
    let home = &ctx.organization.home_country;
    json!({
        "conference_data": {
            "organizer": "<real organizing body from research>",
            "overview": "<what the event is, its global standing and policy influence>",
            "slogan": "<official theme or tagline of this edition>",
            "dates": format!("{} to {}", r.start_string(), r.end_string()),
            "location": format!("{}, {}", r.venue_or_city(), r.country()),
            "founded": "<year the event was established>",
            "edition": "<edition number of this year's event>",
            "expected_participants": "<verified number and type of participants>",
            "participant_profile": "<level and type of attendees>",
            "core_themes": "<the three to five main themes of this edition>",
            "participation": format!("<{}'s participation history and expected role>", home),
        },
        "country_info": {
            "capital": "<capital city>",
            "head_of_state_title": "<official title>",
            "head_of_state": "<exact full name of the current head of state>",
            "population": "<X million (year, source)>",
            "area": "<km²>",
            "gdp": "<$X trillion (year, source)>",
            "gdp_per_capita": "<$X (year, source)>",
            "currency": "<full name (CODE)>",
            "official_language": "<language>",
            "religion": "<predominant religion>",
            "timezone": "<UTC±n>",
            "government": "<political system>",
            "key_sectors": format!("<three to five sectors most relevant to {}>", home),
            "overview": "<four to five sentence strategic assessment using verified figures>",
        },
        "embassy": {
            "name": format!("<official name of the {} embassy in {}>", home, r.country()),
            "mission": "<one to two sentence mission statement>",
            "ambassador_name": "<exact name from research>",
            "ambassador_title": format!("<title of the {} ambassador to {}>", home, r.country()),
            "address": "<verified street address>",
            "phone": "<verified phone>",
            "email": "<verified email>",
            "website": "<verified URL>",
        },
        "consulate": {
            "name": format!("<official name of the {} consulate in {}>", home, r.city()),
            "address": "<verified street address>",
            "phone": "<verified phone>",
            "email": "<verified email>",
            "emergency_phone": "<24-hour emergency line>",
            "working_hours": "<working days and hours>",
            "consul_name": "<exact name from research>",
            "consul_title": "<official title>",
        },
        "key_ambassadors": [{
            "name": "<exact ambassador name from research>",
            "title": "<official title>",
            "country": r.country(),
            "relevance": "<two to three sentences on the ambassador's role for this delegation>",
        }],
        "bilateral_fields": {
            "trade_volume": "<verified figure with year and source>",
            "cooperation_areas": "<three to five sectors with named cooperation frameworks>",
            "strategic_agreements": "<named bilateral agreements>",
            "health_regulatory": format!("<health and regulatory cooperation between {} and {}>", home, r.country()),
        },
    })
}

fn people_schema(ctx: &SchemaContext<'_>) -> Value {
    let r = ctx.request;
    let sessions: Vec<Value> = ctx
        .days()
        .map(|(label, date)| {
            json!({
                "day": label,
                "date": date,
                "time": "<HH:MM>",
                "title": "<real session title from research>",
                "description": "<two to three sentences on what the session covers>",
                "speakers": "<exact speaker names from research, comma separated>",
                "policy_implications": "<specific policy impact>",
                "investment_implications": "<capital or investment dimension>",
                "regulatory_impact": format!("<significance for {}>", ctx.organization.acronym),
                "strategic_score": "<High|Medium|Low>",
            })
        })
        .collect();
    let year = r.year();
    json!({
        "speakers": [{
            "name": "<real speaker from research, exact full name>",
            "title": "<exact official title>",
            "organization": "<exact organization>",
            "country": "<country>",
            "influence_profile": "<two sentences on the speaker's global role>",
            "relevance": format!("<concrete relevance to {}'s agenda>", ctx.organization.acronym),
        }],
        "sessions": sessions,
        "conference_tracks": [{
            "name": "<official track name>",
            "explanation": "<two sentence explanation of the track and its relevance>",
        }],
        "previous_outcomes": [
            {"year": (year - 1).to_string(), "theme": "<actual theme>", "summary": "<specific outcomes>", "relevance": "<why it matters>"},
            {"year": (year - 2).to_string(), "theme": "<actual theme>", "summary": "<specific outcomes>", "relevance": "<why it matters>"},
        ],
    })
}

fn narrative_schema(ctx: &SchemaContext<'_>) -> Value {
    let org = ctx.organization;
    let r = ctx.request;
    json!({
        "report_subtitle": "<official theme or strategic tagline>",
        "visit_objectives": [
            "<objective tied to this event's actual agenda>",
            "<regulatory cooperation opportunity>",
            "<bilateral relationship to advance>",
            format!("<{} alignment: specific program or target>", org.national_strategy),
        ],
        "executive_summary": format!(
            "<seven to nine sentences: why {} matters, {}'s interests, {}'s agenda, bilateral opportunities with {}, expected outcomes>",
            r.event_name(), org.home_country, org.acronym, r.country()
        ),
        "geopolitical_summary": "<six to eight sentence analytical assessment>",
        "conference_summary": "<five to seven sentences: organizer, founding year, theme, participants>",
        "conference_history": "<five to seven sentences on past editions>",
        "participation_history": format!("<{}'s participation and linkage to {}>", org.home_country, org.national_strategy),
        "strategy_alignment": format!("<specific {} programs this visit serves>", org.national_strategy),
        "regulatory_relevance": format!("<{} reform programs advanced by this event>", org.acronym),
        "investment_implications": "<specific investment opportunity or target>",
        "institutional_positioning": "<international body or leadership role being advanced>",
        "organization_relevance": format!("<five to six sentences on the value to {}>", org.name),
    })
}

fn schedule_schema(ctx: &SchemaContext<'_>) -> Value {
    let venue = ctx.request.venue_or_city();
    let days: Vec<Value> = ctx
        .days()
        .map(|(label, date)| {
            json!({
                "day_label": label,
                "date": date,
                "items": [
                    {"time": "09:00", "activity": "<real session title from research>", "location": "<room>", "type": "session", "strategic_relevance": "<relevance>"},
                    {"time": "12:00", "activity": "<networking lunch>", "location": venue, "type": "networking", "strategic_relevance": "<relevance>"},
                    {"time": "14:00", "activity": "<real session or bilateral meeting>", "location": "<room>", "type": "bilateral", "strategic_relevance": "<relevance>"},
                ],
            })
        })
        .collect();
    let weather: Vec<Value> = ctx
        .weekdays()
        .map(|(weekday, date)| {
            json!({
                "day": weekday, "date": date,
                "condition": "<Sunny|Cloudy|Rainy|Partly Cloudy>",
                "high": "<integer °C>", "low": "<integer °C>",
                "humidity": "<n%>", "wind": "<n km/h>",
            })
        })
        .collect();
    let prayer: Vec<Value> = ctx
        .weekdays()
        .map(|(weekday, date)| {
            json!({
                "day": weekday, "date": date,
                "fajr": "<HH:MM>", "dhuhr": "<HH:MM>", "asr": "<HH:MM>",
                "maghrib": "<HH:MM>", "isha": "<HH:MM>",
            })
        })
        .collect();
    json!({
        "schedule_days": days,
        "weather": weather,
        "prayer_times": prayer,
    })
}

fn intelligence_schema(ctx: &SchemaContext<'_>) -> Value {
    let home = &ctx.organization.home_country;
    let country = ctx.request.country();
    json!({
        "intel_global_significance": ["<evidence of global influence>", "<economic significance with figures>", format!("<{}'s role at this forum>", home)],
        "intel_regulatory_impact": ["<expected regulatory decisions>", format!("<impact on {}'s mandate>", ctx.organization.acronym), "<harmonization opportunity>"],
        "intel_long_term_value": ["<three to five year strategic value>", "<institutional positioning>", "<measurable outcome target>"],
        "bilateral_relations": format!("<eight to ten sentences on {}-{} relations with verified statistics>", home, country),
        "entry_requirements": format!("<visa policy for {} official passports>", home),
        "leadership_brief": "<exact name and title of the head of state, political system, priorities>",
        "political_economic_orientation": "<economic policy model and current priorities>",
        "political_strategic_priorities": format!("<priorities most relevant to {}>", home),
        "trade_exchange": "<verified trade volume, key sectors, investment in both directions>",
    })
}

fn annexes_schema(ctx: &SchemaContext<'_>) -> Value {
    let r = ctx.request;
    let country = r.country();
    let meeting = |index: usize, time: &str| {
        json!({
            "entity": format!("<real institution in {} from research>", country),
            "counterpart": "<exact name if confirmed>",
            "counterpart_title": "<title of the head of this institution>",
            "date": r.date_string(index),
            "time": time,
            "location": r.venue_or_city(),
            "talking_points": ["<specific agenda item>", "<specific proposal>"],
            "strategic_objective": "<one measurable goal>",
            "expected_outcome": "<one concrete deliverable>",
        })
    };
    json!({
        "bilateral_meetings": [meeting(0, "14:00"), meeting(1, "10:30")],
        "suggested_meetings": [{
            "entity": "<real regulatory authority>",
            "country": country,
            "priority": "<high|medium|low>",
            "description": "<mandate of this body>",
            "rationale": "<specific cooperation opportunity>",
        }],
        "talking_points": [
            "<regulatory cooperation framework to propose>",
            "<data sharing or harmonization point>",
            "<market access point>",
        ],
    })
}
