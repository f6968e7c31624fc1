//! Research query planning.
//!
//! Turns one request into the ordered list of free-text research prompts.
//! Every prompt carries the same hard rule: unverifiable facts are written
//! as the NOT FOUND marker and names, addresses or statistics are never made up.

use crate::config::ResearchConfig;
use crate::corpus::BlockKind;
use crate::request::SynthesisRequest;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The kinds of research query, in corpus priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchQueryKind {
    /// Extraction from the official event website.
    OfficialWebsite,
    /// What actually happened, for events that already started.
    PostEventRecap,
    /// Broad coverage of every briefing topic.
    Primary,
    /// Gap filling across the same topics from a second angle.
    Supplemental,
    /// Narrow confirmation of exact names and titles.
    Verification,
}

impl ResearchQueryKind {
    /// Corpus block kind the query's text lands in.
    pub fn block_kind(&self) -> BlockKind {
        match self {
            ResearchQueryKind::OfficialWebsite => BlockKind::OfficialWebsite,
            ResearchQueryKind::PostEventRecap => BlockKind::PostEventRecap,
            ResearchQueryKind::Primary => BlockKind::PrimaryResearch,
            ResearchQueryKind::Supplemental => BlockKind::SupplementalResearch,
            ResearchQueryKind::Verification => BlockKind::Verification,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchQueryKind::OfficialWebsite => "official_website",
            ResearchQueryKind::PostEventRecap => "post_event_recap",
            ResearchQueryKind::Primary => "primary",
            ResearchQueryKind::Supplemental => "supplemental",
            ResearchQueryKind::Verification => "verification",
        }
    }
}

impl std::fmt::Display for ResearchQueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned research call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchQuery {
    pub kind: ResearchQueryKind,
    /// Short topic used in logs and the corpus block label.
    pub topic: String,
    pub prompt: String,
    pub system: String,
}

impl ResearchQuery {
    /// Log label, e.g. `verification:head of state`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.topic)
    }

    /// Corpus separator label for this query's block.
    pub fn block_label(&self) -> String {
        let base = self.kind.block_kind().default_label();
        match self.kind {
            ResearchQueryKind::Primary | ResearchQueryKind::Supplemental => base.to_string(),
            _ => format!("{} ({})", base, self.topic),
        }
    }
}

/// Builds the research plan for one request.
pub struct QueryPlanner<'a> {
    config: &'a ResearchConfig,
    home_country: &'a str,
    not_found: &'a str,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(config: &'a ResearchConfig, home_country: &'a str, not_found: &'a str) -> Self {
        Self {
            config,
            home_country,
            not_found,
        }
    }

    /// Every query to run for `request`, in priority order.
    ///
    /// The website query needs an http(s) URL and the recap query needs an
    /// event that started before `today`.
    pub fn plan(&self, request: &SynthesisRequest, today: NaiveDate) -> Vec<ResearchQuery> {
        let mut queries = Vec::new();
        if self.config.website_enabled
            && request.has_official_website()
            && let Some(url) = request.website()
        {
            queries.push(self.website(request, url));
        }
        if self.config.recap_enabled && request.is_past(today) {
            queries.push(self.recap(request));
        }
        queries.push(self.primary(request));
        queries.push(self.supplemental(request));
        if self.config.verification_enabled {
            queries.extend(self.verification(request));
        }
        queries
    }

    fn rule(&self) -> String {
        format!(
            "RULE: If you cannot verify a fact with certainty, write \"{nf}\". \
             NEVER invent names, titles, addresses, phone numbers or statistics.",
            nf = self.not_found
        )
    }

    fn system(&self, role: &str) -> String {
        format!(
            "{} Search the web for every labelled section. Write {} for anything you cannot \
             verify. Include source URLs. Be specific and thorough.",
            role, self.not_found
        )
    }

    fn header(&self, request: &SynthesisRequest) -> String {
        format!(
            "EVENT: {}\nLOCATION: {}, {}\nDATES: {} to {}\nVENUE: {}\nYEAR: {}",
            request.event_name(),
            request.city(),
            request.country(),
            request.start_string(),
            request.end_string(),
            request.venue().unwrap_or("TBD"),
            request.year()
        )
    }

    fn website(&self, request: &SynthesisRequest, url: &str) -> ResearchQuery {
        let prompt = format!(
            "Visit the official event website and extract ALL available information.\n\
             URL: {url}\nEVENT: {event}\n\n\
             Extract and list:\n\
             1. SPEAKERS: every confirmed speaker with exact full name, title and organization\n\
             2. SESSIONS/AGENDA: every session title with date and time\n\
             3. TRACKS or THEMES: official track names and descriptions\n\
             4. EVENT FACTS: edition number, expected attendance, founding year\n\
             5. KEY THEMES from the event description\n\n\
             If speakers or the agenda are on a sub-page (e.g. /speakers), visit that page too. \
             List every name you find; partial lists are valuable.\n{rule}",
            url = url,
            event = request.event_name(),
            rule = self.rule()
        );
        ResearchQuery {
            kind: ResearchQueryKind::OfficialWebsite,
            topic: url.to_string(),
            prompt,
            system: "Web extractor. List every speaker name, session title and track exactly as \
                     written on the official site. Never summarize."
                .to_string(),
        }
    }

    fn recap(&self, request: &SynthesisRequest) -> ResearchQuery {
        let prompt = format!(
            "The event below has already taken place. Find what actually happened.\n{header}\n\n\
             A) Speakers who actually appeared, with exact titles and organizations\n\
             B) Sessions that actually ran, with dates\n\
             C) Announcements, agreements and commitments made at the event\n\
             D) Reported attendance figures, with source\n\
             E) Press coverage highlights from official releases and major outlets\n\n{rule}",
            header = self.header(request),
            rule = self.rule()
        );
        ResearchQuery {
            kind: ResearchQueryKind::PostEventRecap,
            topic: format!("{} recap", request.year()),
            prompt,
            system: self.system("Event analyst reporting on a concluded event."),
        }
    }

    fn primary(&self, request: &SynthesisRequest) -> ResearchQuery {
        let event = request.event_name();
        let city = request.city();
        let country = request.country();
        let home = self.home_country;
        let year = request.year();
        let prompt = format!(
            "You are a research analyst preparing an official {home} government travel briefing.\n\
             Search the web thoroughly for VERIFIED facts for each section below.\n{rule}\n\n{header}\n\n\
             A) SPEAKERS & SESSIONS (most important): search \"{event} {year} speakers\" and \
             \"{event} {year} agenda\". List every speaker with exact full name, title and \
             organization, and every session with exact title, time and location.\n\
             B) DIPLOMATIC MISSIONS: {home} embassy in {country} and consulate in {city}. \
             Complete address, phone, email, and the exact name of the ambassador and consul general.\n\
             C) CURRENT LEADER: exact full official name and title of the head of state or \
             government of {country}, current as of {start}.\n\
             D) COUNTRY STATISTICS: GDP (with year and source), population, capital, currency, \
             area, timezone, official language, main religion, system of government, key sectors.\n\
             E) BILATERAL TRADE: {home}-{country} trade volume with year and source, key existing \
             agreements, cooperation areas.\n\
             F) REGULATORY BODIES: exact official names of the food and drug regulator, the \
             health ministry and the standards body of {country}.\n\
             G) VISA/ENTRY: entry requirements for {home} official and diplomatic passport holders.\n\
             H) WEATHER: realistic daily high/low in °C for {city} from {start} to {end}.\n\
             I) PRAYER TIMES: Fajr, Dhuhr, Asr, Maghrib and Isha in HH:MM for {city} on {start}.\n\
             J) EVENT HISTORY: themes, outcomes and attendance of the {prev1} and {prev2} editions.\n\n\
             Report every finding with its source URL.",
            rule = self.rule(),
            header = self.header(request),
            start = request.start_string(),
            end = request.end_string(),
            prev1 = year - 1,
            prev2 = year - 2,
        );
        ResearchQuery {
            kind: ResearchQueryKind::Primary,
            topic: "broad coverage".to_string(),
            prompt,
            system: self.system("Research analyst."),
        }
    }

    fn supplemental(&self, request: &SynthesisRequest) -> ResearchQuery {
        let event = request.event_name();
        let city = request.city();
        let country = request.country();
        let home = self.home_country;
        let year = request.year();
        let prompt = format!(
            "{home} government travel briefing research. Find VERIFIED facts only.\n{rule}\n\n\
             EVENT: {event} | {city}, {country} | {start} to {end}\n\n\
             A) CONFIRMED SPEAKERS: search \"{event} {year} speakers\"; every name with exact title and organization\n\
             B) AGENDA: search \"{event} {year} agenda\"; every session title, time and location\n\
             C) TRACKS: official track names with descriptions\n\
             D) {home} CONSULATE in {city}: exact address, phone, email, consul general's full name\n\
             E) {home} AMBASSADOR to {country}: exact full name as of {year}\n\
             F) COUNTRY STATISTICS: World Bank or IMF GDP and population with years\n\
             G) BILATERAL TRADE: {home}-{country} trade volume for the last two years with sources\n\
             H) PAST EDITIONS: outcomes, agreements and attendance of earlier editions\n\
             I) ORGANIZER: who runs the event, when it was founded, its usual participant profile\n\n\
             Label each section A-I. Include source URLs.",
            rule = self.rule(),
            start = request.start_string(),
            end = request.end_string(),
        );
        ResearchQuery {
            kind: ResearchQueryKind::Supplemental,
            topic: "gap filling".to_string(),
            prompt,
            system: self.system("Research specialist."),
        }
    }

    fn verification(&self, request: &SynthesisRequest) -> Vec<ResearchQuery> {
        let event = request.event_name();
        let country = request.country();
        let city = request.city();
        let home = self.home_country;
        let year = request.year();
        let targets = [
            (
                "keynote speakers",
                format!(
                    "Confirm the keynote and headline speakers of {event} {year}. For each, give \
                     the exact full name and exact current title and organization as published \
                     by the organizer."
                ),
            ),
            (
                "diplomatic heads",
                format!(
                    "Confirm the exact full name and title of the current {home} ambassador to \
                     {country} and of the current {home} consul general in {city}."
                ),
            ),
            (
                "head of state",
                format!(
                    "Confirm the exact full official name and title of the current head of state \
                     of {country} as of {start}.",
                    start = request.start_string()
                ),
            ),
        ];
        targets
            .into_iter()
            .map(|(topic, ask)| ResearchQuery {
                kind: ResearchQueryKind::Verification,
                topic: topic.to_string(),
                prompt: format!(
                    "{ask}\nAnswer with the confirmed facts only, each with one source URL.\n{rule}",
                    rule = self.rule()
                ),
                system: format!(
                    "Fact checker. Give only facts confirmed by an official or primary source. \
                     Write {} otherwise.",
                    self.not_found
                ),
            })
            .collect()
    }
}
