//! Static knowledge overlay: pre-verified facts for recognized events.
//!
//! One overlay entry yields two artifacts per request:
//! - an authoritative text block placed at the front of the research corpus
//! - an [`OverrideVariables`] map force-written into the final record
//!
//! Every leaf fact is optional so "unknown" and "known to be empty" never
//! collapse into the same value.

mod builtin;

pub use builtin::builtin;

use crate::config::KnowledgeConfig;
use crate::error::ConfigError;
use crate::request::SynthesisRequest;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Facts that hold across every edition of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StableFacts {
    pub full_name: Option<String>,
    pub organizer: Option<String>,
    pub organizer_type: Option<String>,
    pub ceo: Option<String>,
    pub founder: Option<String>,
    pub founded: Option<String>,
    pub website: Option<String>,
    pub venue_city: Option<String>,
}

/// A speaker confirmed for a given edition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmedSpeaker {
    pub name: String,
    pub title: Option<String>,
    pub organization: Option<String>,
}

impl std::fmt::Display for ConfirmedSpeaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.title, &self.organization) {
            (Some(t), Some(o)) => write!(f, "{} ({}, {})", self.name, t, o),
            (Some(x), None) | (None, Some(x)) => write!(f, "{} ({})", self.name, x),
            (None, None) => write!(f, "{}", self.name),
        }
    }
}

/// Facts specific to one year's edition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditionFacts {
    pub edition: Option<String>,
    pub theme: Option<String>,
    pub dates: Option<String>,
    pub venue: Option<String>,
    pub attendance: Option<String>,
    pub speakers_count: Option<String>,
    pub sessions_count: Option<String>,
    pub topics: Option<String>,
    pub media: Option<String>,
    pub confirmed_speakers: Vec<ConfirmedSpeaker>,
    pub confirmed_sessions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PastEdition {
    pub theme: Option<String>,
    pub attendance: Option<String>,
}

/// A diplomatic mission (embassy or consulate) of the home country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionFacts {
    pub name: Option<String>,
    pub head_name: Option<String>,
    pub head_title: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// Lowercase city names this mission covers (consulates only).
    pub serves: Vec<String>,
}

/// Relations between the host country and one home country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilateralFacts {
    pub home_country: String,
    pub trade_volume: Option<String>,
    pub trade_detail: Option<String>,
    pub embassy: Option<MissionFacts>,
    pub consulates: Vec<MissionFacts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrayerTimes {
    pub fajr: Option<String>,
    pub dhuhr: Option<String>,
    pub asr: Option<String>,
    pub maghrib: Option<String>,
    pub isha: Option<String>,
}

impl PrayerTimes {
    fn fields(&self) -> [(&'static str, &Option<String>); 5] {
        [
            ("fajr", &self.fajr),
            ("dhuhr", &self.dhuhr),
            ("asr", &self.asr),
            ("maghrib", &self.maghrib),
            ("isha", &self.isha),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherNormals {
    pub summary: Option<String>,
    pub condition: Option<String>,
    pub high_c: Option<i64>,
    pub low_c: Option<i64>,
}

/// Facts valid only for certain cities in certain months.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalFacts {
    pub cities: Vec<String>,
    pub months: Vec<u32>,
    pub prayer_times: Option<PrayerTimes>,
    pub weather: Option<WeatherNormals>,
}

/// Facts about the host country of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationFacts {
    pub country: String,
    pub aliases: Vec<String>,
    pub capital: Option<String>,
    pub head_of_state: Option<String>,
    pub head_of_state_title: Option<String>,
    pub gdp: Option<String>,
    pub population: Option<String>,
    pub gdp_per_capita: Option<String>,
    pub currency: Option<String>,
    pub regulator: Option<String>,
    pub health_ministry: Option<String>,
    pub visa_policy: Option<String>,
    pub bilateral: Vec<BilateralFacts>,
    pub seasonal: Vec<SeasonalFacts>,
}

impl LocationFacts {
    fn matches_country(&self, country: &str) -> bool {
        names_country(
            std::iter::once(self.country.as_str()).chain(self.aliases.iter().map(String::as_str)),
            country,
        )
    }

    pub fn bilateral_for(&self, home_country: &str) -> Option<&BilateralFacts> {
        self.bilateral
            .iter()
            .find(|b| b.home_country.eq_ignore_ascii_case(home_country.trim()))
    }

    pub fn seasonal_for(&self, city: &str, month: u32) -> Option<&SeasonalFacts> {
        let city = city.to_lowercase();
        self.seasonal.iter().find(|s| {
            (s.months.is_empty() || s.months.contains(&month))
                && s.cities.iter().any(|c| city.contains(c.as_str()))
        })
    }
}

impl BilateralFacts {
    pub fn consulate_for(&self, city: &str) -> Option<&MissionFacts> {
        let city = city.to_lowercase();
        self.consulates
            .iter()
            .find(|c| c.serves.iter().any(|s| city.contains(s.as_str())))
    }
}

/// All known facts about one recognized event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeEntry {
    /// Compound lookup key; every token must appear in the event name.
    pub key: String,
    pub aliases: Vec<String>,
    pub stable: StableFacts,
    /// Keyed by four-digit year.
    pub editions: BTreeMap<String, EditionFacts>,
    pub history: BTreeMap<String, PastEdition>,
    pub locations: Vec<LocationFacts>,
}

impl KnowledgeEntry {
    /// Length of the most specific key matching `event_lower`, if any.
    fn match_score(&self, event_lower: &str, words: &[&str]) -> Option<usize> {
        let token_score = std::iter::once(self.key.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|key| {
                let mut tokens = key.split_whitespace().peekable();
                tokens.peek().is_some()
                    && tokens.all(|t| words.contains(&t.to_lowercase().as_str()))
            })
            .map(str::len)
            .max();
        let name_score = self
            .stable
            .full_name
            .as_deref()
            .map(str::to_lowercase)
            .filter(|name| !name.is_empty() && event_lower.contains(name.as_str()))
            .map(|name| name.len());
        token_score.max(name_score)
    }

    pub fn edition(&self, year: i32) -> Option<&EditionFacts> {
        self.editions.get(&year.to_string())
    }

    pub fn location_for(&self, country: &str) -> Option<&LocationFacts> {
        self.locations.iter().find(|l| l.matches_country(country))
    }
}

/// Current head of state for a country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderFact {
    pub country: String,
    pub aliases: Vec<String>,
    pub name: String,
    pub title: Option<String>,
}

/// The full overlay table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeOverlay {
    pub events: Vec<KnowledgeEntry>,
    pub leaders: Vec<LeaderFact>,
}

impl KnowledgeOverlay {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError {
            message: format!("knowledge overlay: {}", e),
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Build the overlay a run should use: built-in table, then the overlay file.
    pub fn from_config(config: &KnowledgeConfig) -> Result<Self, ConfigError> {
        let mut overlay = if config.use_builtin {
            builtin()
        } else {
            Self::default()
        };
        if let Some(path) = &config.overlay_path {
            let file = Self::load_file(path)?;
            info!(
                path = %path.display(),
                events = file.events.len(),
                leaders = file.leaders.len(),
                "Loaded knowledge overlay file"
            );
            overlay.merge(file);
        }
        Ok(overlay)
    }

    /// Merge `other` into `self`; entries in `other` win on equal keys.
    pub fn merge(&mut self, other: KnowledgeOverlay) {
        for entry in other.events {
            match self
                .events
                .iter_mut()
                .find(|e| e.key.eq_ignore_ascii_case(&entry.key))
            {
                Some(existing) => *existing = entry,
                None => self.events.push(entry),
            }
        }
        for leader in other.leaders {
            match self
                .leaders
                .iter_mut()
                .find(|l| l.country.eq_ignore_ascii_case(&leader.country))
            {
                Some(existing) => *existing = leader,
                None => self.leaders.push(leader),
            }
        }
    }

    /// Find the entry for an event name. The longest matching key wins.
    pub fn lookup(&self, event_name: &str) -> Option<&KnowledgeEntry> {
        let event_lower = event_name.to_lowercase();
        let words: Vec<&str> = event_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut best: Option<(usize, &KnowledgeEntry)> = None;
        for entry in &self.events {
            if let Some(score) = entry.match_score(&event_lower, &words)
                && best.is_none_or(|(s, _)| score > s)
            {
                best = Some((score, entry));
            }
        }
        best.map(|(_, entry)| entry)
    }

    pub fn leader_for(&self, country: &str) -> Option<&LeaderFact> {
        self.leaders.iter().find(|l| {
            names_country(
                std::iter::once(l.country.as_str()).chain(l.aliases.iter().map(String::as_str)),
                country,
            )
        })
    }

    /// Project the overlay onto one request as dotted-path overrides.
    pub fn override_variables(
        &self,
        request: &SynthesisRequest,
        home_country: &str,
    ) -> OverrideVariables {
        let mut vars = OverrideVariables::new();

        if let Some(entry) = self.lookup(request.event_name()) {
            let stable = &entry.stable;
            vars.insert("conference_data.organizer", stable.organizer.as_deref());
            vars.insert("conference_data.founded", stable.founded.as_deref());

            if let Some(edition) = entry.edition(request.year()) {
                vars.insert("conference_data.slogan", edition.theme.as_deref());
                vars.insert("conference_data.edition", edition.edition.as_deref());
                vars.insert(
                    "conference_data.expected_participants",
                    edition.attendance.as_deref(),
                );
                if !edition.confirmed_speakers.is_empty() {
                    let roster = edition
                        .confirmed_speakers
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ");
                    vars.insert("conference_data.confirmed_speakers", Some(&roster));
                }
            }

            if let Some(location) = entry.location_for(request.country()) {
                location_overrides(&mut vars, location, request, home_country);
            }
        }

        if !vars.contains("country_info.head_of_state")
            && let Some(leader) = self.leader_for(request.country())
        {
            vars.insert("country_info.head_of_state", Some(&leader.name));
            if !vars.contains("country_info.head_of_state_title") {
                vars.insert("country_info.head_of_state_title", leader.title.as_deref());
            }
        }

        debug!(
            event = request.event_name(),
            overrides = vars.len(),
            "Built override variables"
        );
        vars
    }

    /// Human-readable authoritative block for the research corpus.
    ///
    /// Returns `None` when neither an event entry nor a leader fact applies.
    pub fn render_block(&self, request: &SynthesisRequest, home_country: &str) -> Option<String> {
        let entry = self.lookup(request.event_name());
        let leader = self.leader_for(request.country());
        if entry.is_none() && leader.is_none() {
            return None;
        }

        let mut lines = vec![
            "AUTHORITATIVE: the facts below are pre-verified. Do not contradict them with \
             any later research; where research disagrees, these facts win."
                .to_string(),
        ];

        if let Some(entry) = entry {
            let stable = &entry.stable;
            lines.push(format!(
                "Conference: {}",
                stable.full_name.as_deref().unwrap_or(request.event_name())
            ));
            push_fact(&mut lines, "Organizer", &stable.organizer);
            push_fact(&mut lines, "Organizer profile", &stable.organizer_type);
            push_fact(&mut lines, "CEO/Leader", &stable.ceo);
            push_fact(&mut lines, "Founder", &stable.founder);
            push_fact(&mut lines, "Founded", &stable.founded);
            push_fact(&mut lines, "Official website", &stable.website);
            push_fact(&mut lines, "Usual venue", &stable.venue_city);

            if let Some(edition) = entry.edition(request.year()) {
                lines.push(String::new());
                lines.push(format!("{} EDITION:", request.year()));
                push_fact(&mut lines, "  Edition number", &edition.edition);
                push_fact(&mut lines, "  Official theme", &edition.theme);
                push_fact(&mut lines, "  Dates", &edition.dates);
                push_fact(&mut lines, "  Venue", &edition.venue);
                push_fact(&mut lines, "  Attendance", &edition.attendance);
                push_fact(&mut lines, "  Speakers", &edition.speakers_count);
                push_fact(&mut lines, "  Sessions", &edition.sessions_count);
                push_fact(&mut lines, "  Topics", &edition.topics);
                push_fact(&mut lines, "  Media coverage", &edition.media);
                if !edition.confirmed_speakers.is_empty() {
                    lines.push(format!("CONFIRMED SPEAKERS ({}):", request.year()));
                    for speaker in &edition.confirmed_speakers {
                        lines.push(format!("  - {}", speaker));
                    }
                }
                if !edition.confirmed_sessions.is_empty() {
                    lines.push(format!("CONFIRMED SESSIONS ({}):", request.year()));
                    for session in &edition.confirmed_sessions {
                        lines.push(format!("  - {}", session));
                    }
                }
            }

            if !entry.history.is_empty() {
                lines.push(String::new());
                lines.push("PAST EDITIONS:".to_string());
                for (year, past) in entry.history.iter().rev() {
                    lines.push(format!(
                        "  {}: Theme='{}', Attendance={}",
                        year,
                        past.theme.as_deref().unwrap_or("NOT FOUND"),
                        past.attendance.as_deref().unwrap_or("NOT FOUND")
                    ));
                }
            }

            if let Some(location) = entry.location_for(request.country()) {
                render_location(&mut lines, location, request, home_country);
            }
        }

        if let Some(leader) = leader {
            lines.push(String::new());
            lines.push(format!(
                "CURRENT HEAD OF STATE of {}: {}{} (use EXACTLY this name)",
                leader.country,
                leader.name,
                leader
                    .title
                    .as_deref()
                    .map(|t| format!(", {}", t))
                    .unwrap_or_default()
            ));
        }

        Some(lines.join("\n"))
    }
}

fn location_overrides(
    vars: &mut OverrideVariables,
    location: &LocationFacts,
    request: &SynthesisRequest,
    home_country: &str,
) {
    vars.insert("country_info.capital", location.capital.as_deref());
    vars.insert("country_info.head_of_state", location.head_of_state.as_deref());
    vars.insert(
        "country_info.head_of_state_title",
        location.head_of_state_title.as_deref(),
    );
    vars.insert("country_info.gdp", location.gdp.as_deref());
    vars.insert("country_info.population", location.population.as_deref());
    vars.insert("country_info.gdp_per_capita", location.gdp_per_capita.as_deref());
    vars.insert("country_info.currency", location.currency.as_deref());
    vars.insert("country_info.regulator", location.regulator.as_deref());
    vars.insert("country_info.health_ministry", location.health_ministry.as_deref());
    vars.insert("country_info.visa_policy", location.visa_policy.as_deref());

    if let Some(bilateral) = location.bilateral_for(home_country) {
        vars.insert("bilateral_fields.trade_volume", bilateral.trade_volume.as_deref());

        if let Some(embassy) = &bilateral.embassy {
            vars.insert("embassy.name", embassy.name.as_deref());
            vars.insert("embassy.ambassador_name", embassy.head_name.as_deref());
            vars.insert("embassy.ambassador_title", embassy.head_title.as_deref());
            vars.insert("embassy.address", embassy.address.as_deref());
            vars.insert("embassy.phone", embassy.phone.as_deref());
            vars.insert("embassy.email", embassy.email.as_deref());
            vars.insert("embassy.website", embassy.website.as_deref());
            vars.insert("key_ambassadors.0.name", embassy.head_name.as_deref());
            vars.insert("key_ambassadors.0.title", embassy.head_title.as_deref());
        }

        if let Some(consulate) = bilateral.consulate_for(request.city()) {
            vars.insert("consulate.name", consulate.name.as_deref());
            vars.insert("consulate.consul_name", consulate.head_name.as_deref());
            vars.insert("consulate.consul_title", consulate.head_title.as_deref());
            vars.insert("consulate.address", consulate.address.as_deref());
            vars.insert("consulate.phone", consulate.phone.as_deref());
            vars.insert("consulate.email", consulate.email.as_deref());
        }
    }

    if let Some(prayer) = location
        .seasonal_for(request.city(), request.start_date().month())
        .and_then(|s| s.prayer_times.as_ref())
    {
        for day in 0..request.number_of_days() {
            for (name, value) in prayer.fields() {
                vars.insert(&format!("prayer_times.{}.{}", day, name), value.as_deref());
            }
        }
    }
}

fn render_location(
    lines: &mut Vec<String>,
    location: &LocationFacts,
    request: &SynthesisRequest,
    home_country: &str,
) {
    lines.push(String::new());
    lines.push(format!("{}: VERIFIED FACTS", location.country.to_uppercase()));
    push_fact(lines, "  Capital", &location.capital);
    push_fact(lines, "  Head of state", &location.head_of_state);
    push_fact(lines, "  Head of state title", &location.head_of_state_title);
    push_fact(lines, "  GDP", &location.gdp);
    push_fact(lines, "  Population", &location.population);
    push_fact(lines, "  GDP per capita", &location.gdp_per_capita);
    push_fact(lines, "  Currency", &location.currency);
    push_fact(lines, "  Medicines regulator", &location.regulator);
    push_fact(lines, "  Health ministry", &location.health_ministry);
    push_fact(lines, "  Visa policy", &location.visa_policy);

    if let Some(bilateral) = location.bilateral_for(home_country) {
        push_fact(lines, "  Bilateral trade", &bilateral.trade_volume);
        push_fact(lines, "  Trade detail", &bilateral.trade_detail);
        if let Some(embassy) = &bilateral.embassy {
            render_mission(lines, "Embassy", embassy);
        }
        if let Some(consulate) = bilateral.consulate_for(request.city()) {
            render_mission(lines, "Consulate", consulate);
        }
    }

    if let Some(seasonal) = location.seasonal_for(request.city(), request.start_date().month()) {
        if let Some(prayer) = &seasonal.prayer_times {
            let times: Vec<String> = prayer
                .fields()
                .iter()
                .filter_map(|(name, value)| value.as_ref().map(|v| format!("{} {}", name, v)))
                .collect();
            lines.push(format!(
                "  Prayer times ({}, this month): {}",
                request.city(),
                times.join(", ")
            ));
        }
        if let Some(weather) = &seasonal.weather {
            push_fact(lines, "  Typical weather", &weather.summary);
        }
    }
}

fn render_mission(lines: &mut Vec<String>, label: &str, mission: &MissionFacts) {
    push_fact(lines, &format!("  {} name", label), &mission.name);
    if let Some(head) = &mission.head_name {
        lines.push(format!(
            "  {} head: {}{}",
            label,
            head,
            mission
                .head_title
                .as_deref()
                .map(|t| format!(" ({})", t))
                .unwrap_or_default()
        ));
    }
    push_fact(lines, &format!("  {} address", label), &mission.address);
    push_fact(lines, &format!("  {} phone", label), &mission.phone);
    push_fact(lines, &format!("  {} email", label), &mission.email);
}

fn push_fact(lines: &mut Vec<String>, label: &str, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
        lines.push(format!("{}: {}", label, value));
    }
}

/// Whether any of `names` denotes `country`.
///
/// Matches on whole words so a short alias like "uk" never matches "Ukraine".
fn names_country<'a>(mut names: impl Iterator<Item = &'a str>, country: &str) -> bool {
    let country = country.to_lowercase();
    let words: Vec<&str> = country
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    names.any(|name| {
        let name = name.to_lowercase();
        let mut tokens = name.split_whitespace().peekable();
        tokens.peek().is_some() && tokens.all(|t| words.contains(&t))
    })
}

/// Flat dotted-path → value projection of the overlay for one request.
///
/// Every value stored here is non-blank and must appear verbatim at its
/// path in the final record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideVariables(BTreeMap<String, String>);

impl OverrideVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` at `path`; blank or missing values are ignored.
    pub fn insert(&mut self, path: &str, value: Option<&str>) {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.0.insert(path.to_string(), value.to_string());
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries whose top-level field is one of `keys`.
    pub fn slice<'a>(&'a self, keys: &'a [&'a str]) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.iter().filter(move |(path, _)| {
            let top = path.split('.').next().unwrap_or_default();
            keys.contains(&top)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(event: &str, city: &str, country: &str, start: &str, end: &str) -> SynthesisRequest {
        SynthesisRequest::builder(event, city, country, start)
            .end_date(end)
            .build()
            .unwrap()
    }

    fn milken_request() -> SynthesisRequest {
        request(
            "Milken Institute Global Conference 2025",
            "Los Angeles",
            "United States",
            "2025-05-04",
            "2025-05-07",
        )
    }

    #[test]
    fn test_lookup_by_key_token() {
        let overlay = builtin();
        let entry = overlay.lookup("The 2025 MILKEN Global Conference").unwrap();
        assert_eq!(entry.key, "milken");
    }

    #[test]
    fn test_lookup_compound_key_requires_all_tokens() {
        let overlay = builtin();
        assert!(overlay.lookup("World Economic Outlook Summit").is_none());
        assert_eq!(
            overlay.lookup("World Economic Forum 2026").unwrap().key,
            "world economic forum"
        );
    }

    #[test]
    fn test_lookup_whole_words_only() {
        let overlay = builtin();
        assert!(overlay.lookup("Whatever Expo").is_none());
        assert_eq!(overlay.lookup("WHA78").map(|e| e.key.as_str()), None);
        assert_eq!(
            overlay.lookup("WHA 78th session").unwrap().key,
            "world health assembly"
        );
    }

    #[test]
    fn test_lookup_longest_key_wins() {
        let mut overlay = builtin();
        overlay.events.push(KnowledgeEntry {
            key: "milken institute global".into(),
            ..Default::default()
        });
        let entry = overlay.lookup("Milken Institute Global Conference").unwrap();
        // full_name of the built-in entry is longer still
        assert_eq!(entry.key, "milken");

        overlay.events.push(KnowledgeEntry {
            key: "milken institute global conference asia".into(),
            ..Default::default()
        });
        let entry = overlay
            .lookup("Milken Institute Global Conference Asia")
            .unwrap();
        assert_eq!(entry.key, "milken institute global conference asia");
    }

    #[test]
    fn test_override_variables_milken() {
        let vars = builtin().override_variables(&milken_request(), "Saudi Arabia");
        assert_eq!(
            vars.get("embassy.ambassador_name"),
            Some("HRH Princess Reema bint Bandar")
        );
        assert_eq!(
            vars.get("key_ambassadors.0.name"),
            Some("HRH Princess Reema bint Bandar")
        );
        assert_eq!(vars.get("consulate.consul_name"), Some("Mr. Fawaz Alshubaili"));
        assert_eq!(
            vars.get("conference_data.slogan"),
            Some("Toward a Flourishing Future")
        );
        assert_eq!(vars.get("country_info.head_of_state"), Some("Donald J. Trump"));
        assert_eq!(vars.get("prayer_times.3.isha"), Some("21:11"));
        assert!(vars.get("prayer_times.4.isha").is_none());
        assert!(
            vars.get("conference_data.confirmed_speakers")
                .unwrap()
                .contains("Jane Fraser (CEO, Citi)")
        );
    }

    #[test]
    fn test_override_variables_other_home_country() {
        let vars = builtin().override_variables(&milken_request(), "Canada");
        assert!(vars.get("embassy.ambassador_name").is_none());
        assert_eq!(vars.get("country_info.gdp"), Some("$30.62 trillion (2025, IMF)"));
    }

    #[test]
    fn test_override_variables_other_year_has_no_edition() {
        let req = request(
            "Milken Institute Global Conference",
            "Los Angeles",
            "USA",
            "2026-10-04",
            "2026-10-05",
        );
        let vars = builtin().override_variables(&req, "Saudi Arabia");
        assert!(vars.get("conference_data.slogan").is_none());
        assert!(vars.get("prayer_times.0.fajr").is_none());
        assert_eq!(vars.get("conference_data.organizer"), Some("Milken Institute"));
    }

    #[test]
    fn test_leader_table_applies_without_event() {
        let req = request("Random Expo", "Berlin", "Germany", "2026-01-10", "2026-01-11");
        let overlay = builtin();
        let vars = overlay.override_variables(&req, "Saudi Arabia");
        assert_eq!(vars.get("country_info.head_of_state"), Some("Friedrich Merz"));
        assert_eq!(vars.len(), 2);
        assert!(overlay.render_block(&req, "Saudi Arabia").is_some());
    }

    #[test]
    fn test_leader_alias_is_whole_word() {
        let overlay = builtin();
        assert!(overlay.leader_for("Ukraine").is_none());
        assert_eq!(overlay.leader_for("UK").unwrap().name, "Keir Starmer");
    }

    #[test]
    fn test_no_overlay_for_unknown_event_and_country() {
        let req = request("Random Expo", "Nairobi", "Kenya", "2026-01-10", "2026-01-12");
        let overlay = builtin();
        assert!(overlay.override_variables(&req, "Saudi Arabia").is_empty());
        assert!(overlay.render_block(&req, "Saudi Arabia").is_none());
    }

    #[test]
    fn test_render_block_is_authoritative() {
        let block = builtin()
            .render_block(&milken_request(), "Saudi Arabia")
            .unwrap();
        assert!(block.starts_with("AUTHORITATIVE"));
        assert!(block.contains("Official theme: Toward a Flourishing Future"));
        assert!(block.contains("  - Vis Raghavan (Head of Banking and Executive Vice Chair, Citi)"));
        assert!(block.contains("2022: Theme='Drivers of Change'"));
        assert!(block.contains("Embassy head: HRH Princess Reema bint Bandar"));
        assert!(block.contains("Typical weather: Highs 26-29°C"));
    }

    #[test]
    fn test_merge_file_wins() {
        let mut overlay = builtin();
        let file = KnowledgeOverlay::from_toml_str(
            r#"
            [[events]]
            key = "MILKEN"
            [events.stable]
            organizer = "Overridden Org"

            [[leaders]]
            country = "Kenya"
            name = "William Ruto"
            "#,
        )
        .unwrap();
        overlay.merge(file);
        let entry = overlay.lookup("Milken Global Conference").unwrap();
        assert_eq!(entry.stable.organizer.as_deref(), Some("Overridden Org"));
        assert_eq!(overlay.leader_for("Kenya").unwrap().name, "William Ruto");
        assert_eq!(overlay.events.len(), 3);
    }

    #[test]
    fn test_from_config_missing_file() {
        let config = KnowledgeConfig {
            use_builtin: false,
            overlay_path: Some("/definitely/not/here.toml".into()),
        };
        assert!(matches!(
            KnowledgeOverlay::from_config(&config),
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.toml");
        std::fs::write(
            &path,
            "[[leaders]]\ncountry = \"Kenya\"\nname = \"William Ruto\"\n",
        )
        .unwrap();
        let config = KnowledgeConfig {
            use_builtin: false,
            overlay_path: Some(path),
        };
        let overlay = KnowledgeOverlay::from_config(&config).unwrap();
        assert!(overlay.events.is_empty());
        assert_eq!(overlay.leaders.len(), 1);
    }

    #[test]
    fn test_blank_override_values_ignored() {
        let mut vars = OverrideVariables::new();
        vars.insert("embassy.phone", Some("   "));
        vars.insert("embassy.email", None);
        assert!(vars.is_empty());
    }

    #[test]
    fn test_slice_by_top_level_key() {
        let vars = builtin().override_variables(&milken_request(), "Saudi Arabia");
        let slice: Vec<_> = vars.slice(&["embassy"]).collect();
        assert!(!slice.is_empty());
        assert!(slice.iter().all(|(p, _)| p.starts_with("embassy.")));
    }
}
