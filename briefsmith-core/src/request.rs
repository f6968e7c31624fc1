//! The synthesis request: the handful of user-supplied facts a briefing is built from.

use crate::error::RequestError;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Longest event span a single briefing may cover.
pub const MAX_DAYS: usize = 31;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Immutable input to one synthesis run.
///
/// Created through [`SynthesisRequest::builder`]; fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    event_name: String,
    city: String,
    country: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    venue: Option<String>,
    event_type: String,
    context: Option<String>,
    website: Option<String>,
}

impl SynthesisRequest {
    pub fn builder(
        event_name: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
        start_date: impl Into<String>,
    ) -> SynthesisRequestBuilder {
        SynthesisRequestBuilder {
            event_name: event_name.into(),
            city: city.into(),
            country: country.into(),
            start_date: start_date.into(),
            end_date: None,
            venue: None,
            event_type: None,
            context: None,
            website: None,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn venue(&self) -> Option<&str> {
        self.venue.as_deref()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Inclusive day count of the event.
    pub fn number_of_days(&self) -> usize {
        (self.end_date - self.start_date).num_days() as usize + 1
    }

    /// Every calendar date of the event, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.number_of_days())
            .map(|i| self.start_date + Duration::days(i as i64))
            .collect()
    }

    /// ISO form of the `index`-th event date (0-based), clamped to the last day.
    pub fn date_string(&self, index: usize) -> String {
        let offset = index.min(self.number_of_days() - 1) as i64;
        (self.start_date + Duration::days(offset))
            .format(DATE_FORMAT)
            .to_string()
    }

    pub fn start_string(&self) -> String {
        self.start_date.format(DATE_FORMAT).to_string()
    }

    pub fn end_string(&self) -> String {
        self.end_date.format(DATE_FORMAT).to_string()
    }

    pub fn year(&self) -> i32 {
        self.start_date.year()
    }

    /// Label for the `index`-th day (0-based): "Day 1", "Day 2", ...
    pub fn day_label(index: usize) -> String {
        format!("Day {}", index + 1)
    }

    /// Whether the event has already started as of `today`.
    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.start_date < today
    }

    pub fn venue_or_city(&self) -> &str {
        self.venue.as_deref().unwrap_or(&self.city)
    }

    /// Whether an http(s) official website was supplied.
    pub fn has_official_website(&self) -> bool {
        self.website
            .as_deref()
            .is_some_and(|w| w.starts_with("http://") || w.starts_with("https://"))
    }

    /// A copy with the free-text fields replaced, used for the translated research view.
    pub(crate) fn with_text_fields(&self, fields: TextFields) -> Self {
        Self {
            event_name: fields.event_name,
            city: fields.city,
            country: fields.country,
            venue: fields.venue,
            context: fields.context,
            ..self.clone()
        }
    }

    pub(crate) fn text_fields(&self) -> TextFields {
        TextFields {
            event_name: self.event_name.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
            venue: self.venue.clone(),
            context: self.context.clone(),
        }
    }
}

/// The user-written fields of a request that may need translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TextFields {
    pub event_name: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Builder for [`SynthesisRequest`]; `build()` validates.
#[derive(Debug, Clone)]
pub struct SynthesisRequestBuilder {
    event_name: String,
    city: String,
    country: String,
    start_date: String,
    end_date: Option<String>,
    venue: Option<String>,
    event_type: Option<String>,
    context: Option<String>,
    website: Option<String>,
}

impl SynthesisRequestBuilder {
    pub fn end_date(mut self, end: impl Into<String>) -> Self {
        self.end_date = Some(end.into());
        self
    }

    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn build(self) -> Result<SynthesisRequest, RequestError> {
        let event_name = required("event_name", self.event_name)?;
        let city = required("city", self.city)?;
        let country = required("country", self.country)?;

        let start_date = parse_date("start_date", &self.start_date)?;
        let end_date = match non_empty(self.end_date) {
            Some(end) => parse_date("end_date", &end)?,
            None => start_date,
        };
        if end_date < start_date {
            return Err(RequestError::DateRangeReversed {
                start: start_date.format(DATE_FORMAT).to_string(),
                end: end_date.format(DATE_FORMAT).to_string(),
            });
        }
        let days = (end_date - start_date).num_days() as usize + 1;
        if days > MAX_DAYS {
            return Err(RequestError::RangeTooLong {
                days,
                max: MAX_DAYS,
            });
        }

        Ok(SynthesisRequest {
            event_name,
            city,
            country,
            start_date,
            end_date,
            venue: non_empty(self.venue),
            event_type: non_empty(self.event_type).unwrap_or_else(|| "Conference".to_string()),
            context: non_empty(self.context),
            website: non_empty(self.website),
        })
    }
}

fn required(field: &str, value: String) -> Result<String, RequestError> {
    let value = value.trim();
    if value.is_empty() {
        Err(RequestError::MissingField {
            field: field.to_string(),
        })
    } else {
        Ok(value.to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RequestError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| RequestError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}
