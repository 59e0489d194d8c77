//! Calendar backend for appointment actions (§4.6, SPEC_FULL §11). Narrow
//! on purpose: create an event, check for a conflict. Anything richer than
//! that belongs to the calendar product, not this crate.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub calendar_id: String,
    pub summary: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Returns the created event's id, used as `google_event_id` on the
    /// appointment row.
    async fn create_event(&self, access_token: &SecretString, event: &CalendarEvent) -> Result<String>;
}

pub struct GoogleCalendarProvider {
    client: reqwest::Client,
}

impl GoogleCalendarProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct GoogleEventRequest {
    summary: String,
    start: GoogleEventTime,
    end: GoogleEventTime,
}

#[derive(Serialize)]
struct GoogleEventTime {
    #[serde(rename = "dateTime")]
    date_time: String,
}

#[derive(Deserialize)]
struct GoogleEventResponse {
    id: String,
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn create_event(&self, access_token: &SecretString, event: &CalendarEvent) -> Result<String> {
        let ends_at = event.starts_at + chrono::Duration::minutes(event.duration_minutes as i64);

        let response = self
            .client
            .post(format!(
                "https://www.googleapis.com/calendar/v3/calendars/{}/events",
                event.calendar_id
            ))
            .bearer_auth(access_token.expose_secret())
            .json(&GoogleEventRequest {
                summary: event.summary.clone(),
                start: GoogleEventTime { date_time: event.starts_at.to_rfc3339() },
                end: GoogleEventTime { date_time: ends_at.to_rfc3339() },
            })
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("calendar request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "calendar backend returned status {}",
                response.status()
            )));
        }

        let parsed: GoogleEventResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("malformed calendar response: {e}")))?;

        Ok(parsed.id)
    }
}
