// beech-core/src/tools/calendar.rs

//! Google Calendar v3 collaborator for meeting lookups.

use super::google_auth::GoogleAuth;
use crate::config::CalendarConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub organizer: String,
    pub attendees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Meetings starting in `[time_min, time_max)`, earliest first.
    async fn meetings(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Vec<Meeting>>;
}

pub struct GoogleCalendarClient {
    http_client: Client,
    auth: Arc<GoogleAuth>,
    config: CalendarConfig,
}

impl GoogleCalendarClient {
    pub fn new(http_client: Client, config: CalendarConfig, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http_client,
            auth,
            config,
        }
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn meetings(&self, time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Vec<Meeting>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.config.endpoint.trim_end_matches('/'),
            self.config.calendar_id
        );
        debug!(url = %url, %time_min, %time_max, "Listing calendar events.");
        let token = self.auth.access_token().await?;
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", self.config.max_results.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send calendar request to {}", url))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read calendar response body")?;
        if !status.is_success() {
            return Err(anyhow!("Calendar request failed with status {}: {}", status, body));
        }
        let events: EventList = serde_json::from_str(&body).context("Failed to parse calendar events")?;
        Ok(events.items.into_iter().filter_map(Event::into_meeting).collect())
    }
}

// --- Calendar v3 wire types ---

#[derive(Deserialize, Default)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

#[derive(Deserialize)]
struct Event {
    id: Option<String>,
    summary: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    location: Option<String>,
    description: Option<String>,
    #[serde(default)]
    attendees: Vec<Attendee>,
    organizer: Option<Attendee>,
    creator: Option<Attendee>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<DateTime<Utc>>,
    /// All-day events carry a date only.
    date: Option<NaiveDate>,
}

impl EventTime {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        self.date_time
            .or_else(|| self.date.and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc()))
    }
}

#[derive(Deserialize)]
struct Attendee {
    email: Option<String>,
}

impl Event {
    /// Events without an id, title or start are skipped.
    fn into_meeting(self) -> Option<Meeting> {
        let id = self.id?;
        let title = self.summary?;
        let start_time = self.start.as_ref()?.resolve()?;
        let end_time = self
            .end
            .as_ref()
            .and_then(EventTime::resolve)
            .unwrap_or(start_time + Duration::hours(1));
        let organizer = self
            .organizer
            .and_then(|o| o.email)
            .or_else(|| self.creator.and_then(|c| c.email))
            .unwrap_or_default();
        Some(Meeting {
            id,
            title,
            start_time,
            end_time,
            location: self.location.filter(|l| !l.is_empty()),
            organizer,
            attendees: self
                .attendees
                .into_iter()
                .filter_map(|a| a.email)
                .filter(|e| !e.is_empty())
                .collect(),
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::google_auth::tests::{mock_token_endpoint, test_credentials};
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_meetings_maps_events() {
        let server = MockServer::start_async().await;
        mock_token_endpoint(&server, "tok").await;
        let events = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/calendars/primary/events")
                    .query_param("singleEvents", "true")
                    .query_param("orderBy", "startTime")
                    .query_param("maxResults", "250")
                    .header("authorization", "Bearer tok");
                then.status(200).json_body(json!({"items": [
                    {
                        "id": "a",
                        "summary": "Client review",
                        "start": {"dateTime": "2025-03-03T10:00:00Z"},
                        "location": "Zoom",
                        "attendees": [{"email": "x@example.com"}, {}],
                        "creator": {"email": "boss@example.com"}
                    },
                    {"id": "b", "start": {"dateTime": "2025-03-03T11:00:00Z"}},
                    {
                        "id": "c",
                        "summary": "Offsite",
                        "start": {"date": "2025-03-04"},
                        "end": {"date": "2025-03-05"},
                        "organizer": {"email": "ops@example.com"}
                    }
                ]}));
            })
            .await;

        let config = CalendarConfig {
            endpoint: server.base_url(),
            ..CalendarConfig::default()
        };
        let auth = Arc::new(GoogleAuth::new(Client::new(), server.url("/token"), test_credentials()));
        let client = GoogleCalendarClient::new(Client::new(), config, auth);
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let meetings = client.meetings(now, now + Duration::days(7)).await.unwrap();

        events.assert_async().await;
        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].title, "Client review");
        assert_eq!(meetings[0].end_time - meetings[0].start_time, Duration::hours(1));
        assert_eq!(meetings[0].organizer, "boss@example.com");
        assert_eq!(meetings[0].attendees, vec!["x@example.com".to_string()]);
        assert_eq!(meetings[1].start_time, Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(meetings[1].organizer, "ops@example.com");
    }
}
