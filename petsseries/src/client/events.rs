use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone};
use petsseries_auth::clock::Clock;

use super::PetsSeriesClient;
use crate::{events::Event, models::Home, EventType, Result};

impl<C: Clock> PetsSeriesClient<C> {
    /// Lists the events of `home` that occurred between `from` and `to`
    ///
    /// When `filter` is given, only events of that type are requested.
    #[tracing::instrument(err, skip(self, home, from, to), fields(home.id = %home.id))]
    pub async fn get_events<Tz: TimeZone>(
        &self,
        home: &Home,
        from: DateTime<Tz>,
        to: DateTime<Tz>,
        filter: Option<EventType>,
    ) -> Result<Vec<Event>>
    where
        Tz::Offset: fmt::Display + Send + Sync,
    {
        let mut url = self.endpoints.home(&home.id, &["events"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("from", &from.to_rfc3339_opts(SecondsFormat::AutoSi, false))
                .append_pair("to", &to.to_rfc3339_opts(SecondsFormat::AutoSi, false))
                .append_pair("clustered", "true");
            if let Some(event_type) = filter {
                query.append_pair("types", event_type.as_str());
            }
        }

        let events: Vec<Event> = self.get_items(url).await?;
        tracing::debug!(count = events.len(), "fetched events");
        Ok(events)
    }

    /// Fetches a single event
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn get_event(&self, home: &Home, event_id: &str) -> Result<Event> {
        let url = self.endpoints.home(&home.id, &["events", event_id])?;
        self.get_json(url).await
    }
}
