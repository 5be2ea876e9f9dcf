use petsseries_auth::clock::Clock;

use super::PetsSeriesClient;
use crate::{
    models::{Consumer, Home, User},
    Result,
};

impl<C: Clock> PetsSeriesClient<C> {
    /// Fetches the signed-in user's profile from the userinfo endpoint
    #[tracing::instrument(err, skip(self))]
    pub async fn get_user_info(&self) -> Result<User> {
        self.get_json(self.endpoints.user_info.clone()).await
    }

    /// Fetches the consumer account behind the signed-in user
    #[tracing::instrument(err, skip(self))]
    pub async fn get_consumer(&self) -> Result<Consumer> {
        self.get_json(self.endpoints.consumer.clone()).await
    }

    /// Lists the homes the signed-in user can access
    #[tracing::instrument(err, skip(self))]
    pub async fn get_homes(&self) -> Result<Vec<Home>> {
        let homes: Vec<Home> = self.get_json(self.endpoints.homes.clone()).await?;
        tracing::debug!(count = homes.len(), "fetched homes");
        Ok(homes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use petsseries_auth::{
        clock::TestClock,
        store::{CredentialRecord, InMemoryCredentialStore},
    };
    use reqwest::Method;

    use super::*;
    use crate::test_support::{jwt, MockBackend, NOW};

    fn client(backend: &Arc<MockBackend>) -> PetsSeriesClient<TestClock> {
        PetsSeriesClient::builder()
            .config(backend.config())
            .credential_store(InMemoryCredentialStore::with_record(CredentialRecord::new(
                jwt("feeder-app", NOW.plus_secs(3600)),
                "r1",
            )))
            .clock(TestClock::new(NOW))
            .with_arc(backend.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn user_info_comes_from_the_identity_provider() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            Method::GET,
            "/oidc/userinfo",
            200,
            r#"{"sub":"u1","name":"Ada Lovelace","given_name":"Ada","email":"ada@example.com","locale":"en-GB"}"#,
        );

        let user = client(&backend).get_user_info().await.unwrap();

        assert_eq!(user.given_name, "Ada");
        assert_eq!(user.locale.as_deref(), Some("en-GB"));
        assert_eq!(user.picture, None);
    }

    #[tokio::test]
    async fn consumer_maps_country_code() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            Method::GET,
            "/api/petsseries/consumer",
            200,
            r#"{"id":"c1","countryCode":"NL","url":"https://petsseries.test/consumer/c1"}"#,
        );

        let consumer = client(&backend).get_consumer().await.unwrap();

        assert_eq!(consumer.country_code, "NL");
    }

    #[tokio::test]
    async fn homes_endpoint_returns_a_bare_array() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            Method::GET,
            "/api/v1/home-management/available-homes",
            200,
            r#"[
                {"id":"h1","name":"Home","shared":false,"numberOfDevices":2,"externalId":"x1","numberOfActivities":14},
                {"id":"h2","name":"Cabin","shared":true,"numberOfDevices":0,"externalId":"x2","numberOfActivities":0}
            ]"#,
        );

        let homes = client(&backend).get_homes().await.unwrap();

        assert_eq!(homes.len(), 2);
        assert_eq!(homes[0].number_of_devices, 2);
        assert!(homes[1].shared);
    }
}
