use std::collections::BTreeMap;

use petsseries_auth::clock::Clock;
use reqwest::Method;
use serde_json::{json, Value};

use super::PetsSeriesClient;
use crate::{
    models::{Device, DeviceSetting, Home, ModeDevice, Setting},
    Error, Result,
};

impl<C: Clock> PetsSeriesClient<C> {
    /// Lists the devices registered to `home`
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn get_devices(&self, home: &Home) -> Result<Vec<Device>> {
        let url = self.endpoints.home(&home.id, &["devices"])?;
        self.get_items(url).await
    }

    /// Lists the devices of `home` together with their settings in the home mode
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn get_mode_devices(&self, home: &Home) -> Result<Vec<ModeDevice>> {
        let url = self.endpoints.home(&home.id, &["modes", "home", "devices"])?;
        self.get_items(url).await
    }

    /// Reads a device's settings as plain `key → value` pairs
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DeviceNotFound`] if the home does not list the device.
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn get_settings(&self, home: &Home, device_id: &str) -> Result<BTreeMap<String, Value>> {
        let devices = self.get_mode_devices(home).await?;

        let Some(device) = devices.iter().find(|d| d.id == device_id) else {
            tracing::warn!("no settings found for device");
            return Err(Error::DeviceNotFound(device_id.to_owned()));
        };

        Ok(device.flattened_settings())
    }

    /// Writes the given settings of a device, leaving the others unchanged
    #[tracing::instrument(err, skip(self, home, settings), fields(home.id = %home.id))]
    pub async fn update_device_settings(
        &self,
        home: &Home,
        device_id: &str,
        settings: BTreeMap<String, Setting>,
    ) -> Result<()> {
        let url = self
            .endpoints
            .home(&home.id, &["modes", "home", "devices", device_id])?;

        self.execute(Method::PATCH, url, Some(json!({ "settings": settings })))
            .await?;
        tracing::info!("updated device settings");
        Ok(())
    }

    /// Writes a single boolean setting
    pub async fn set_device_setting(
        &self,
        home: &Home,
        device_id: &str,
        setting: DeviceSetting,
        value: bool,
    ) -> Result<()> {
        tracing::info!(device.id = device_id, %setting, value, "changing device setting");
        let settings = BTreeMap::from([(setting.key().to_owned(), Setting::new(value))]);
        self.update_device_settings(home, device_id, settings).await
    }

    /// Flips a boolean setting, treating an absent setting as `false`
    ///
    /// Returns the value written.
    pub async fn toggle_device_setting(
        &self,
        home: &Home,
        device_id: &str,
        setting: DeviceSetting,
    ) -> Result<bool> {
        let current = self
            .get_settings(home, device_id)
            .await?
            .get(setting.key())
            .and_then(Value::as_bool)
            .unwrap_or(false);

        self.set_device_setting(home, device_id, setting, !current)
            .await?;
        Ok(!current)
    }

    /// Powers a device on
    pub async fn power_on_device(&self, home: &Home, device_id: &str) -> Result<()> {
        self.set_device_setting(home, device_id, DeviceSetting::DeviceActive, true)
            .await
    }

    /// Powers a device off
    pub async fn power_off_device(&self, home: &Home, device_id: &str) -> Result<()> {
        self.set_device_setting(home, device_id, DeviceSetting::DeviceActive, false)
            .await
    }

    /// Flips a device's power state, returning the new state
    pub async fn toggle_device_power(&self, home: &Home, device_id: &str) -> Result<bool> {
        self.toggle_device_setting(home, device_id, DeviceSetting::DeviceActive)
            .await
    }

    /// Turns on push notifications for motion seen by a device
    pub async fn enable_motion_notifications(&self, home: &Home, device_id: &str) -> Result<()> {
        self.set_device_setting(home, device_id, DeviceSetting::PushNotificationMotion, true)
            .await
    }

    /// Turns off push notifications for motion seen by a device
    pub async fn disable_motion_notifications(&self, home: &Home, device_id: &str) -> Result<()> {
        self.set_device_setting(home, device_id, DeviceSetting::PushNotificationMotion, false)
            .await
    }

    /// Flips motion notifications for a device, returning the new state
    pub async fn toggle_motion_notifications(&self, home: &Home, device_id: &str) -> Result<bool> {
        self.toggle_device_setting(home, device_id, DeviceSetting::PushNotificationMotion)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use petsseries_auth::{
        clock::TestClock,
        store::{CredentialRecord, InMemoryCredentialStore},
    };

    use super::*;
    use crate::test_support::{jwt, MockBackend, NOW};

    const MODE_DEVICES: &str = "/api/homes/h1/modes/home/devices";
    const DEVICE: &str = "/api/homes/h1/modes/home/devices/d1";

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

    fn home() -> Home {
        Home {
            id: "h1".into(),
            name: "Home".into(),
            shared: false,
            number_of_devices: 1,
            external_id: "x1".into(),
            number_of_activities: 0,
        }
    }

    fn mode_devices(settings: Value) -> String {
        json!({"item": [{"id": "d1", "name": "Feeder", "settings": settings}]}).to_string()
    }

    #[tokio::test]
    async fn lists_devices() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            Method::GET,
            "/api/homes/h1/devices",
            200,
            json!({"item": [{
                "id": "d1",
                "name": "Feeder",
                "productCtn": "PAW5320",
                "productId": "p1",
                "externalId": "x1",
                "url": "u",
                "settingsUrl": "s",
                "subscriptionUrl": "sub",
            }]})
            .to_string(),
        );

        let devices = client(&backend).get_devices(&home()).await.unwrap();

        assert_eq!(devices[0].product_ctn, "PAW5320");
        assert_eq!(devices[0].settings_url, "s");
    }

    #[tokio::test]
    async fn settings_are_flattened() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            Method::GET,
            MODE_DEVICES,
            200,
            mode_devices(json!({"device_active": {"value": true}, "food_level": {"value": 40}})),
        );

        let settings = client(&backend).get_settings(&home(), "d1").await.unwrap();

        assert_eq!(settings["device_active"], json!(true));
        assert_eq!(settings["food_level"], json!(40));
    }

    #[tokio::test]
    async fn settings_for_unknown_device_is_not_found() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(Method::GET, MODE_DEVICES, 200, mode_devices(json!({})));

        let err = client(&backend)
            .get_settings(&home(), "nope")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DeviceNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn toggle_power_negates_current_value() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(
            Method::GET,
            MODE_DEVICES,
            200,
            mode_devices(json!({"device_active": {"value": true}})),
        );
        backend.respond(Method::PATCH, DEVICE, 204, "");

        let now_on = client(&backend)
            .toggle_device_power(&home(), "d1")
            .await
            .unwrap();

        assert!(!now_on);
        let request = backend.last_backend_request().unwrap();
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(
            request.json(),
            json!({"settings": {"device_active": {"value": false}}})
        );
    }

    #[tokio::test]
    async fn toggle_treats_absent_setting_as_off() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(Method::GET, MODE_DEVICES, 200, mode_devices(json!({})));
        backend.respond(Method::PATCH, DEVICE, 204, "");

        let now_on = client(&backend)
            .toggle_motion_notifications(&home(), "d1")
            .await
            .unwrap();

        assert!(now_on);
        assert_eq!(
            backend.last_backend_request().unwrap().json(),
            json!({"settings": {"push_notification_motion": {"value": true}}})
        );
    }

    #[tokio::test]
    async fn power_and_notification_switches_patch_one_key() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(Method::PATCH, DEVICE, 204, "");
        let client = client(&backend);

        client.power_off_device(&home(), "d1").await.unwrap();
        let off = backend.last_backend_request().unwrap().json();
        client.enable_motion_notifications(&home(), "d1").await.unwrap();
        let motion = backend.last_backend_request().unwrap().json();

        assert_eq!(off, json!({"settings": {"device_active": {"value": false}}}));
        assert_eq!(
            motion,
            json!({"settings": {"push_notification_motion": {"value": true}}})
        );
    }

    #[tokio::test]
    async fn rejected_settings_update_is_remote_error() {
        let backend = Arc::new(MockBackend::new());
        backend.respond(Method::PATCH, DEVICE, 403, "forbidden");

        let err = client(&backend)
            .power_on_device(&home(), "d1")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(reqwest::StatusCode::FORBIDDEN));
        assert_eq!(backend.calls(Method::PATCH, DEVICE), 1);
    }
}
