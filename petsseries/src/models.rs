//! Records exchanged with the PetsSeries backend
//!
//! Field names follow Rust conventions; the wire format uses camelCase.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Every day of the week, Monday (`1`) through Sunday (`7`)
pub const ALL_WEEK: [u8; 7] = [1, 2, 3, 4, 5, 6, 7];

fn all_week() -> Vec<u8> {
    ALL_WEEK.to_vec()
}

fn enabled_by_default() -> bool {
    true
}

/// The signed-in user, as reported by the userinfo endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The subject identifier
    pub sub: String,
    /// The user's full name
    pub name: String,
    /// The user's given name
    pub given_name: String,
    /// A link to the user's picture
    #[serde(default)]
    pub picture: Option<String>,
    /// The user's locale
    #[serde(default)]
    pub locale: Option<String>,
    /// The user's email address
    pub email: String,
}

/// The consumer account that owns the user's homes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    /// The consumer identifier
    pub id: String,
    /// The consumer's country
    pub country_code: String,
    /// The consumer resource
    pub url: String,
}

/// A home that groups devices and their schedules
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Home {
    /// The home identifier
    pub id: String,
    /// The home's display name
    pub name: String,
    /// Whether the home is shared with the user by someone else
    pub shared: bool,
    /// The number of devices in the home
    pub number_of_devices: u32,
    /// The home's identifier in the discovery service
    pub external_id: String,
    /// The number of activities recorded for the home
    pub number_of_activities: u32,
}

/// A scheduled feeding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    /// The meal identifier
    pub id: String,
    /// The meal's display name
    pub name: String,
    /// The portion dispensed, in the feeder's portion units
    pub portion_amount: f64,
    /// The time of day of the feeding, as `HH:MM:SS`
    pub feed_time: String,
    /// The days on which the meal is dispensed, Monday (`1`) through Sunday (`7`)
    #[serde(default = "all_week")]
    pub repeat_days: Vec<u8>,
    /// The feeder that dispenses the meal
    pub device_id: String,
    /// Whether the meal is currently scheduled
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// The meal resource
    pub url: String,
}

/// A meal to be scheduled
#[derive(Clone, Debug, PartialEq)]
pub struct NewMeal {
    /// The meal's display name
    pub name: String,
    /// The portion to dispense
    pub portion_amount: f64,
    /// The time of day of the feeding
    pub feed_time: NaiveTime,
    /// The feeder that dispenses the meal
    pub device_id: String,
    /// The days on which to dispense the meal; every day when absent or empty
    pub repeat_days: Option<Vec<u8>>,
}

impl NewMeal {
    /// A meal dispensed every day of the week
    pub fn new(
        name: impl Into<String>,
        portion_amount: f64,
        feed_time: NaiveTime,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            portion_amount,
            feed_time,
            device_id: device_id.into(),
            repeat_days: None,
        }
    }

    /// Restricts the meal to the given days
    pub fn on_days(mut self, days: impl Into<Vec<u8>>) -> Self {
        self.repeat_days = Some(days.into());
        self
    }

    pub(crate) fn repeat_days(&self) -> Vec<u8> {
        self.repeat_days
            .clone()
            .filter(|days| !days.is_empty())
            .unwrap_or_else(all_week)
    }

    pub(crate) fn feed_time_wire(&self) -> String {
        self.feed_time.format("%H:%M:%S").to_string()
    }
}

/// A device registered to a home
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// The device identifier
    pub id: String,
    /// The device's display name
    pub name: String,
    /// The commercial type number of the product
    pub product_ctn: String,
    /// The product identifier
    pub product_id: String,
    /// The device's identifier in the discovery service
    pub external_id: String,
    /// The device resource
    pub url: String,
    /// The device's settings resource
    pub settings_url: String,
    /// The device's subscription resource
    pub subscription_url: String,
}

/// A single device setting, as the backend wraps it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// The setting's value
    pub value: serde_json::Value,
}

impl Setting {
    /// Wraps `value`
    pub fn new(value: impl Into<serde_json::Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A device together with its settings in the home's current mode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeDevice {
    /// The device identifier
    pub id: String,
    /// The device's display name
    pub name: String,
    /// The device's settings, by key
    #[serde(default)]
    pub settings: BTreeMap<String, Setting>,
}

impl ModeDevice {
    /// The settings with their wrappers removed
    pub fn flattened_settings(&self) -> BTreeMap<String, serde_json::Value> {
        self.settings
            .iter()
            .map(|(key, setting)| (key.clone(), setting.value.clone()))
            .collect()
    }
}

/// A boolean device setting the client knows how to switch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceSetting {
    /// Whether the device is powered on
    DeviceActive,
    /// Whether motion events raise push notifications
    PushNotificationMotion,
}

impl DeviceSetting {
    /// The setting's wire key
    pub const fn key(self) -> &'static str {
        match self {
            Self::DeviceActive => "device_active",
            Self::PushNotificationMotion => "push_notification_motion",
        }
    }
}

impl fmt::Display for DeviceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The `{"item": [...]}` envelope around list responses
#[derive(Deserialize)]
pub(crate) struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub(crate) item: Vec<T>,
}
