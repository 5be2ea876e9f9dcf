//! Activity events reported by a home's devices
//!
//! Events are tagged by their `type` field. Tags this crate does not know decode into
//! [`Event::Other`] so that new event kinds introduced by the backend never break a listing.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The kinds of event the backend is known to report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    /// A camera-equipped feeder saw movement
    MotionDetected,
    /// A meal was dispensed
    MealDispensed,
    /// A meal is about to be dispensed
    MealUpcoming,
    /// A meal was switched on
    MealEnabled,
    /// The feeder's food container is running low
    FoodLevelLow,
    /// The water filter is due for replacement
    FilterReplacementDue,
    /// The food outlet is blocked
    FoodOutletStuck,
    /// The device lost its connection
    DeviceOffline,
    /// The device regained its connection
    DeviceOnline,
}

impl EventType {
    /// Every known event type
    pub const ALL: [Self; 9] = [
        Self::MotionDetected,
        Self::MealDispensed,
        Self::MealUpcoming,
        Self::MealEnabled,
        Self::FoodLevelLow,
        Self::FilterReplacementDue,
        Self::FoodOutletStuck,
        Self::DeviceOffline,
        Self::DeviceOnline,
    ];

    /// The wire tag of the event type
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MotionDetected => "motion_detected",
            Self::MealDispensed => "meal_dispensed",
            Self::MealUpcoming => "meal_upcoming",
            Self::MealEnabled => "meal_enabled",
            Self::FoodLevelLow => "food_level_low",
            Self::FilterReplacementDue => "filter_replacement_due",
            Self::FoodOutletStuck => "food_outlet_stuck",
            Self::DeviceOffline => "device_offline",
            Self::DeviceOnline => "device_online",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tag is not one of the known [`EventType`]s
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown event type `{0}`")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_owned()))
    }
}

/// Fields present on every event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventCommon {
    /// The event identifier
    pub id: String,
    /// The component that raised the event
    pub source: String,
    /// When the event occurred, as reported by the backend
    pub time: String,
    /// The event resource
    pub url: String,
}

/// Movement seen by a feeder's camera
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MotionEvent {
    #[serde(flatten)]
    pub common: EventCommon,
    pub cluster_id: Option<String>,
    pub metadata: Option<Value>,
    pub thumbnail_key: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub product_ctn: Option<String>,
    pub device_external_id: Option<String>,
}

/// A meal dispensed, or about to be
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MealEvent {
    #[serde(flatten)]
    pub common: EventCommon,
    pub cluster_id: Option<String>,
    pub metadata: Option<Value>,
    pub meal_name: Option<String>,
    pub device_id: Option<String>,
    pub meal_url: Option<String>,
    pub meal_amount: Option<f64>,
    pub device_name: Option<String>,
    pub device_external_id: Option<String>,
    pub product_ctn: Option<String>,
}

/// A meal switched on, with its schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MealEnabledEvent {
    #[serde(flatten)]
    pub common: EventCommon,
    pub cluster_id: Option<String>,
    pub metadata: Option<Value>,
    pub meal_name: Option<String>,
    pub device_id: Option<String>,
    pub meal_url: Option<String>,
    pub meal_amount: Option<f64>,
    pub device_name: Option<String>,
    pub device_external_id: Option<String>,
    pub product_ctn: Option<String>,
    pub meal_time: Option<String>,
    pub meal_repeat_days: Option<Vec<u8>>,
}

/// A condition reported about a device
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct DeviceEvent {
    #[serde(flatten)]
    pub common: EventCommon,
    pub cluster_id: Option<String>,
    pub metadata: Option<Value>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub product_ctn: Option<String>,
    pub device_external_id: Option<String>,
}

/// An event of a kind this crate does not know
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericEvent {
    /// The unrecognized wire tag
    #[serde(rename = "type")]
    pub kind: String,
    /// The fields shared by all events
    #[serde(flatten)]
    pub common: EventCommon,
}

/// An event reported by one of a home's devices
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Event {
    MotionDetected(MotionEvent),
    MealDispensed(MealEvent),
    MealUpcoming(MealEvent),
    MealEnabled(MealEnabledEvent),
    FoodLevelLow(DeviceEvent),
    FilterReplacementDue(DeviceEvent),
    FoodOutletStuck(DeviceEvent),
    DeviceOffline(DeviceEvent),
    DeviceOnline(DeviceEvent),
    /// Any event whose tag is not a known [`EventType`]
    Other(GenericEvent),
}

impl Event {
    /// Decodes an event from its JSON representation
    ///
    /// # Errors
    ///
    /// Fails if the `type` tag is missing or not a string, or if the fields required by the
    /// tagged variant are missing. Unknown tags are not an error.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let tag = match value.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            _ => return Err(de::Error::missing_field("type")),
        };

        let event_type = match tag.parse::<EventType>() {
            Ok(event_type) => event_type,
            Err(_) => {
                tracing::warn!(event_type = %tag, "unknown event type, decoding as a generic event");
                return serde_json::from_value(value).map(Self::Other);
            }
        };

        let event = match event_type {
            EventType::MotionDetected => Self::MotionDetected(serde_json::from_value(value)?),
            EventType::MealDispensed => Self::MealDispensed(serde_json::from_value(value)?),
            EventType::MealUpcoming => Self::MealUpcoming(serde_json::from_value(value)?),
            EventType::MealEnabled => Self::MealEnabled(serde_json::from_value(value)?),
            EventType::FoodLevelLow => Self::FoodLevelLow(serde_json::from_value(value)?),
            EventType::FilterReplacementDue => {
                Self::FilterReplacementDue(serde_json::from_value(value)?)
            }
            EventType::FoodOutletStuck => Self::FoodOutletStuck(serde_json::from_value(value)?),
            EventType::DeviceOffline => Self::DeviceOffline(serde_json::from_value(value)?),
            EventType::DeviceOnline => Self::DeviceOnline(serde_json::from_value(value)?),
        };

        Ok(event)
    }

    /// The known type of the event, or `None` for [`Event::Other`]
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::MotionDetected(_) => Some(EventType::MotionDetected),
            Self::MealDispensed(_) => Some(EventType::MealDispensed),
            Self::MealUpcoming(_) => Some(EventType::MealUpcoming),
            Self::MealEnabled(_) => Some(EventType::MealEnabled),
            Self::FoodLevelLow(_) => Some(EventType::FoodLevelLow),
            Self::FilterReplacementDue(_) => Some(EventType::FilterReplacementDue),
            Self::FoodOutletStuck(_) => Some(EventType::FoodOutletStuck),
            Self::DeviceOffline(_) => Some(EventType::DeviceOffline),
            Self::DeviceOnline(_) => Some(EventType::DeviceOnline),
            Self::Other(_) => None,
        }
    }

    /// The wire tag of the event
    pub fn kind(&self) -> &str {
        match self {
            Self::Other(e) => &e.kind,
            known => known.event_type().map_or("", EventType::as_str),
        }
    }

    /// The fields shared by all events
    pub fn common(&self) -> &EventCommon {
        match self {
            Self::MotionDetected(e) => &e.common,
            Self::MealDispensed(e) | Self::MealUpcoming(e) => &e.common,
            Self::MealEnabled(e) => &e.common,
            Self::FoodLevelLow(e)
            | Self::FilterReplacementDue(e)
            | Self::FoodOutletStuck(e)
            | Self::DeviceOffline(e)
            | Self::DeviceOnline(e) => &e.common,
            Self::Other(e) => &e.common,
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    fn common(kind: &str) -> Value {
        json!({
            "id": "e1",
            "type": kind,
            "source": "feeder",
            "time": "2024-05-01T07:30:00Z",
            "url": "https://backend/api/homes/h/events/e1",
        })
    }

    fn with(mut base: Value, extra: Value) -> Value {
        if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
            base.extend(extra);
        }
        base
    }

    #[test]
    fn every_known_tag_round_trips_through_from_str() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.as_str().parse::<EventType>(), Ok(event_type));
        }
        assert_eq!(
            "something_new".parse::<EventType>(),
            Err(UnknownEventType("something_new".into()))
        );
    }

    #[test]
    fn motion_event_maps_camel_case_fields() {
        let value = with(
            common("motion_detected"),
            json!({
                "clusterId": "c1",
                "thumbnailKey": "k",
                "thumbnailUrl": "https://cdn/thumb.jpg",
                "deviceId": "d1",
                "deviceName": "Feeder",
                "productCtn": "PAW5320",
                "deviceExternalId": "x1",
                "metadata": {"confidence": 0.9},
            }),
        );

        let Event::MotionDetected(motion) = Event::from_value(value).unwrap() else {
            panic!("expected a motion event");
        };

        assert_eq!(motion.common.id, "e1");
        assert_eq!(motion.thumbnail_url.as_deref(), Some("https://cdn/thumb.jpg"));
        assert_eq!(motion.product_ctn.as_deref(), Some("PAW5320"));
        assert_eq!(motion.metadata, Some(json!({"confidence": 0.9})));
    }

    #[test]
    fn dispensed_and_upcoming_share_a_shape_but_not_a_variant() {
        let extra = json!({"mealName": "Breakfast", "mealAmount": 2, "mealUrl": "u"});

        let dispensed = Event::from_value(with(common("meal_dispensed"), extra.clone())).unwrap();
        let upcoming = Event::from_value(with(common("meal_upcoming"), extra)).unwrap();

        assert_eq!(dispensed.event_type(), Some(EventType::MealDispensed));
        assert_eq!(upcoming.event_type(), Some(EventType::MealUpcoming));
        match dispensed {
            Event::MealDispensed(meal) => assert_eq!(meal.meal_amount, Some(2.0)),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn meal_enabled_carries_schedule() {
        let value = with(
            common("meal_enabled"),
            json!({"mealTime": "07:30:00", "mealRepeatDays": [1, 2, 3]}),
        );

        let Event::MealEnabled(meal) = Event::from_value(value).unwrap() else {
            panic!("expected a meal-enabled event");
        };

        assert_eq!(meal.meal_time.as_deref(), Some("07:30:00"));
        assert_eq!(meal.meal_repeat_days, Some(vec![1, 2, 3]));
    }

    #[test]
    fn device_condition_tags_use_the_device_shape() {
        for tag in [
            "food_level_low",
            "filter_replacement_due",
            "food_outlet_stuck",
            "device_offline",
            "device_online",
        ] {
            let value = with(common(tag), json!({"deviceId": "d1"}));
            let event = Event::from_value(value).unwrap();

            assert_eq!(event.kind(), tag);
            assert_eq!(event.common().source, "feeder");
        }
    }

    #[test]
    #[traced_test]
    fn unknown_tag_decodes_as_generic_event() {
        let value = with(common("something_new"), json!({"novelField": 1}));

        let event = Event::from_value(value).unwrap();

        assert_eq!(
            event,
            Event::Other(GenericEvent {
                kind: "something_new".into(),
                common: EventCommon {
                    id: "e1".into(),
                    source: "feeder".into(),
                    time: "2024-05-01T07:30:00Z".into(),
                    url: "https://backend/api/homes/h/events/e1".into(),
                },
            })
        );
        assert_eq!(event.event_type(), None);
        assert!(logs_contain("unknown event type"));
        assert!(logs_contain("something_new"));
    }

    #[test]
    fn missing_common_field_is_an_error() {
        let mut value = common("device_online");
        value.as_object_mut().unwrap().remove("url");

        assert!(Event::from_value(value).is_err());
    }

    #[test]
    fn missing_tag_is_an_error() {
        let mut value = common("device_online");
        value.as_object_mut().unwrap().remove("type");

        assert!(Event::from_value(value).is_err());
    }

    #[test]
    fn deserializes_through_serde() {
        let events: Vec<Event> =
            serde_json::from_value(json!([common("device_online"), common("brand_new")])).unwrap();

        assert_eq!(events[0].event_type(), Some(EventType::DeviceOnline));
        assert_eq!(events[1].kind(), "brand_new");
    }
}
