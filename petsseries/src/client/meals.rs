use petsseries_auth::clock::Clock;
use reqwest::{header, Method};
use serde_json::json;

use super::PetsSeriesClient;
use crate::{
    models::{Home, Meal, NewMeal, ALL_WEEK},
    Error, Result,
};

impl<C: Clock> PetsSeriesClient<C> {
    /// Lists the meals scheduled in `home`
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn get_meals(&self, home: &Home) -> Result<Vec<Meal>> {
        let url = self.endpoints.home(&home.id, &["meals"])?;
        self.get_items(url).await
    }

    /// Schedules a new meal
    ///
    /// The backend acknowledges with `201 Created` and a `Location` header and no body; the
    /// returned record is assembled from `meal` and the new meal's location. If the backend
    /// omits the location, the record's `id` and `url` are empty.
    #[tracing::instrument(err, skip(self, home, meal), fields(home.id = %home.id, meal.name = %meal.name))]
    pub async fn create_meal(&self, home: &Home, meal: &NewMeal) -> Result<Meal> {
        let url = self.endpoints.home(&home.id, &["meals"])?;
        let repeat_days = meal.repeat_days();
        let feed_time = meal.feed_time_wire();

        let payload = json!({
            "deviceId": meal.device_id,
            "feedTime": feed_time,
            "name": meal.name,
            "portionAmount": meal.portion_amount,
            "repeatDays": repeat_days,
        });

        let reply = self.execute(Method::POST, url, Some(payload)).await?;

        let location = reply
            .headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let (id, url) = match location {
            Some(location) => (meal_id_from_location(&location), location),
            None => {
                tracing::error!(status = %reply.status, "meal created without a Location header");
                (String::new(), String::new())
            }
        };

        tracing::info!(meal.id = %id, "created meal");

        Ok(Meal {
            id,
            name: meal.name.clone(),
            portion_amount: meal.portion_amount,
            feed_time,
            repeat_days,
            device_id: meal.device_id.clone(),
            enabled: true,
            url,
        })
    }

    /// Changes the name, portion, time and schedule of an existing meal
    ///
    /// Returns the meal as stored by the backend.
    #[tracing::instrument(err, skip(self, home, meal), fields(home.id = %home.id, meal.id = %meal.id))]
    pub async fn update_meal(&self, home: &Home, meal: &Meal) -> Result<Meal> {
        if meal.id.is_empty() {
            tracing::error!("cannot update a meal without an identifier");
            return Err(Error::MissingMealId);
        }

        let url = self.endpoints.home(&home.id, &["meals", meal.id.as_str()])?;
        let repeat_days = if meal.repeat_days.is_empty() {
            &ALL_WEEK[..]
        } else {
            &meal.repeat_days[..]
        };
        let payload = json!({
            "name": meal.name,
            "portionAmount": meal.portion_amount,
            "feedTime": meal.feed_time,
            "repeatDays": repeat_days,
        });

        let updated: Meal = self.execute(Method::PATCH, url, Some(payload)).await?.json()?;
        tracing::info!("updated meal");
        Ok(updated)
    }

    /// Switches a meal on or off without changing its schedule
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn set_meal_enabled(&self, home: &Home, meal_id: &str, enabled: bool) -> Result<()> {
        if meal_id.is_empty() {
            return Err(Error::MissingMealId);
        }

        let url = self.endpoints.home(&home.id, &["meals", meal_id])?;
        self.execute(Method::PATCH, url, Some(json!({ "enabled": enabled })))
            .await?;
        tracing::info!("changed meal state");
        Ok(())
    }

    /// Switches a meal on
    pub async fn enable_meal(&self, home: &Home, meal_id: &str) -> Result<()> {
        self.set_meal_enabled(home, meal_id, true).await
    }

    /// Switches a meal off
    pub async fn disable_meal(&self, home: &Home, meal_id: &str) -> Result<()> {
        self.set_meal_enabled(home, meal_id, false).await
    }

    /// Removes a meal from the schedule
    #[tracing::instrument(err, skip(self, home), fields(home.id = %home.id))]
    pub async fn delete_meal(&self, home: &Home, meal_id: &str) -> Result<()> {
        if meal_id.is_empty() {
            return Err(Error::MissingMealId);
        }

        let url = self.endpoints.home(&home.id, &["meals", meal_id])?;
        self.execute(Method::DELETE, url, None).await?;
        tracing::info!("deleted meal");
        Ok(())
    }
}

/// The last non-empty path segment of a `Location` header
fn meal_id_from_location(location: &str) -> String {
    let path = match url::Url::parse(location) {
        Ok(url) => url.path().to_owned(),
        Err(_) => location.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };

    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_owned()
}
