use chrono::{Duration, Utc};
use clap::Parser;
use petsseries::{Config, EventType, PetsSeriesClient};

#[derive(Debug, Parser)]
struct Opts {
    /// An access token to seed the credential file with
    #[arg(long, env = "PETSSERIES_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// A refresh token to seed the credential file with
    #[arg(long, env = "PETSSERIES_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// The local file used to persist credentials
    #[arg(short = 'f', long, env, default_value = "tokens.json")]
    credentials_file: std::path::PathBuf,

    /// How many hours of events to list
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// Only list events of this type
    #[arg(short = 't', long)]
    event_type: Option<EventType>,

    /// Flip the power state of this device
    #[arg(long)]
    toggle_power: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut builder = PetsSeriesClient::builder()
        .config(Config::default())
        .credential_file(opts.credentials_file);
    if let (Some(access), Some(refresh)) = (opts.access_token, opts.refresh_token) {
        builder = builder.tokens(access, refresh);
    }
    let client = builder.build()?;
    client.initialize().await?;

    let user = client.get_user_info().await?;
    tracing::info!(name = %user.name, email = %user.email, "signed in");

    let to = Utc::now();
    let from = to - Duration::hours(opts.hours);

    for home in client.get_homes().await? {
        tracing::info!(home = %home.name, devices = home.number_of_devices, "home");

        for device in client.get_devices(&home).await? {
            let settings = client.get_settings(&home, &device.id).await?;
            tracing::info!(
                device = %device.name,
                active = ?settings.get("device_active"),
                "device"
            );

            if opts.toggle_power.as_deref() == Some(device.id.as_str()) {
                let on = client.toggle_device_power(&home, &device.id).await?;
                tracing::info!(device = %device.name, on, "toggled power");
            }
        }

        for meal in client.get_meals(&home).await? {
            tracing::info!(
                meal = %meal.name,
                at = %meal.feed_time,
                portions = meal.portion_amount,
                enabled = meal.enabled,
                "meal"
            );
        }

        for event in client
            .get_events(&home, from, to, opts.event_type)
            .await?
        {
            tracing::info!(kind = event.kind(), time = %event.common().time, "event");
        }
    }

    client.close();
    Ok(())
}
