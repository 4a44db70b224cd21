use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use engage_providers::{
    ActorRef, AnalyticsProvider, BloomreachAnalyticsProvider, BloomreachNotificationProvider,
    NotificationProvider, ProviderNotification, ProviderOptions, TrackEvent, client_from_options,
    validate_analytics_options, validate_options,
};
use engage_sdk::EngagementApi;
use engage_sdk::testkit::{RecordedCall, RecordingApi};
use engage_subscribers::{EventSubscriber, Fixtures, InMemoryEntityQuery};
use serde_json::{Map, Value};

const CLI_DRY_RUN_ENV: &str = "ENGAGE_CLI_DRY_RUN";

#[tokio::main]
async fn main() -> Result<()> {
    engage_telemetry::install("engage-cli")?;
    let cli = Cli::parse();
    let options = load_options(cli.config.as_deref())?;

    // validate never talks to the platform, so it must not need a usable client
    if let CliCommand::Validate = cli.command {
        return handle_validate(&options);
    }
    let backend = Backend::new(&options, cli.timeout_secs)?;

    match cli.command {
        CliCommand::Validate => {}
        CliCommand::Send {
            channel,
            to,
            template,
            data,
        } => handle_send(&backend, options, channel, to, template, data).await?,
        CliCommand::Track {
            event,
            actor,
            actor_type,
            group,
            properties,
        } => handle_track(&backend, &options, event, actor, actor_type, group, properties).await?,
        CliCommand::Dispatch {
            event,
            id,
            fixtures,
        } => handle_dispatch(&backend, options, &event, &id, &fixtures).await?,
    }
    backend.print_recorded().await
}

#[derive(Parser, Debug)]
#[command(
    name = "engage",
    version,
    about = "Operator CLI for the commerce engagement bridge"
)]
struct Cli {
    /// Provider options file (YAML or JSON). Falls back to BLOOMREACH_* variables.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// HTTP timeout for platform calls.
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Check the provider options and print a summary
    Validate,
    /// Send a notification through the configured template mappings
    Send {
        #[arg(long, value_enum, default_value_t = Channel::Email)]
        channel: Channel,
        /// Email address or phone number.
        #[arg(long)]
        to: String,
        /// Abstract template name, e.g. order-placed.
        #[arg(long)]
        template: String,
        /// Template params as a JSON object.
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// Track an event on a customer profile
    Track {
        #[arg(long)]
        event: String,
        /// Actor id; combined with --actor-type it becomes a typed reference.
        #[arg(long)]
        actor: Option<String>,
        #[arg(long, requires = "actor")]
        actor_type: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Event properties as a JSON object.
        #[arg(long, value_name = "JSON")]
        properties: Option<String>,
    },
    /// Replay a commerce event against entities loaded from a fixture file
    Dispatch {
        /// Bus event name, e.g. order.placed.
        #[arg(long)]
        event: String,
        #[arg(long)]
        id: String,
        #[arg(long, value_name = "PATH")]
        fixtures: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Channel {
    Email,
    Sms,
}

impl Channel {
    fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => engage_providers::CHANNEL_EMAIL,
            Channel::Sms => engage_providers::CHANNEL_SMS,
        }
    }
}

/// Live platform client, or a recorder when dry-run is enabled.
struct Backend {
    api: Arc<dyn EngagementApi>,
    recording: Option<RecordingApi>,
}

impl Backend {
    fn new(options: &ProviderOptions, timeout_secs: u64) -> Result<Self> {
        if cli_dry_run() {
            let recording = RecordingApi::with_message_id("dry-run");
            tracing::debug!("dry-run enabled, platform calls are recorded instead of sent");
            return Ok(Self {
                api: Arc::new(recording.clone()),
                recording: Some(recording),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            api: Arc::new(client_from_options(http, options)?),
            recording: None,
        })
    }

    async fn print_recorded(&self) -> Result<()> {
        let Some(recording) = &self.recording else {
            return Ok(());
        };
        for call in recording.calls().await {
            let (path, body) = match call {
                RecordedCall::Email { project_id, email } => (
                    format!("/email/v2/projects/{project_id}/sync"),
                    email.body(),
                ),
                RecordedCall::Sms { project_id, sms } => {
                    (format!("/sms/v1/projects/{project_id}/sync"), sms.body())
                }
                RecordedCall::Event { project_id, event } => (
                    format!("/track/v2/projects/{project_id}/customers/events"),
                    serde_json::to_value(&event)?,
                ),
            };
            println!("dry-run: POST {path} {body}");
        }
        Ok(())
    }
}

fn load_options(path: Option<&Path>) -> Result<ProviderOptions> {
    let options = match path {
        Some(path) => ProviderOptions::from_path(path)?,
        None => ProviderOptions::from_env()?,
    };
    Ok(options)
}

fn handle_validate(options: &ProviderOptions) -> Result<()> {
    validate_options(options)?;
    validate_analytics_options(options)?;
    let n = &options.notifications;
    println!("Configuration ok");
    println!("  project      : {}", n.project_id);
    println!("  integration  : {}", n.integration_id);
    println!("  sender       : {} <{}>", n.from_name, n.from_email);
    match n.from_sms() {
        Some(sender) => println!("  sms sender   : {sender}"),
        None => println!("  sms sender   : (not set, SMS sends will fail)"),
    }

    let mut templates: Vec<_> = n.template_mappings.keys().collect();
    templates.sort();
    if templates.is_empty() {
        println!("  templates    : (none, every notification will be skipped)");
    }
    for template in templates {
        match n.mapping_for(template) {
            Some((id, campaign)) => println!("  template     : {template} -> {id} ({campaign})"),
            None => println!("  template     : {template} -> (incomplete mapping, skipped)"),
        }
    }
    Ok(())
}

async fn handle_send(
    backend: &Backend,
    options: ProviderOptions,
    channel: Channel,
    to: String,
    template: String,
    data: Option<String>,
) -> Result<()> {
    let provider = BloomreachNotificationProvider::new(backend.api.clone(), options)?;
    let notification = ProviderNotification {
        to,
        channel: channel.as_str().to_string(),
        template,
        data: data.as_deref().map(|raw| parse_object("--data", raw)).transpose()?,
    };
    let result = provider.send(&notification).await?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

async fn handle_track(
    backend: &Backend,
    options: &ProviderOptions,
    event: String,
    actor: Option<String>,
    actor_type: Option<String>,
    group: Option<String>,
    properties: Option<String>,
) -> Result<()> {
    let provider = BloomreachAnalyticsProvider::new(backend.api.clone(), options)?;
    let actor_id = match (actor_type, actor) {
        (Some(kind), Some(id)) => Some(ActorRef::reference(kind, id)),
        (None, Some(id)) => Some(ActorRef::Id(id)),
        _ => None,
    };
    let track = TrackEvent {
        event,
        actor_id,
        group: group.map(ActorRef::Id),
        properties: properties
            .as_deref()
            .map(|raw| parse_object("--properties", raw))
            .transpose()?,
    };
    provider.track(&track).await?;
    if track.identifier().is_some() {
        println!("tracked {}", track.event);
    } else {
        println!("skipped {} (no actor or group)", track.event);
    }
    Ok(())
}

async fn handle_dispatch(
    backend: &Backend,
    options: ProviderOptions,
    event: &str,
    id: &str,
    fixtures: &Path,
) -> Result<()> {
    let raw = fs::read_to_string(fixtures)
        .with_context(|| format!("failed to read fixtures {}", fixtures.display()))?;
    let fixtures: Fixtures = serde_yaml_bw::from_str(&raw)
        .with_context(|| format!("invalid fixtures {}", fixtures.display()))?;
    let query = InMemoryEntityQuery::from_fixtures(fixtures).await;

    let analytics = BloomreachAnalyticsProvider::new(backend.api.clone(), &options)?;
    let notifications = BloomreachNotificationProvider::new(backend.api.clone(), options)?;
    let subscriber = EventSubscriber::new(
        Arc::new(query),
        Arc::new(notifications) as Arc<dyn NotificationProvider>,
        Arc::new(analytics) as Arc<dyn AnalyticsProvider>,
    );

    let outcome = subscriber
        .dispatch(event, &serde_json::json!({ "id": id }))
        .await
        .ok_or_else(|| anyhow!("event {event} is not handled by the subscriber"))?;
    println!("event        : {} {}", outcome.event, outcome.entity_id);
    println!("notification : {}", outcome.notification);
    println!("tracking     : {}", outcome.tracking);
    Ok(())
}

fn parse_object(flag: &str, raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).with_context(|| format!("{flag} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("{flag} must be a JSON object, got {other}")),
    }
}

fn cli_dry_run() -> bool {
    env::var(CLI_DRY_RUN_ENV)
        .map(|value| parse_truthy(&value))
        .unwrap_or(false)
}

fn parse_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
