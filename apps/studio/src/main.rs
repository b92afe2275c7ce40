use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::normalize_database_url,
    load_settings,
    runtime::{command_channel, drive_until_settled, spawn_worker, DEFAULT_COMMAND_CAPACITY},
    DryRunPrintClient, HttpStudioClient, Orchestrator, OrchestratorConfig, Outcome, PrintClient,
    WorkflowEvent,
};
use composer::{Composer, Point, Viewport};
use shared::domain::{ConversationMessage, GenerationStyle, MessageId, PrintJob, Role};
use storage::SqliteStore;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "plotter-studio", about = "Turn prompts into line drawings and send them to a pen plotter")]
struct Cli {
    /// Studio backend base url; overrides studio.toml and env.
    #[arg(long, global = true)]
    endpoint: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Log print jobs instead of sending them to the plotter.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Generate {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        #[arg(long, default_value = "icon")]
        style: GenerationStyle,
    },
    /// Replay the prompt behind a previous message.
    Regenerate { message_id: i64 },
    History,
    Health,
    Print {
        #[arg(long, conflicts_with = "message_id")]
        image_url: Option<String>,
        #[arg(long)]
        message_id: Option<i64>,
        /// Composer viewport in pixels, e.g. 1280x800.
        #[arg(long, value_parser = parse_viewport)]
        viewport: Option<Viewport>,
        /// Move the image by DX,DY workspace pixels.
        #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
        drag: Option<Point>,
        /// Drag the resize handle horizontally by DX pixels.
        #[arg(long, allow_hyphen_values = true)]
        resize: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        rotate: Option<f64>,
        /// Send the job without stopping at the confirmation step.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(endpoint) = cli.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = normalize_database_url(&database_url);
    }

    let client = Arc::new(HttpStudioClient::with_timeout(
        &settings.endpoint,
        settings.request_timeout(),
    )?);

    let store = Arc::new(SqliteStore::new(&settings.database_url).await?);
    let printer: Arc<dyn PrintClient> = if cli.dry_run {
        Arc::new(DryRunPrintClient)
    } else {
        client.clone()
    };
    let (command_tx, command_rx) = command_channel(DEFAULT_COMMAND_CAPACITY);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let worker = spawn_worker(client.clone(), printer, command_rx, event_tx);

    let mut config = OrchestratorConfig::default();
    if let Command::Print {
        viewport: Some(viewport),
        ..
    } = &cli.command
    {
        config.viewport = *viewport;
    }
    let mut orchestrator = Orchestrator::init(store.clone(), command_tx, config).await;

    match cli.command {
        Command::Generate { prompt, style } => {
            let prompt = prompt.join(" ");
            if orchestrator.submit_prompt(&prompt, style).await? == Outcome::Ignored {
                bail!("prompt is empty");
            }
            settle_and_show_reply(&mut orchestrator, &mut event_rx).await?;
        }
        Command::Regenerate { message_id } => {
            orchestrator.regenerate(MessageId(message_id)).await?;
            settle_and_show_reply(&mut orchestrator, &mut event_rx).await?;
        }
        Command::History => {
            if orchestrator.messages().is_empty() {
                println!("no conversation yet");
            }
            for message in orchestrator.messages() {
                print_message(message);
            }
        }
        Command::Health => {
            let health = client.health().await?;
            println!("backend {}: {}", client.base_url(), health.status);
            store.health_check().await?;
            println!("history store {}: ok", settings.database_url);
        }
        Command::Print {
            image_url,
            message_id,
            viewport: _,
            drag,
            resize,
            rotate,
            yes,
        } => {
            let image_url = match (image_url, message_id) {
                (Some(url), _) => url,
                (None, Some(id)) => orchestrator
                    .history()
                    .get(MessageId(id))
                    .and_then(|m| m.image_url.clone())
                    .with_context(|| format!("message {id} has no image"))?,
                (None, None) => orchestrator
                    .latest_image()
                    .map(str::to_string)
                    .context("no generated image yet; run `generate` first")?,
            };

            orchestrator.open_composer(&image_url)?;
            if let Some(composer) = orchestrator.composer_mut() {
                apply_edits(composer, drag, resize, rotate)?;
            }
            let job = orchestrator.confirm_composition()?;
            print_job(&job);

            if yes {
                orchestrator.confirm_print()?;
                drive_until_settled(&mut orchestrator, &mut event_rx).await?;
                if let Some(notice) = orchestrator.take_notice() {
                    println!("{}", notice.message);
                }
            } else {
                orchestrator.cancel_print_confirmation()?;
                println!("not sent; pass --yes to print");
            }
        }
    }

    orchestrator.shutdown();
    drain_late_events(&mut event_rx);
    worker.await?;
    Ok(())
}

async fn settle_and_show_reply(
    orchestrator: &mut Orchestrator,
    events: &mut UnboundedReceiver<WorkflowEvent>,
) -> Result<()> {
    drive_until_settled(orchestrator, events).await?;
    if let Some(reply) = orchestrator
        .messages()
        .last()
        .filter(|m| m.role == Role::Assistant)
    {
        print_message(reply);
    }
    Ok(())
}

/// Replays CLI edits as the pointer gestures a UI would report.
fn apply_edits(
    composer: &mut Composer,
    drag: Option<Point>,
    resize: Option<f64>,
    rotate: Option<f64>,
) -> Result<()> {
    if let Some(offset) = drag {
        let image = composer.image().context("composer has no image")?;
        let start = Point::new(
            image.position().x + image.size().width / 2.0,
            image.position().y + image.size().height / 2.0,
        );
        composer.gesture_start(start);
        composer.gesture_move(Point::new(start.x + offset.x, start.y + offset.y));
        composer.gesture_end();
    }
    if let Some(dx) = resize {
        let image = composer.image().context("composer has no image")?;
        let corner = Point::new(
            image.position().x + image.size().width,
            image.position().y + image.size().height,
        );
        composer.gesture_start(corner);
        composer.gesture_move(Point::new(corner.x + dx, corner.y));
        composer.gesture_end();
    }
    if let Some(degrees) = rotate {
        let applied = composer.set_rotation(degrees)?;
        info!(degrees = applied, "rotation applied");
    }
    Ok(())
}

fn drain_late_events(events: &mut UnboundedReceiver<WorkflowEvent>) {
    while let Ok(event) = events.try_recv() {
        info!(?event, "discarding event received after shutdown");
    }
}

fn print_message(message: &ConversationMessage) {
    let role = match message.role {
        Role::User => "you",
        Role::Assistant => "studio",
    };
    match &message.image_url {
        Some(url) => println!("[{}] {role}: {} {url}", message.id.0, message.text),
        None => println!("[{}] {role}: {}", message.id.0, message.text),
    }
}

fn print_job(job: &PrintJob) {
    println!(
        "print job: {} at ({:.1}mm, {:.1}mm) size {:.1}x{:.1}mm rotation {}°",
        job.image_url, job.x_mm, job.y_mm, job.width_mm, job.height_mm, job.rotation
    );
}

fn parse_viewport(raw: &str) -> Result<Viewport, String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let width: f64 = width.trim().parse().map_err(|_| format!("bad width in '{raw}'"))?;
    let height: f64 = height.trim().parse().map_err(|_| format!("bad height in '{raw}'"))?;
    if width <= 0.0 || height <= 0.0 {
        return Err(format!("viewport must be positive, got '{raw}'"));
    }
    Ok(Viewport::new(width, height))
}

fn parse_offset(raw: &str) -> Result<Point, String> {
    let (dx, dy) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected DX,DY, got '{raw}'"))?;
    let dx: f64 = dx.trim().parse().map_err(|_| format!("bad DX in '{raw}'"))?;
    let dy: f64 = dy.trim().parse().map_err(|_| format!("bad DY in '{raw}'"))?;
    Ok(Point::new(dx, dy))
}
