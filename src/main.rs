mod terminal;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rspotify::{AuthCodeSpotify, Config, Token};

use spotify_window::{
    auth,
    config::Settings,
    controller::PlaybackController,
    logging,
    model::{InnertubeClient, PlaybackSource, SpotifyClient},
    queue::QueueBackend,
    session::Collaborators,
};
use terminal::{print_line, print_window, TerminalFeedback};

const USAGE: &str = "usage: spotify-window <spotify-uri-or-link> [--shuffle] [--repeat] [--youtube]";

struct Args {
    uri: String,
    shuffle: bool,
    repeat: bool,
    youtube: bool,
}

fn parse_args() -> Option<Args> {
    let mut uri = None;
    let mut args = Args {
        uri: String::new(),
        shuffle: false,
        repeat: false,
        youtube: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--shuffle" => args.shuffle = true,
            "--repeat" => args.repeat = true,
            "--youtube" => args.youtube = true,
            other if uri.is_none() && !other.starts_with("--") => uri = Some(other.to_string()),
            _ => return None,
        }
    }
    args.uri = uri?;
    Some(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = parse_args() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== spotify-window starting ===");

    let mut settings = Settings::load()?;
    if args.youtube {
        settings.source = PlaybackSource::YouTube;
    }
    let shuffle = args.shuffle || settings.shuffle;
    let repeat = args.repeat || settings.repeat;

    // Step 1: Get credentials
    let auth_result = auth::perform_oauth_flow().await?;

    // Step 2: Authenticate with rspotify
    let rspotify_client = setup_rspotify(auth_result.rspotify_token.clone()).await?;
    let token_expires_at = auth_result.rspotify_token.expires_at;
    let spotify_client = SpotifyClient::new(rspotify_client, auth_result.refresh_token.clone(), token_expires_at);

    let (user, collection) = futures::join!(
        spotify_client.current_user_name(),
        spotify_client.lookup_collection(&args.uri)
    );
    match user {
        Ok(name) => tracing::info!(user = %name, "rspotify authorized successfully"),
        Err(e) => {
            tracing::error!(error = %e, "rspotify authentication failed");
            return Err(anyhow::anyhow!("rspotify init failed"));
        }
    }
    let collection = collection?;

    let (queue, queue_events) = QueueBackend::new();
    queue.set_auto_repeat(repeat).await;
    let feedback = Arc::new(TerminalFeedback::default());

    let collaborators = Collaborators {
        catalog: Arc::new(spotify_client.clone()),
        video_index: Arc::new(InnertubeClient::new(settings.innertube_url.clone())),
        queue: Arc::new(queue.clone()),
        progress: feedback.clone(),
        errors: feedback.clone(),
        cancel_prompt: feedback.clone(),
    };
    let controller = PlaybackController::new(collaborators, settings.window.clone());
    controller.start_queue_event_listener(queue_events);

    enable_raw_mode()?;
    print_line(&format!(
        "Playing {} ({} tracks) from {} | n next, p previous, r repeat, f fail, b background, c skip download, q quit",
        collection.name, collection.total, settings.source
    ));

    let controller_for_start = controller.clone();
    let settings_for_start = settings.clone();
    tokio::spawn(async move {
        controller_for_start
            .play_collection(collection, &settings_for_start, shuffle, repeat)
            .await;
    });

    let res = run_app(&controller, &queue, &feedback, &mut settings, repeat).await;

    disable_raw_mode()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("spotify-window shutting down");
    Ok(())
}

async fn setup_rspotify(access_token: Token) -> Result<AuthCodeSpotify> {
    let spotify = AuthCodeSpotify::with_config(
        Default::default(),
        Default::default(),
        Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        },
    );

    tracing::debug!("rspotify client initialized");

    *spotify
        .token
        .lock()
        .await
        .map_err(|_| anyhow::anyhow!("rspotify token lock poisoned"))? = Some(access_token);
    tracing::debug!("rspotify token set");
    Ok(spotify)
}

async fn run_app(
    controller: &PlaybackController,
    queue: &QueueBackend,
    feedback: &TerminalFeedback,
    settings: &mut Settings,
    mut repeat: bool,
) -> Result<()> {
    loop {
        if !event::poll(Duration::from_millis(50))? {
            tokio::task::yield_now().await;
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Char('n') => {
                if queue.next().await.is_none() {
                    print_line("End of queue");
                }
            }
            KeyCode::Char('p') => {
                if queue.previous().await.is_none() {
                    print_line("Start of queue");
                }
            }
            KeyCode::Char('r') => {
                repeat = !repeat;
                queue.set_auto_repeat(repeat).await;
                controller.set_repeat(repeat).await;
                if let Err(e) = settings.remember_repeat(repeat) {
                    tracing::warn!(error = %e, "Could not save repeat mode");
                }
                print_line(if repeat { "Repeat on" } else { "Repeat off" });
            }
            KeyCode::Char('f') => {
                queue.fail_current().await;
            }
            KeyCode::Char('b') => {
                let background = !controller.is_background();
                controller.set_background(background);
                print_line(if background { "Background mode on" } else { "Background mode off" });
            }
            KeyCode::Char('c') => {
                if feedback.cancel_pending() {
                    print_line("Download skipped");
                }
            }
            _ => continue,
        }

        // Let the spawned advance handling run before showing the window
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (entries, current) = queue.entries().await;
        print_window(&entries, current);
    }

    Ok(())
}
