/// Lyra - MP3 player for the terminal
use anyhow::Context;
use clap::Parser;
use lyra_audio::{probe_song, CpalSinkFactory, FileLibrary, Mp3Opener};
use lyra_cli::{
    args::{Cli, Commands, PlayArgs},
    config::{CliConfig, DEFAULT_LOG_FILTER},
    repl::{self, Input, HELP},
};
use lyra_core::{MetadataProvider, Playlist, Song, StaticAdContent, StaticRoles};
use lyra_playback::{Command, CommandInvoker, EventKind, Player};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Library playlist holding the files given on the command line
const QUEUE: &str = "queue";

/// Library playlist holding the advertisement clips
const ADS: &str = "ads";

/// Events worth a terminal line
const PRINTED_EVENTS: &[EventKind] = &[
    EventKind::SongLoaded,
    EventKind::PlaybackStarted,
    EventKind::PlaybackPaused,
    EventKind::PlaybackStopped,
    EventKind::PlaybackFinished,
    EventKind::RepeatModeChanged,
    EventKind::PlaylistLoaded,
    EventKind::VolumeChanged,
    EventKind::AdOn,
    EventKind::AdOff,
];

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => play(&args),
        Commands::Probe { files } => {
            init_tracing(None);
            probe(&files)
        }
    }
}

fn init_tracing(filter: Option<&str>) {
    // Logs go to stderr so the command prompt stays readable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.unwrap_or(DEFAULT_LOG_FILTER).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn play(args: &PlayArgs) -> anyhow::Result<()> {
    let mut config = CliConfig::load(args.config.as_deref())?;
    args.apply_to(&mut config);
    init_tracing(config.log_filter.as_deref());

    let mut library = FileLibrary::new();
    library.add(QUEUE, &args.files).context("failed to read songs")?;
    library.add(ADS, &config.ads).context("failed to read ad clips")?;
    let (playlist, ads) = resolve(&library)?;
    tracing::info!(
        songs = playlist.len(),
        ads = ads.len(),
        listener = %config.listener.id,
        "Starting Lyra"
    );

    let roles = StaticRoles::new().with(config.listener.id.clone(), config.listener.roles.clone());
    let player = Player::builder(Arc::new(Mp3Opener), Arc::new(CpalSinkFactory::new()))
        .config(config.player.clone())
        .ads(Arc::new(StaticAdContent::new(ads)))
        .roles(Arc::new(roles))
        .listener(config.listener.id.clone())
        .build()?;
    let player = Arc::new(player);

    let json = args.json;
    let _printer = player.events().subscribe_to(PRINTED_EVENTS, move |event| {
        if json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        } else if let Some(line) = repl::describe_event(event) {
            println!("{line}");
        }
    });

    let mut invoker = CommandInvoker::for_player(Arc::clone(&player));
    invoker.execute(Command::LoadPlaylist(playlist))?;
    if args.shuffle {
        invoker.execute(Command::Shuffle)?;
    }
    invoker.execute(Command::Play)?;
    println!("{HELP}");

    let result = command_loop(&mut invoker);
    player.dispose();
    result
}

fn command_loop(invoker: &mut CommandInvoker) -> anyhow::Result<()> {
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;

        let input = match repl::parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let outcome = match input {
            Input::Quit => break,
            Input::Help => {
                println!("{HELP}");
                continue;
            }
            Input::Status => {
                println!("{}", repl::describe_snapshot(&invoker.player().snapshot()));
                continue;
            }
            Input::Undo => match invoker.undo() {
                Ok(Some(outcome)) => Ok(outcome),
                Ok(None) => {
                    println!("nothing to undo");
                    continue;
                }
                Err(e) => Err(e),
            },
            Input::Run(command) => invoker.execute(command),
        };

        // A failed command leaves the player usable
        match outcome {
            Ok(outcome) => {
                if let Some(line) = repl::describe_outcome(&outcome) {
                    println!("{line}");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Command failed");
                println!("error: {e}");
            }
        }
    }
    Ok(())
}

/// The queue and the advertisement rotation
fn resolve(metadata: &dyn MetadataProvider) -> anyhow::Result<(Playlist, Vec<Song>)> {
    let playlist = metadata.playlist(QUEUE)?;
    let ads = metadata.playlist(ADS)?.songs;
    Ok((playlist, ads))
}

fn probe(files: &[PathBuf]) -> anyhow::Result<()> {
    for path in files {
        let song = probe_song(path, path.display().to_string())
            .with_context(|| format!("failed to read {}", path.display()))?;
        println!(
            "{}: {} - {} | {} frames | {} | {:.4} frames/ms",
            path.display(),
            song.artist,
            song.title,
            song.total_frames,
            repl::format_time(song.duration_ms),
            song.frame_rate_per_ms,
        );
    }
    Ok(())
}
