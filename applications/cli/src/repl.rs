//! Interactive stdin commands and terminal rendering

use lyra_playback::{Command, CommandOutcome, PlayerEvent, RepeatMode, SessionSnapshot};

pub const HELP: &str = "commands: play pause stop next prev replay shuffle \
vol <db> repeat <off|all|one> seek <ms> undo status help quit";

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Run(Command),
    Undo,
    Status,
    Help,
    Quit,
}

/// Parse a line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }

    let input = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("play", None) => Input::Run(Command::Play),
        ("pause", None) => Input::Run(Command::Pause),
        ("stop", None) => Input::Run(Command::Stop),
        ("next", None) => Input::Run(Command::Next),
        ("prev" | "previous", None) => Input::Run(Command::Previous),
        ("replay", None) => Input::Run(Command::Replay5s),
        ("shuffle", None) => Input::Run(Command::Shuffle),
        ("vol" | "volume", Some(db)) => {
            let db: f32 = db
                .parse()
                .map_err(|_| format!("'{db}' is not a volume in dB"))?;
            if !db.is_finite() {
                return Err(format!("'{db}' is not a volume in dB"));
            }
            Input::Run(Command::SetVolume(db))
        }
        ("repeat", Some(mode)) => Input::Run(Command::SetRepeatMode(mode.parse::<RepeatMode>()?)),
        ("seek", Some(ms)) => {
            let ms = ms
                .parse()
                .map_err(|_| format!("'{ms}' is not a position in milliseconds"))?;
            Input::Run(Command::SeekToTimeMs(ms))
        }
        ("undo", None) => Input::Undo,
        ("status", None) => Input::Status,
        ("help" | "?", None) => Input::Help,
        ("quit" | "exit" | "q", None) => Input::Quit,
        ("vol" | "volume" | "repeat" | "seek", None) => {
            return Err(format!("'{verb}' needs an argument"));
        }
        (_, Some(_)) if is_known(verb) => return Err(format!("'{verb}' takes no argument")),
        _ => return Err(format!("unknown command '{verb}' ({HELP})")),
    };
    Ok(Some(input))
}

fn is_known(verb: &str) -> bool {
    matches!(
        verb.to_ascii_lowercase().as_str(),
        "play"
            | "pause"
            | "stop"
            | "next"
            | "prev"
            | "previous"
            | "replay"
            | "shuffle"
            | "undo"
            | "status"
            | "help"
            | "quit"
            | "exit"
    )
}

/// Terminal line for an event; progress and spectrum updates are skipped
pub fn describe_event(event: &PlayerEvent) -> Option<String> {
    let line = match event {
        PlayerEvent::SongLoaded { song } => format!("▶ {} - {}", song.artist, song.title),
        PlayerEvent::PlaybackStarted => "playing".to_string(),
        PlayerEvent::PlaybackPaused => "paused".to_string(),
        PlayerEvent::PlaybackStopped => "stopped".to_string(),
        PlayerEvent::PlaybackFinished => "end of playlist".to_string(),
        PlayerEvent::RepeatModeChanged { mode } => format!("repeat {mode}"),
        PlayerEvent::PlaylistLoaded { playlist: Some(p) } => {
            format!("playlist '{}' ({} songs)", p.name, p.len())
        }
        PlayerEvent::PlaylistLoaded { playlist: None } => "single song loaded".to_string(),
        PlayerEvent::VolumeChanged { gain } => format!("volume {gain:+.1} dB"),
        PlayerEvent::AdOn { clip } => format!("advertisement: {}", clip.title),
        PlayerEvent::AdOff => "advertisement over".to_string(),
        PlayerEvent::SliderDragging { ms, .. } => format!("scrub {}", format_time(*ms)),
        PlayerEvent::PlaybackProgress { .. } | PlayerEvent::SpectrumData { .. } => return None,
    };
    Some(line)
}

/// Terminal line for a command result; `None` when applied
pub fn describe_outcome(outcome: &CommandOutcome) -> Option<String> {
    outcome.rejection().map(|reason| format!("ignored: {reason}"))
}

pub fn describe_snapshot(snapshot: &SessionSnapshot) -> String {
    let song = snapshot.song.as_ref().map_or_else(
        || "no song".to_string(),
        |s| format!("{} - {} [{}]", s.artist, s.title, format_time(s.duration_ms)),
    );
    let position = match (snapshot.playlist_position, snapshot.playlist_len) {
        (Some(index), len) => format!("{}/{}", index + 1, len),
        (None, _) => "-".to_string(),
    };
    format!(
        "{} | {} at {} | track {} | vol {:+.1} dB | repeat {}{}{}",
        snapshot.state,
        song,
        format_time(snapshot.elapsed_ms),
        position,
        snapshot.volume_db,
        snapshot.repeat,
        if snapshot.shuffle_active { " | shuffled" } else { "" },
        if snapshot.ad_active { " | ad" } else { "" },
    )
}

/// `m:ss`
pub fn format_time(ms: u64) -> String {
    let secs = ms / 1_000;
    format!("{}:{:02}", secs / 60, secs % 60)
}
