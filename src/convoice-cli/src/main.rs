//! Convoice CLI - two-voice script to speech
//!
//! Reads a conversation script (one line per turn), synthesizes every turn
//! with a speech provider and plays the clips back in order.

use clap::Parser;
use colored::Colorize;
use convoice_core::{
    ClipPlayer, Config, ProviderKind, Role, Session, SessionEvent, SilentPlayer, build_synthesizer,
    format_seconds,
};
use std::env;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "convoice",
    version,
    about = "Turn a two-voice script into speech",
    long_about = "Synthesizes each line of a script with alternating voices and plays the clips back in order."
)]
struct Cli {
    /// Script file, one line per turn ("-" or omitted reads stdin)
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Edit the conversation interactively instead of running a script
    #[arg(short, long)]
    interactive: bool,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Speech provider: elevenlabs, openai or kokoro
    #[arg(short, long, value_name = "PROVIDER")]
    provider: Option<ProviderKind>,

    /// Synthesize only, do not play
    #[arg(long)]
    no_play: bool,

    /// Do not open an audio device; playback just waits out each clip
    #[arg(long)]
    no_audio: bool,

    /// Write all clips to a single WAV file
    #[arg(short, long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Seconds of silence between clips in the export
    #[arg(long, value_name = "SECONDS")]
    gap: Option<f32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("convoice_core=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Ok(api_base) = env::var("OPENAI_API_BASE").or_else(|_| env::var("OPENAI_BASE_URL")) {
        config.openai.api_base = api_base;
    }
    let provider = cli.provider.unwrap_or(config.synthesis.provider);
    let gap = cli.gap.unwrap_or(config.export.gap_seconds);

    let synthesizer = build_synthesizer(&config, provider, api_key_for(provider)).await?;
    let player = create_player(cli.no_audio);
    let voices = config.voices(provider).clone();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Convoice".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{} {}   {} {}   {} {}",
        "Provider:".bold(),
        provider.to_string().bright_white(),
        "Left:".bold(),
        voices.left.bright_cyan(),
        "Right:".bold(),
        voices.right.bright_magenta()
    );
    println!();

    let mut session =
        Session::new(synthesizer, player, voices).with_callback(create_console_callback());

    if cli.interactive {
        return run_interactive(&mut session, gap).await;
    }

    let script = read_script(cli.script.as_deref()).await?;
    session.set_text(&script);
    println!("{} {} turns", "Script:".bold(), session.turns().len());

    let report = session.process().await?;
    print_durations(&session);

    if !report.failed.is_empty() {
        eprintln!(
            "{}",
            format!(
                "Warning: {} turn(s) have no audio ({:?}); playback is disabled.",
                report.failed.len(),
                report.failed
            )
            .yellow()
        );
    }

    if let Some(path) = &cli.export {
        export(&session, path, gap);
    }

    if !cli.no_play && session.can_play() {
        session.play().await?;
    }

    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Look up the API key of a remote provider in the environment.
fn api_key_for(provider: ProviderKind) -> Option<String> {
    let vars: &[&str] = match provider {
        ProviderKind::ElevenLabs => &[
            "ELEVENLABS_API_KEY",
            "ELEVEN_API_KEY",
            "ELEVEN_LABS_API_KEY",
        ],
        ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        ProviderKind::Kokoro => return None,
    };

    let key = vars.iter().find_map(|var| env::var(var).ok());
    if key.is_none() {
        eprintln!(
            "{}",
            format!("Warning: {} not set.", vars.join(" / ")).yellow()
        );
    }
    key
}

fn create_player(no_audio: bool) -> Box<dyn ClipPlayer> {
    #[cfg(feature = "playback")]
    if !no_audio {
        return Box::new(convoice_core::RodioPlayer::default());
    }

    #[cfg(not(feature = "playback"))]
    if !no_audio {
        eprintln!(
            "{}",
            "Warning: built without audio output, playback will be silent.".yellow()
        );
    }

    Box::new(SilentPlayer)
}

/// Read the script from a file or stdin.
async fn read_script(path: Option<&Path>) -> Result<String, Box<dyn std::error::Error>> {
    let content = match path {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path).await?,
        _ => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    Ok(strip_trailing_newline(content))
}

/// Drop a single trailing line ending so that a normally terminated file
/// does not gain an empty last turn.
fn strip_trailing_newline(mut content: String) -> String {
    if content.ends_with('\n') {
        content.pop();
        if content.ends_with('\r') {
            content.pop();
        }
    }
    content
}

fn export(session: &Session, path: &Path, gap: f32) {
    match session.export_wav(path, gap) {
        Ok(clips) => println!(
            "{} {} clips to {}",
            "Exported".bright_green(),
            clips,
            path.display()
        ),
        Err(e) => eprintln!("{} {}", "Export failed:".red().bold(), e),
    }
}

fn print_durations(session: &Session) {
    println!();
    for turn in session.turns() {
        let role = match turn.role() {
            Role::Left => turn.role().display_name().bright_cyan(),
            Role::Right => turn.role().display_name().bright_magenta(),
        };
        let duration = if turn.has_audio() {
            format!("{}s", format_seconds(turn.duration_seconds())).normal()
        } else {
            "no audio".red()
        };
        println!(
            "  {:>3}. {:<5} {:>9}  {}",
            turn.sequence_number(),
            role,
            duration,
            turn.text().dimmed()
        );
    }
    println!();
    println!(
        "{} {} seconds",
        "Total audio duration:".bold(),
        format_seconds(session.total_duration_seconds()).bright_white()
    );
    println!();
}

const HELP: &str = "\
  <text>          append a turn (alternates left/right)
  <empty line>    append an empty turn
  :load FILE      replace the conversation with a script file
  :process        synthesize turns that have no audio yet
  :play           play every turn (needs all turns processed)
  :list           show turns and durations
  :total          show total duration
  :export FILE    write all clips to one WAV file
  :clear          remove every turn
  :help           show this help
  :quit           exit";

async fn run_interactive(
    session: &mut Session,
    gap: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "Type a line to add a turn, :help for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(session);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim_end_matches('\r');

        match parse_command(line) {
            Command::Append(text) => {
                session.append_lines(text);
            }
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::List => print_durations(session),
            Command::Total => println!(
                "{} {} seconds",
                "Total audio duration:".bold(),
                format_seconds(session.total_duration_seconds())
            ),
            Command::Clear => session.clear(),
            Command::Load(path) => match read_script(Some(Path::new(path))).await {
                Ok(script) => {
                    let kept = session.set_text(&script);
                    println!(
                        "Loaded {} turns ({} kept their audio)",
                        session.turns().len(),
                        kept
                    );
                }
                Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
            },
            Command::Process => {
                if !session.can_process() {
                    eprintln!("{}", "Already processing.".yellow());
                    continue;
                }
                if let Err(e) = session.process().await {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                print_durations(session);
            }
            Command::Play => {
                if let Err(e) = session.play().await {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
            }
            Command::Export(path) => export(session, Path::new(path), gap),
            Command::Unknown => eprintln!("{} {}", "Unknown command:".red(), line),
        }
    }

    Ok(())
}

/// One line of interactive input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    /// Plain text, including an empty line, becomes a new turn.
    Append(&'a str),
    Load(&'a str),
    Process,
    Play,
    List,
    Total,
    Export(&'a str),
    Clear,
    Help,
    Quit,
    Unknown,
}

fn parse_command(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Append(line);
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).unwrap_or_default();

    match name {
        "q" | "quit" | "exit" => Command::Quit,
        "h" | "help" => Command::Help,
        "l" | "list" => Command::List,
        "t" | "total" => Command::Total,
        "clear" => Command::Clear,
        "p" | "process" => Command::Process,
        "play" => Command::Play,
        "load" if !argument.is_empty() => Command::Load(argument),
        "export" if !argument.is_empty() => Command::Export(argument),
        _ => Command::Unknown,
    }
}

fn print_prompt(session: &Session) {
    use std::io::Write;

    let next = Role::for_position(session.turns().len() + 1);
    let status = if session.can_play() {
        "ready".green()
    } else {
        format!("{} pending", session.conversation().missing_audio().len()).yellow()
    };
    print!(
        "[{} turns, {}s, {}] {}> ",
        session.turns().len(),
        format_seconds(session.total_duration_seconds()),
        status,
        next.display_name().to_lowercase()
    );
    std::io::stdout().flush().ok();
}

/// Create a callback that prints session events to the console.
fn create_console_callback() -> Box<dyn Fn(SessionEvent) + Send + Sync> {
    Box::new(move |event| match event {
        SessionEvent::ProcessingStarted { pending } => {
            println!("{}", format!("Processing {} turn(s)...", pending).bright_blue());
        }
        SessionEvent::TurnSynthesizing {
            sequence_number,
            role,
        } => {
            println!(
                "{} turn {} {}",
                "▶".bright_cyan(),
                sequence_number,
                format!("({})", role.display_name()).yellow()
            );
        }
        SessionEvent::TurnSynthesized {
            sequence_number: _,
            duration_seconds,
        } => {
            println!("    {}s", format_seconds(duration_seconds).dimmed());
        }
        SessionEvent::TurnFailed {
            sequence_number,
            error,
        } => {
            eprintln!(
                "    {} turn {}: {}",
                "Error generating audio".red(),
                sequence_number,
                error
            );
        }
        SessionEvent::PlaybackStarted { clips } => {
            println!("{}", format!("Playing {} clip(s)...", clips).bright_green());
        }
        SessionEvent::ClipStarted {
            sequence_number,
            role,
            duration_seconds,
        } => {
            println!(
                "{} turn {} {} {}s",
                "♪".bright_green(),
                sequence_number,
                format!("({})", role.display_name()).yellow(),
                format_seconds(duration_seconds)
            );
        }
        SessionEvent::ClipFailed {
            sequence_number,
            error,
        } => {
            eprintln!(
                "    {} turn {}: {}",
                "Error playing audio".red(),
                sequence_number,
                error
            );
        }
        SessionEvent::ProcessingFinished { .. } | SessionEvent::PlaybackFinished { .. } => {
            // Summaries are printed by the caller
        }
    })
}
