//! tabedit - Inspect, convert and play MIDI files as tablature.
//!
//! The command-line front end of the editor core. It loads a Standard MIDI
//! File into an editor session, prints each track the way the editor would
//! lay it out, and can write the song back out as MIDI or JSON.
//!
//! # Usage
//!
//! ```bash
//! tabedit song.mid                    # Track summary
//! tabedit song.mid --tab              # Every note with its lane, fret and box
//! tabedit song.mid --output copy.mid  # Re-export
//! tabedit song.mid --play             # Follow playback on the console
//! ```
//!
//! Set `RUST_LOG=tabedit=debug` for diagnostics.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tabedit::midi::{instrument_family, note_to_name};
use tabedit::playback::PlaybackState;
use tabedit::{EditorSession, NullSurface, PlaybackClock, Preferences, TransportClock};

/// Command-line options for the application.
struct CliOptions {
    /// MIDI file to open.
    input: PathBuf,
    /// Where to write the song as MIDI.
    output: Option<PathBuf>,
    /// Print the song as JSON instead of the summary.
    json: bool,
    /// Print every note's tablature position.
    tab: bool,
    /// Follow playback until the song ends.
    play: bool,
    /// Snapping granularity as a fraction of a measure.
    grid: Option<f64>,
    /// Pixels per measure for the printed boxes.
    measure_size: Option<f64>,
    /// Preferences file to read and update.
    prefs: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `<file.mid>`: The MIDI file to open (required)
    /// - `--output <path>` or `-o <path>`: Write the song as a MIDI file
    /// - `--json`: Print the song as JSON
    /// - `--tab` or `-t`: Print every note's lane, fret and box
    /// - `--play` or `-p`: Follow playback on the console
    /// - `--grid <fraction>`: Grid fraction used by `--tab`
    /// - `--measure-size <px>`: Pixels per measure used by `--tab`
    /// - `--prefs <path>`: Preferences file
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut input: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;
        let mut json = false;
        let mut tab = false;
        let mut play = false;
        let mut grid: Option<f64> = None;
        let mut measure_size: Option<f64> = None;
        let mut prefs: Option<PathBuf> = None;
        let mut i = 1;

        let value = |i: usize, flag: &str| -> String {
            match args.get(i) {
                Some(v) => v.clone(),
                None => {
                    eprintln!("Error: {} requires an argument", flag);
                    std::process::exit(1);
                }
            }
        };

        while i < args.len() {
            match args[i].as_str() {
                "--output" | "-o" => {
                    i += 1;
                    output = Some(PathBuf::from(value(i, "--output")));
                }
                "--json" => json = true,
                "--tab" | "-t" => tab = true,
                "--play" | "-p" => play = true,
                "--grid" => {
                    i += 1;
                    let raw = value(i, "--grid");
                    grid = Some(
                        raw.parse()
                            .with_context(|| format!("Invalid grid fraction: {}", raw))?,
                    );
                }
                "--measure-size" => {
                    i += 1;
                    let raw = value(i, "--measure-size");
                    measure_size = Some(
                        raw.parse()
                            .with_context(|| format!("Invalid measure size: {}", raw))?,
                    );
                }
                "--prefs" => {
                    i += 1;
                    prefs = Some(PathBuf::from(value(i, "--prefs")));
                }
                "--help" | "-h" => {
                    eprintln!("tabedit - MIDI tablature editor");
                    eprintln!();
                    eprintln!(
                        "Usage: {} <file.mid> [OPTIONS]",
                        args.first().map(String::as_str).unwrap_or("tabedit")
                    );
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -o, --output PATH      Write the song as a MIDI file");
                    eprintln!("      --json             Print the song as JSON");
                    eprintln!("  -t, --tab              Print every note's lane, fret and box");
                    eprintln!("  -p, --play             Follow playback until the song ends");
                    eprintln!("      --grid FRACTION    Grid fraction for --tab (default 0.125)");
                    eprintln!("      --measure-size PX  Pixels per measure for --tab");
                    eprintln!("      --prefs PATH       Preferences file to read and update");
                    eprintln!("  -h, --help             Print this help message");
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
                other => input = Some(PathBuf::from(other)),
            }
            i += 1;
        }

        let Some(input) = input else {
            eprintln!("Error: no MIDI file given");
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        };

        Ok(Self {
            input,
            output,
            json,
            tab,
            play,
            grid,
            measure_size,
            prefs,
        })
    }
}

type Session = EditorSession<TransportClock, NullSurface>;

fn print_summary(session: &Session) {
    let song = session.song();
    println!("{}", song.name);
    println!(
        "  {} bpm, {} ticks/quarter, {} measures, {:.1}s",
        song.bpm,
        song.resolution,
        song.measure_count,
        song.duration_seconds()
    );
    for (index, track) in song.tracks().iter().enumerate() {
        println!(
            "  {:>2}. {:<24} {:<6} ch {:>2}  prog {:>3}  {:<20} {:>5} notes",
            index + 1,
            track.name,
            track.track_type().name(),
            track.channel + 1,
            track.program,
            instrument_family(track.channel, track.program),
            track.note_count()
        );
    }
}

fn print_tab(session: &Session) {
    let song = session.song();
    for track in song.tracks() {
        let grid = session.grid_for(track);
        let track_type = track.track_type();
        println!("{} ({})", track.name, track_type);

        let mut notes: Vec<_> = track.notes().iter().collect();
        notes.sort_by_key(|n| (n.start, n.string_num));
        for note in notes {
            let (measure, beat, tick) = song.tick_to_position(note.start);
            let rect = grid.note_rect(note, track_type);
            println!(
                "  {:>3}:{}:{:<4} {:<4} {:<6} fret {:>2}  len {:>5}  [x {:.1} y {:.1} w {:.1}]",
                measure,
                beat,
                tick,
                note_to_name(note.pitch),
                track_type.lane_name(note.string_num),
                note.fret,
                note.duration,
                rect.x,
                rect.y,
                rect.width
            );
        }
    }
}

/// Polls the transport until the song ends, printing each new measure.
fn follow_playback(session: &mut Session) -> Result<()> {
    session.play_all(1).context("Failed to start playback")?;
    let interval = session.config().poll_interval;
    let ticks_per_measure = session.song().ticks_per_measure().max(1);
    let mut last_measure = 0;

    while session.playback_state() == PlaybackState::Playing {
        session.poll_playback();
        let measure = session.clock().current_tick() / ticks_per_measure + 1;
        if measure != last_measure {
            println!("measure {}", measure);
            last_measure = measure;
        }
        std::thread::sleep(interval);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let prefs = match &cli.prefs {
        Some(path) => Preferences::load(path),
        None => Preferences::new(),
    };
    let mut session = Session::from_preferences(prefs, TransportClock::new(), NullSurface);

    session
        .load_file(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;

    if let Some(measure_size) = cli.measure_size {
        session.set_measure_size(measure_size);
    }
    if let Some(fraction) = cli.grid {
        let ids: Vec<_> = session.song().tracks().iter().map(|t| t.id).collect();
        for id in ids {
            session.select_track(id);
            session.set_grid_fraction(fraction);
        }
    }

    if cli.json {
        let json = session
            .song()
            .to_json()
            .context("Failed to serialize song")?;
        println!("{}", json);
    } else {
        print_summary(&session);
    }

    if cli.tab {
        print_tab(&session);
    }

    if let Some(output) = &cli.output {
        session
            .save_file(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!("Wrote {}", output.display());
    }

    if cli.play {
        follow_playback(&mut session)?;
    }

    session.save_preferences();
    Ok(())
}
