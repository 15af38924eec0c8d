/// Play — terminal player for story documents.
///
/// Usage: play <story.json|story.ron> [--config <player.ron>] [--save <path>] [--act <n>] [--fresh]
///
/// Commands:
///   <enter> / next      — advance the dialogue
///   <n>                 — pick choice n (1-based)
///   log                 — show the dialogue so far
///   stats               — show relationships, inventory and skills
///   restart             — back to the first scene (stats are kept)
///   save                — write the save file now
///   help                — list commands
///   quit                — exit

use story_player::core::config::PlayerConfig;
use story_player::core::playback::{Advance, PlaybackState};
use story_player::core::reveal::RevealStep;
use story_player::core::save::{FileSaveStore, SaveStore};
use story_player::core::session::{AdvanceOutcome, PlayerSession};
use story_player::schema::player_state::{Ledger, PlayerState};
use story_player::schema::story::StoryDocument;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let story_path = args[1].clone();
    let mut config_path = None;
    let mut save_path = "story_save.json".to_string();
    let mut act = None;
    let mut fresh = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--save" if i + 1 < args.len() => {
                i += 1;
                save_path = args[i].clone();
            }
            "--act" if i + 1 < args.len() => {
                i += 1;
                act = args[i].parse().ok();
            }
            "--fresh" => fresh = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let story = match StoryDocument::load(Path::new(&story_path)) {
        Ok(story) => story,
        Err(e) => {
            eprintln!("ERROR: failed to load story '{}': {}", story_path, e);
            std::process::exit(1);
        }
    };

    let mut config = match config_path {
        Some(ref path) => match PlayerConfig::load_from_ron(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: failed to load config '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => PlayerConfig::default(),
    };
    if let Some(act) = act {
        config.act = act;
    }

    let store = FileSaveStore::new(&save_path);
    match store.load() {
        Ok(Some(save)) if !fresh => {
            println!("Resuming stats from {} (last seen in '{}')", save_path, save.scene);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("WARNING: ignoring unreadable save '{}': {}", save_path, e);
            fresh = true;
        }
    }

    let clock = Instant::now();
    let now = || clock.elapsed().as_millis() as u64;

    let mut builder = PlayerSession::builder()
        .story(story)
        .config(config)
        .save_store(store)
        .started_at(now());
    if fresh {
        builder = builder.player_state(PlayerState::default());
    }
    let mut session = match builder.build() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Type 'help' for commands.\n");
    print_scene_header(&session);
    render(&mut session, &now);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim().to_lowercase();

        match input.as_str() {
            "quit" | "exit" | "q" => break,
            "help" | "h" | "?" => print_help(),
            "" | "next" | "n" => match session.advance(now()) {
                Ok(AdvanceOutcome::Moved(Advance::NextLine)) => render(&mut session, &now),
                Ok(_) => render_prompt(&session),
                Err(e) => println!("ERROR: {}", e),
            },
            "log" => {
                println!("\n--- Dialogue Log ---");
                for line in session.log() {
                    println!("{}: {}", line.speaker, line.text);
                }
                println!("--- End ---\n");
            }
            "stats" => print_stats(session.player_state()),
            "restart" => {
                session.restart(now());
                println!("\n(restarted)\n");
                print_scene_header(&session);
                render(&mut session, &now);
            }
            "save" => match session.save_now() {
                Ok(()) => println!("Saved to {}", save_path),
                Err(e) => println!("ERROR: {}", e),
            },
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => match session.select_choice(n - 1, now()) {
                    Ok(outcome) => {
                        if !outcome.condition_met {
                            println!("(that didn't go the way you hoped)");
                        }
                        print_scene_header(&session);
                        render(&mut session, &now);
                    }
                    Err(e) => println!("ERROR: {}", e),
                },
                _ => println!("Unknown command '{}'. Type 'help'.", other),
            },
        }

        session.tick(now());
    }

    if let Err(e) = session.save_now() {
        eprintln!("WARNING: final save failed: {}", e);
    }
    println!("Goodbye.");
}

/// Typewriter the current line, then show choices or the ending.
fn render(session: &mut PlayerSession, now: &dyn Fn() -> u64) {
    if let Some(speaker) = session.speaker().map(str::to_string) {
        print!("{}: ", speaker);
    }

    let mut printed = 0;
    let pause = Duration::from_millis(session.config().effective_ms_per_char().max(1));
    loop {
        let step = session.tick(now());
        let visible: Vec<char> = session.visible_text().chars().collect();
        let fresh: String = visible[printed.min(visible.len())..].iter().collect();
        print!("{}", fresh);
        io::stdout().flush().ok();
        printed = visible.len();
        if step != RevealStep::Revealing {
            break;
        }
        std::thread::sleep(pause);
    }
    println!();
    render_prompt(session);
}

fn render_prompt(session: &PlayerSession) {
    if session.showing_choices() {
        println!();
        for (index, choice) in session.choices().iter().enumerate() {
            match &choice.description {
                Some(description) => {
                    println!("  {}. {} — {}", index + 1, choice.label(index), description)
                }
                None => println!("  {}. {}", index + 1, choice.label(index)),
            }
        }
        println!();
    } else if matches!(session.state(), PlaybackState::Terminal { .. }) {
        println!("\n-- The End --  (type 'restart' or 'quit')\n");
    }
}

fn print_scene_header(session: &PlayerSession) {
    if let Some(scene) = session.scene() {
        println!("\n[{}]", scene.setting);
        if let Some(ref description) = scene.setting_description {
            println!("{}", description);
        }
        println!();
    }
}

fn print_stats(state: &PlayerState) {
    println!("\n--- Player State ---");
    for ledger in Ledger::PRIORITY {
        let stats = state.ledger(ledger);
        if stats.is_empty() {
            println!("{}: (none)", ledger.label());
            continue;
        }
        let entries: Vec<String> = stats.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        println!("{}: {}", ledger.label(), entries.join(", "));
    }
    println!("--- End ---\n");
}

fn print_usage() {
    println!("Usage: play <story.json|story.ron> [--config <player.ron>] [--save <path>] [--act <n>] [--fresh]");
    println!();
    println!("Plays a story document in the terminal. Stats are saved to");
    println!("story_save.json by default and restored on the next run.");
}

fn print_help() {
    println!("Commands:");
    println!("  <enter> / next   — advance the dialogue");
    println!("  <n>              — pick choice n");
    println!("  log              — show the dialogue so far");
    println!("  stats            — show relationships, inventory and skills");
    println!("  restart          — back to the first scene (stats are kept)");
    println!("  save             — write the save file now");
    println!("  quit             — exit");
}
