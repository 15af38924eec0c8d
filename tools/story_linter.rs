/// Story Linter — checks a generated story document for broken links,
/// unreachable scenes and other content problems before playback.
///
/// Usage: story_linter <story.json|story.ron|dir> [--entry <scene_id>]

use story_player::schema::story::{LintIssue, Severity, StoryDocument};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: story_linter <story.json|story.ron|dir> [--entry <scene_id>]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let mut entry = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--entry" && i + 1 < args.len() {
            i += 1;
            entry = Some(args[i].clone());
        }
        i += 1;
    }

    let files = if target.is_dir() {
        collect_story_files(target)
    } else if target.is_file() {
        vec![target.to_path_buf()]
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    };

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for path in &files {
        println!("\n=== {} ===\n", path.display());

        let story = match StoryDocument::load(path) {
            Ok(story) => story,
            Err(e) => {
                println!("ERROR: failed to load: {}", e);
                total_errors += 1;
                continue;
            }
        };
        println!("Loaded {} scenes", story.len());

        let issues = story.lint(entry.as_deref());
        let (errors, warnings): (Vec<&LintIssue>, Vec<&LintIssue>) = issues
            .iter()
            .partition(|issue| issue.severity == Severity::Error);

        if issues.is_empty() {
            println!("All checks passed!");
        }
        for issue in warnings.iter().chain(errors.iter()) {
            println!("{}", issue);
        }

        total_errors += errors.len();
        total_warnings += warnings.len();
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        total_errors,
        total_warnings
    );

    if total_errors == 0 {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn collect_story_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_story_files(&path));
            } else if matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("json") | Some("ron")
            ) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
