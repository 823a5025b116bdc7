use clap::Parser;
use rarchive::{RunOutcome, RunSummary, ThreadArchiver, DEFAULT_WORKERS};
use std::path::PathBuf;
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: u8) {
    // Default INFO; each -v/-q moves one step.
    let level = match 2i16 + verbose as i16 - quiet as i16 {
        i16::MIN..=0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = set_global_default(subscriber);
}

#[derive(Parser)]
#[command(version, about = "Merge overlapping Reddit thread snapshots into one archive with local media")]
pub struct Opts {
    /// Input .jsonl / .jsonl.zst files or directories containing them
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,
    /// Output directory
    #[arg(short = 'o', long = "output", default_value = ".")]
    pub output: PathBuf,
    /// File name of the HTML page
    #[arg(long, default_value = "media_aware_visualization.html")]
    pub html_name: String,
    /// File name of the cleaned JSONL export
    #[arg(long, default_value = "conversation_data_cleaned.jsonl")]
    pub jsonl_name: String,
    /// Media directory, relative to the output directory
    #[arg(long = "media-dir", default_value = "downloaded_media")]
    pub media_dir: String,
    /// Concurrent downloads
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
    /// Replace local media paths with `[media]` in the export
    #[arg(long)]
    pub strip_media_paths: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

fn print_summary(s: &RunSummary) {
    println!("Posts: {} ({} comments)", s.posts, s.comments);
    println!(
        "Media: {} referenced, {} available ({} downloaded, {} reused), {} failed",
        s.media_urls, s.media_present, s.fetch.downloaded, s.fetch.reused, s.media_failed
    );
    if s.skipped_lines > 0 {
        println!("Skipped lines: {}", s.skipped_lines);
    }
    println!("HTML:  {}", s.html_path.display());
    println!("JSONL: {} ({} posts)", s.jsonl_path.display(), s.exported);
}

fn main() {
    let opts = Opts::parse();
    init_tracing(opts.verbose, opts.quiet);

    let archiver = ThreadArchiver::new()
        .inputs(&opts.inputs)
        .output_dir(&opts.output)
        .html_name(opts.html_name)
        .jsonl_name(opts.jsonl_name)
        .media_dir_name(opts.media_dir)
        .workers(opts.workers)
        .progress(!opts.no_progress)
        .preserve_media_paths(!opts.strip_media_paths);

    match archiver.run() {
        Ok(RunOutcome::Completed(summary)) => print_summary(&summary),
        Ok(RunOutcome::NoInputs) => {
            eprintln!("error: no .jsonl or .jsonl.zst inputs found");
            std::process::exit(1);
        }
        Ok(RunOutcome::NoPosts { files, skipped_lines }) => {
            eprintln!("error: no posts found in {files} input file(s) ({skipped_lines} malformed lines)");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
