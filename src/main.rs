// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use console::{Emoji, Term};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podpress::preprocess::DEFAULT_PREFIX;
use podpress::{
    AlwaysNo, AlwaysYes, Confirm, DEFAULT_SPEC_FILE, DiffOutcome, DirectoryStore, NoopReporter,
    PodcastSpec, Preprocessor, Preset, ProgressEvent, ProgressReporter, PublishError,
    PublishOptions, Publisher, RemoteStore, ReqwestClient, Selection, SharedConfirm,
    SharedProgressReporter, SharedStore, ShellTool, SpecStore, YamlSpecStore, is_remote_endpoint,
    render_chapter_list,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "[~] ");
static TRANSFER: Emoji<'_, '_> = Emoji("📦 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Encode, tag and publish podcast episodes
#[derive(Parser, Debug)]
#[command(name = "podpress")]
#[command(about = "Encode, tag and publish podcast episodes from a YAML specification")]
#[command(version)]
struct Args {
    /// Podcast specification file
    #[arg(short, long, global = true, default_value = DEFAULT_SPEC_FILE)]
    spec: PathBuf,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode and upload selected episodes (all if no UID is given)
    #[command(alias = "e")]
    Encode {
        uids: Vec<u64>,

        /// Do not ask, and re-encode episodes that already have an output
        #[arg(short, long)]
        force: bool,

        /// Answer every question with "no"
        #[arg(short = 'n', long, conflicts_with = "force")]
        dry_run: bool,

        /// Stop at the first failing episode
        #[arg(long)]
        stop_on_error: bool,

        /// Do not check that lame, ffmpeg and ffprobe are executable
        #[arg(long)]
        skip_checks: bool,

        /// Offer to delete the remote master first, so the local copy is uploaded in its place
        #[arg(short = 'R', long)]
        remove_remote_master: bool,
    },

    /// Fill in missing length and duration of published episodes
    Resolve {
        uids: Vec<u64>,

        /// Do not ask
        #[arg(short, long)]
        force: bool,

        /// Answer every question with "no"
        #[arg(short = 'n', long, conflicts_with = "force")]
        dry_run: bool,
    },

    /// Upload a file to the output store after showing what changes
    Upload {
        file: PathBuf,

        /// Object key (defaults to the file name)
        #[arg(short, long)]
        key: Option<String>,

        /// Do not ask
        #[arg(short, long)]
        force: bool,

        /// Show the diff only
        #[arg(short = 'n', long, conflicts_with = "force")]
        dry_run: bool,
    },

    /// Show how a local file differs from its copy in the output store
    Diff {
        file: PathBuf,

        /// Object key (defaults to the file name)
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Print the chapter list of an episode
    Chapters { uid: u64 },

    /// Run raw microphone tracks through an EQ and compression preset
    #[command(alias = "pre")]
    Preprocess {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// sm7b, qzj, aggressive, heavy, qzj-podmic, qzj-podmic2, lowcut or none
        #[arg(short, long, default_value = "sm7b")]
        preset: Preset,

        /// Prepended to the input file name to name the output
        #[arg(long, default_value = DEFAULT_PREFIX)]
        prefix: String,

        /// ffmpeg executable
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,
    },
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, key: &str) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap();

        if let Some(bar) = bars.get(key) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {TRANSFER}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bar.set_message(truncate(key, 40));
        bars.insert(key.to_string(), bar.clone());
        bar
    }

    fn finish_bar(&self, key: &str) {
        let mut bars = self.bars.lock().unwrap();
        if let Some(bar) = bars.remove(key) {
            bar.finish_and_clear();
        }
    }

    fn line(&self, message: String) {
        let _ = self.multi.println(message);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                podcast_title,
                selected,
                already_encoded,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} to encode, {} already encoded",
                    podcast_title.bold().green(),
                    selected.to_string().cyan(),
                    already_encoded.to_string().yellow()
                ));
            }

            ProgressEvent::EpisodeStarted {
                uid,
                title,
                index,
                total,
            } => {
                self.main_bar.set_message(format!(
                    "[{}/{}] {} {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    format!("#{uid}").bold(),
                    truncate(&title, 40)
                ));
            }

            ProgressEvent::StateChanged { uid, state } => {
                self.main_bar
                    .set_message(format!("{} {}", format!("#{uid}").bold(), state.to_string().dimmed()));
            }

            ProgressEvent::Encoding { uid, pipeline } => {
                self.main_bar.set_message(format!(
                    "{GEAR}{} encoding ({})",
                    format!("#{uid}").bold(),
                    pipeline.to_string().cyan()
                ));
            }

            ProgressEvent::TransferStarting { key, total_bytes } => {
                let bar = self.get_or_create_bar(&key);
                bar.set_length(total_bytes.unwrap_or(0));
                bar.set_position(0);
            }

            ProgressEvent::TransferProgress {
                key,
                bytes_transferred,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(&key);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_transferred);
            }

            ProgressEvent::TransferCompleted { key, .. } => {
                self.finish_bar(&key);
            }

            ProgressEvent::TransferSkipped { key } => {
                self.line(format!("  {SKIP}{} is up to date", key.dimmed()));
            }

            ProgressEvent::EpisodeSkipped { uid, reason } => {
                self.line(format!(
                    "{SKIP}{} skipped: {}",
                    format!("#{uid}").bold(),
                    reason.dimmed()
                ));
            }

            ProgressEvent::EpisodeCompleted {
                uid,
                output,
                length,
                duration,
            } => {
                self.line(format!(
                    "{SUCCESS}{} {} ({} bytes, {})",
                    format!("#{uid}").bold(),
                    output.green(),
                    length.to_string().cyan(),
                    duration.cyan()
                ));
            }

            ProgressEvent::EpisodeFailed { uid, state, error } => {
                self.line(format!(
                    "{FAILURE}{} failed after {}: {}",
                    format!("#{uid}").bold(),
                    state.to_string().yellow(),
                    error.red()
                ));
            }

            ProgressEvent::RunCompleted {
                processed,
                skipped,
                failed,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} published, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    processed.to_string().green().bold(),
                    skipped.to_string().yellow(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Asks on the terminal; anything but a terminal gets "no"
struct TerminalPrompt {
    multi: Option<MultiProgress>,
}

impl TerminalPrompt {
    fn ask_terminal(question: &str) -> bool {
        let term = Term::stdout();
        if !term.is_term() {
            return false;
        }

        loop {
            let _ = term.write_str(&format!("{} [y/n/q] ", question.bold()));
            let Ok(answer) = term.read_line() else {
                return false;
            };
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return true,
                "n" | "no" | "" => return false,
                "q" | "quit" => {
                    println!("{}", "Aborted".yellow());
                    std::process::exit(0);
                }
                _ => continue,
            }
        }
    }
}

#[async_trait]
impl Confirm for TerminalPrompt {
    async fn ask(&self, question: &str) -> bool {
        let question = question.to_string();
        let multi = self.multi.clone();

        // Reading the answer blocks, so keep it off the runtime where Ctrl-C
        // is being watched
        let answer = tokio::task::spawn_blocking(move || match multi {
            Some(multi) => multi.suspend(|| Self::ask_terminal(&question)),
            None => Self::ask_terminal(&question),
        });
        answer.await.unwrap_or(false)
    }
}

/// Run `task` unless Ctrl-C arrives first. On interrupt the task is dropped,
/// which kills any encoder it was waiting for.
async fn interruptible<T>(task: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        value = task => Some(value),
        _ = tokio::signal::ctrl_c() => None,
    }
}

/// Leave without waiting for a prompt that may still be reading stdin
fn exit_interrupted() -> ! {
    eprintln!("\n{}", "Interrupted".yellow());
    std::process::exit(130);
}

fn confirm_mode(force: bool, dry_run: bool, multi: Option<MultiProgress>) -> SharedConfirm {
    if dry_run {
        AlwaysNo::shared()
    } else if force {
        AlwaysYes::shared()
    } else {
        Arc::new(TerminalPrompt { multi })
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_store(spec: &PodcastSpec) -> Result<SharedStore> {
    let endpoint = spec.config.storage.endpoint.trim();
    if endpoint.is_empty() {
        bail!("No storage endpoint configured (config.storage.endpoint)");
    }

    if is_remote_endpoint(endpoint) {
        let store = RemoteStore::new(ReqwestClient::new(), endpoint)?;
        Ok(Arc::new(store))
    } else {
        Ok(Arc::new(DirectoryStore::new(endpoint)))
    }
}

/// Everything a spec-driven command needs
struct Session {
    store: YamlSpecStore,
    spec: PodcastSpec,
    publisher: Publisher,
    confirm: SharedConfirm,
}

impl Session {
    fn open(
        spec_path: &Path,
        confirm: SharedConfirm,
        reporter: SharedProgressReporter,
    ) -> Result<Self> {
        let store = YamlSpecStore::new(spec_path);
        let spec = store
            .load()
            .with_context(|| format!("Failed to load {}", spec_path.display()))?;

        let local_dir = spec.config.local_storage_path()?;
        let publisher = Publisher::new(
            open_store(&spec)?,
            ShellTool::shared(),
            local_dir,
            confirm.clone(),
            reporter,
        );

        Ok(Self {
            store,
            spec,
            publisher,
            confirm,
        })
    }

    fn output_bucket(&self) -> &str {
        &self.spec.config.storage.output
    }

    /// Offer to write the specification back
    async fn persist(&mut self) -> Result<()> {
        let question = format!("Save changes to {}?", self.store.path().display());
        let Some(save) = interruptible(self.confirm.ask(&question)).await else {
            exit_interrupted();
        };
        if !save {
            println!("{}", "Specification left unchanged".yellow());
            return Ok(());
        }

        self.store.save(&mut self.spec)?;
        println!(
            "{SUCCESS}Saved {}",
            self.store.path().display().to_string().cyan()
        );
        Ok(())
    }
}

fn object_key(file: &Path, key: Option<String>) -> Result<String> {
    if let Some(key) = key {
        return Ok(key);
    }
    file.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no file name", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podpress".bold().magenta(),
            "- Podcast Publisher".dimmed()
        );
    }

    let (reporter, multi): (SharedProgressReporter, Option<MultiProgress>) = if args.quiet {
        (NoopReporter::shared(), None)
    } else {
        let reporter = IndicatifReporter::new();
        let multi = reporter.multi.clone();
        (Arc::new(reporter), Some(multi))
    };

    match args.command {
        Command::Encode {
            uids,
            force,
            dry_run,
            stop_on_error,
            skip_checks,
            remove_remote_master,
        } => {
            let confirm = confirm_mode(force, dry_run, multi);
            let mut session = Session::open(&args.spec, confirm, reporter)?;
            let options = PublishOptions {
                force,
                continue_on_error: !stop_on_error,
                check_executables: !skip_checks,
                remove_remote_master,
            };
            let selection = Selection::from_uids(uids);

            let run = session.publisher.publish(&mut session.spec, &selection, &options);
            let Some(result) = interruptible(run).await else {
                exit_interrupted();
            };
            let report = result.context("Publishing failed")?;

            if !args.quiet && !report.failed.is_empty() {
                println!("\n{}", "Failed episodes:".red().bold());
                for failure in &report.failed {
                    println!(
                        "  {}{} ({}) - {}",
                        CROSS,
                        format!("#{}", failure.uid).yellow(),
                        failure.state,
                        failure.error.dimmed()
                    );
                }
            }
            if report.mutations.is_dirty() {
                session.persist().await?;
            }

            if report.all_failed() {
                return Err(PublishError::AllEpisodesFailed.into());
            }
        }

        Command::Resolve {
            uids,
            force,
            dry_run,
        } => {
            let confirm = confirm_mode(force, dry_run, multi);
            let mut session = Session::open(&args.spec, confirm, reporter)?;
            let selection = Selection::from_uids(uids);

            let run = session.publisher.resolve_metadata(&mut session.spec, &selection);
            let Some(result) = interruptible(run).await else {
                exit_interrupted();
            };
            let mutations = result?;

            if mutations.is_dirty() {
                for mutation in mutations.iter() {
                    println!("  {} {mutation}", "changed".cyan());
                }
                session.persist().await?;
            } else {
                println!("{SUCCESS}Nothing to resolve");
            }
        }

        Command::Upload {
            file,
            key,
            force,
            dry_run,
        } => {
            let confirm = confirm_mode(force, dry_run, multi);
            let session = Session::open(&args.spec, confirm.clone(), reporter)?;
            let key = object_key(&file, key)?;
            let bucket = session.output_bucket();
            let sync = session.publisher.sync();

            match sync.diff(bucket, &key, &file).await? {
                DiffOutcome::Identical => {
                    println!("{SKIP}{bucket}/{key} is identical, nothing to upload");
                    return Ok(());
                }
                DiffOutcome::RemoteMissing => println!("{bucket}/{key} does not exist yet"),
                DiffOutcome::Changed(diff) => print!("{diff}"),
            }

            let question = format!("Upload {} to {bucket}/{key}?", file.display());
            let Some(upload) = interruptible(confirm.ask(&question)).await else {
                exit_interrupted();
            };
            if !upload {
                return Ok(());
            }

            let storage_class = Some(session.spec.config.storage.output_storage_class.as_str());
            let size = sync.upload(bucket, &key, &file, None, storage_class).await?;
            println!("{SUCCESS}Uploaded {bucket}/{key} ({size} bytes)");
        }

        Command::Diff { file, key } => {
            let session = Session::open(&args.spec, AlwaysNo::shared(), reporter)?;
            let key = object_key(&file, key)?;
            let bucket = session.output_bucket();

            match session.publisher.sync().diff(bucket, &key, &file).await? {
                DiffOutcome::Identical => println!("{bucket}/{key} is identical"),
                DiffOutcome::RemoteMissing => println!("{bucket}/{key} does not exist"),
                DiffOutcome::Changed(diff) => print!("{diff}"),
            }
        }

        Command::Chapters { uid } => {
            let spec = YamlSpecStore::new(&args.spec)
                .load()
                .with_context(|| format!("Failed to load {}", args.spec.display()))?;
            let episode = spec
                .episode(uid)
                .with_context(|| format!("No episode with uid {uid}"))?;
            print!("{}", render_chapter_list(&episode.chapters));
        }

        Command::Preprocess {
            inputs,
            preset,
            prefix,
            ffmpeg,
        } => {
            let preprocessor = Preprocessor::new(ShellTool::shared(), ffmpeg)
                .with_preset(preset)
                .with_prefix(prefix);

            let Some(result) = interruptible(preprocessor.process(&inputs)).await else {
                exit_interrupted();
            };
            let outputs = result?;
            for output in outputs {
                println!("{SUCCESS}{}", output.display().to_string().green());
            }
        }
    }

    Ok(())
}
