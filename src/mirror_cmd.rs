use crate::config::{Config, MIRROR_SECTION};
use crate::fs::OsFileSystem;
use crate::replay::{FaultPolicy, ReplayEvent, ReplayOptions, ReplayReport, TreeReplayer};
use crate::text_encoding::{DEFAULT_ANSI_CODEPAGE, EncodingFallback};
use crate::tree_listing::parse_file;
use anyhow::{Context, anyhow};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use yaml_rust2::Yaml;

#[derive(Debug, Clone, Default)]
pub(crate) struct MirrorOptions {
    pub(crate) replay: ReplayOptions,
    pub(crate) encodings: EncodingFallback,
    pub(crate) dry_run: bool,
}

impl MirrorOptions {
    /// Options from config, with command line flags taking precedence. An
    /// explicit `fix_garbled` replaces the stored value in either direction.
    pub(crate) fn from_config(
        config: &Config,
        fix_garbled: Option<bool>,
        keep_going: bool,
        dry_run: bool,
    ) -> Self {
        let fix_garbled = fix_garbled
            .or_else(|| config.get_bool(MIRROR_SECTION, "fix_garbled"))
            .unwrap_or(false);
        let fault_policy = if keep_going {
            FaultPolicy::SkipSubtree
        } else {
            config
                .get_str(MIRROR_SECTION, "fault_policy")
                .and_then(|label| {
                    let policy = FaultPolicy::from_label(&label);
                    if policy.is_none() {
                        warn!("Unknown fault policy {label:?}, using {}", FaultPolicy::default());
                    }
                    policy
                })
                .unwrap_or_default()
        };
        let ansi_codepage = config
            .get_str(MIRROR_SECTION, "ansi_codepage")
            .unwrap_or_else(|| DEFAULT_ANSI_CODEPAGE.to_string());
        let encodings = match config.get_str_list(MIRROR_SECTION, "encodings") {
            Some(labels) => EncodingFallback::from_labels(&labels, &ansi_codepage),
            None => EncodingFallback::new(vec![], &ansi_codepage),
        };
        MirrorOptions {
            replay: ReplayOptions {
                fix_garbled,
                fault_policy,
            },
            encodings,
            dry_run,
        }
    }
}

#[derive(Debug)]
pub(crate) struct MirrorSummary {
    pub(crate) elapsed_secs: f64,
    pub(crate) message: String,
    pub(crate) report: ReplayReport,
}

pub(crate) fn main(
    tree: &Option<String>,
    output: &Option<String>,
    fix_garbled: &Option<bool>,
    keep_going: &bool,
    config_path: &String,
    debug: &bool,
    dry_run: &bool,
) -> anyhow::Result<()> {
    let mut config = Config::load(Path::new(config_path));

    let tree_s = tree
        .clone()
        .or_else(|| config.get_str(MIRROR_SECTION, "target_folder"))
        .ok_or_else(|| anyhow!("Tree file path is empty"))?;
    let tree_file = PathBuf::from(&tree_s);
    if !tree_file.is_file() {
        return Err(anyhow!("Invalid tree file: {tree_s}"));
    }
    let output_s = output
        .clone()
        .or_else(|| config.get_str(MIRROR_SECTION, "export_folder"))
        .ok_or_else(|| anyhow!("Destination folder is empty"))?;
    let destination = PathBuf::from(&output_s);
    check_destination(&tree_file, &destination)?;

    let options = MirrorOptions::from_config(&config, *fix_garbled, *keep_going, *dry_run);
    info!("Start creating tree mirror, file: {tree_file:?}");
    info!(
        "Fix garbled names: {}",
        if options.replay.fix_garbled { "on" } else { "off" }
    );
    info!("On error: {}", options.replay.fault_policy);
    debug!("Encodings: {:?}", options.encodings.encodings());

    if *dry_run {
        debug!("Dry run: would save config to {config_path:?}");
    } else {
        config.set(MIRROR_SECTION, "target_folder", Yaml::String(tree_s.clone()));
        config.set(MIRROR_SECTION, "export_folder", Yaml::String(output_s.clone()));
        config.set(MIRROR_SECTION, "fix_garbled", Yaml::Boolean(options.replay.fix_garbled));
        if let Err(e) = config.save() {
            warn!("{e:#}");
        }
    }

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        run(&tree_file, &destination, &options, &mut |event| {
            let _ = tx.send(event);
        })
    });

    let bar = if *debug {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    while let Ok(event) = rx.recv() {
        show_progress(&bar, event);
    }
    bar.finish_and_clear();

    let summary = worker
        .join()
        .map_err(|_| anyhow!("Mirror worker thread panicked"))??;
    debug!("Mirror worker finished after {:.3} seconds", summary.elapsed_secs);
    println!("{}", summary.message);
    if !summary.report.is_complete() {
        return Err(anyhow!(
            "Tree mirror is incomplete, {} error(s)",
            summary.report.faults.len()
        ));
    }
    Ok(())
}

/// Parses `tree_file` and rebuilds `destination_root` from scratch.
pub(crate) fn run(
    tree_file: &Path,
    destination_root: &Path,
    options: &MirrorOptions,
    on_event: &mut dyn FnMut(ReplayEvent),
) -> anyhow::Result<MirrorSummary> {
    info!("Generating file mirror...");
    let start = Instant::now();
    let records = parse_file(tree_file, &options.encodings)?;
    let os_fs = OsFileSystem::new(options.dry_run);
    let report = TreeReplayer::new(&os_fs, options.replay).replay(&records, destination_root, on_event)?;
    let elapsed_secs = start.elapsed().as_secs_f64();
    let message = summary_message(destination_root, records.len(), &report, elapsed_secs);
    info!("{message}");
    Ok(MirrorSummary {
        elapsed_secs,
        message,
        report,
    })
}

fn summary_message(root: &Path, total: usize, report: &ReplayReport, elapsed_secs: f64) -> String {
    let mut message = format!(
        "Mirror of {total} entries created in {root:?}: {} directories, {} files, total time {elapsed_secs:.2} seconds",
        report.directories, report.files
    );
    if report.skipped > 0 {
        message.push_str(&format!(", {} skipped", report.skipped));
    }
    if report.aborted {
        let processed = report.directories + report.files + report.skipped + report.faults.len();
        message.push_str(&format!(
            ". Incomplete: stopped at the first error, {} entries not processed",
            total.saturating_sub(processed)
        ));
    } else if !report.faults.is_empty() {
        message.push_str(&format!(". Incomplete: {} error(s)", report.faults.len()));
    }
    message
}

/// The destination is wiped before replay, it must not hold the tree file.
fn check_destination(tree_file: &Path, destination: &Path) -> anyhow::Result<()> {
    if !destination.exists() {
        return Ok(());
    }
    let tree_abs = tree_file
        .canonicalize()
        .with_context(|| format!("Unable to resolve {tree_file:?}"))?;
    let destination_abs = destination
        .canonicalize()
        .with_context(|| format!("Unable to resolve {destination:?}"))?;
    if tree_abs.starts_with(&destination_abs) {
        return Err(anyhow!(
            "Destination folder {destination:?} contains the tree file and would be deleted"
        ));
    }
    Ok(())
}

fn show_progress(bar: &ProgressBar, event: ReplayEvent) {
    match event {
        ReplayEvent::Started { total } => {
            bar.set_length(total as u64);
        }
        ReplayEvent::Placed { kind, path } => {
            bar.inc(1);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            bar.set_message(format!("{kind} {name}"));
        }
        ReplayEvent::Skipped { name } => {
            bar.inc(1);
            debug!("Skipped {name}");
        }
        ReplayEvent::Anchored { name } => {
            bar.inc(1);
            debug!("Anchored {name} at the destination root");
        }
        ReplayEvent::Faulted { message } => {
            bar.inc(1);
            bar.println(format!("Error: {message}"));
        }
    }
}
