use crate::error;
use crate::hook::{self, Rule};
use crate::report::{Report, ReportFormat};

use log::debug;
use nix::fcntl::{flock, FlockArg};
use simplelog::*;
use std::fs::{self, OpenOptions};
use std::io::prelude::*;
use std::io::SeekFrom;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Report file extensions picked up from directories.
pub const REPORT_EXTENSIONS: [&str; 3] = ["crash", "casrep", "json"];

/// Initialize logging with level from command line arguments (debug or info).
pub fn initialize_logging(log_level: &str) {
    let log_level = if log_level == "debug" {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = TermLogger::init(
        log_level,
        ConfigBuilder::new().set_time_to_local(true).build(),
        TerminalMode::Stderr,
    );
}

/// Annotate report and return appended tags.
///
/// # Arguments
///
/// * `report` - report to annotate
///
/// * `extra` - rules applied after the scrollbar rules
///
/// * `dedup` - skip tags the report already has
pub fn annotate(report: &mut Report, extra: &[Rule], dedup: bool) -> Vec<String> {
    let mut added: Vec<String> = hook::apply_rules(report, hook::SCROLLBAR_RULES.as_slice(), dedup)
        .into_iter()
        .map(|t| t.to_string())
        .collect();
    added.extend(
        hook::apply_rules(report, extra, dedup)
            .into_iter()
            .map(|t| t.to_string()),
    );
    added
}

/// Annotate report file in place.
///
/// The file is locked while it is read and rewritten. Reports without new
/// tags are left untouched.
///
/// # Arguments
///
/// * `path` - path to report
///
/// * `extra` - rules applied after the scrollbar rules
///
/// * `dedup` - skip tags the report already has
///
/// # Return value
///
/// Appended tags
pub fn annotate_file(path: &Path, extra: &[Rule], dedup: bool) -> error::Result<Vec<String>> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    flock(file.as_raw_fd(), FlockArg::LockExclusive)?;
    debug!("Annotating report {}", path.display());

    let mut text = String::new();
    file.read_to_string(&mut text)?;
    let mut report = Report::parse(&text, ReportFormat::from_path(path))
        .map_err(|e| error::Error::Report(format!("{}: {}", path.display(), e)))?;

    let added = annotate(&mut report, extra, dedup);
    if added.is_empty() {
        debug!("No tags for report {}", path.display());
        return Ok(added);
    }

    let repstr = report.to_string();
    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(repstr.as_bytes())?;
    file.flush()?;
    Ok(added)
}

/// Write annotated report to file or stdout.
///
/// # Arguments
///
/// * `report` - annotated report
///
/// * `path` - output file, stdout if `None`
pub fn output_report(report: &Report, path: Option<&Path>) -> error::Result<()> {
    let repstr = report.to_string();
    if let Some(path) = path {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        file.write_all(repstr.as_bytes())?;
    } else {
        print!("{}", repstr);
    }
    Ok(())
}

/// Get report paths from directory.
///
/// # Arguments
///
/// * `dir` - directory with reports
///
/// # Return value
///
/// Sorted paths to files with report extensions
pub fn report_paths(dir: &Path) -> error::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_report = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| REPORT_EXTENSIONS.contains(&e));
        if is_report {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
