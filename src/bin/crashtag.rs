extern crate anyhow;
extern crate clap;
extern crate crashtag;
#[macro_use]
extern crate log;
extern crate num_cpus;
extern crate rayon;
extern crate serde_json;

use anyhow::{bail, Context, Result};
use clap::{App, Arg, ArgGroup};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::path::Path;
use std::sync::RwLock;

use crashtag::hook::{Rule, SCROLLBAR_RULES};
use crashtag::report::Report;
use crashtag::rules;
use crashtag::util;

/// Log tags appended to the report.
fn log_tags(path: &Path, added: &[String]) {
    if added.is_empty() {
        info!("{}: no scrollbar involvement", path.display());
    } else {
        info!("{}: added tags: {}", path.display(), added.join(" "));
    }
}

/// Annotate every report in directory in place.
///
/// # Arguments
///
/// * `dir` - directory with reports
///
/// * `extra` - custom rules
///
/// * `dedup` - skip tags the report already has
///
/// * `jobs` - number of parallel jobs
fn annotate_dir(dir: &Path, extra: &[Rule], dedup: bool, jobs: usize) -> Result<()> {
    let paths = util::report_paths(dir)
        .with_context(|| format!("Couldn't read directory {}", dir.display()))?;
    if paths.is_empty() {
        info!("No reports found in {}", dir.display());
        return Ok(());
    }
    info!("Annotating {} reports...", paths.len());

    // Start thread pool.
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.min(paths.len()))
        .build_global()
        .with_context(|| "Couldn't start thread pool")?;

    let tagged: RwLock<usize> = RwLock::new(0);
    let failed: RwLock<Vec<&Path>> = RwLock::new(Vec::new());
    paths
        .par_iter()
        .for_each(|path| match util::annotate_file(path, extra, dedup) {
            Ok(added) if added.is_empty() => {
                debug!("{}: no scrollbar involvement", path.display());
            }
            Ok(added) => {
                log_tags(path, &added);
                *tagged.write().unwrap() += 1;
            }
            Err(err) => {
                error!("{}", err);
                failed.write().unwrap().push(path.as_path());
            }
        });

    let tagged = *tagged.read().unwrap();
    let failed = failed.read().unwrap();
    info!(
        "Processed {} reports: tagged {}, failed {}",
        paths.len(),
        tagged,
        failed.len()
    );
    if !failed.is_empty() {
        bail!(
            "Couldn't annotate {} reports: {}",
            failed.len(),
            failed
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<String>>()
                .join(", ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = App::new("crashtag")
        .version("0.1.0")
        .author("Andrey Fedotov <fedotoff@ispras.ru>, Alexey Vishnyakov <vishnya@ispras.ru>, Georgy Savidov <avgor46@ispras.ru>")
        .about("Tag crash reports that involve the overlay scrollbar")
        .term_width(90)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .short('l')
                .takes_value(true)
                .default_value("info")
                .possible_values(["info", "debug"])
                .help("Logging level")
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .takes_value(true)
                .value_name("REPORT")
                .help("Apport (.crash) or JSON (.casrep, .json) report to annotate")
                .validator(|arg| {
                    if !Path::new(arg).is_file() {
                        bail!("Report {} doesn't exist.", arg);
                    }
                    Ok(())
                })
        )
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .takes_value(true)
                .value_name("DIR")
                .help("Annotate all reports in directory in place")
                .validator(|arg| {
                    if !Path::new(arg).is_dir() {
                        bail!("Directory {} doesn't exist.", arg);
                    }
                    Ok(())
                })
        )
        .arg(
            Arg::new("list-rules")
                .long("list-rules")
                .help("Print tagging rules in JSON format and exit")
        )
        .group(
            ArgGroup::new("source")
                .args(&["input", "dir", "list-rules"])
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Path to save annotated report")
        )
        .arg(
            Arg::new("stdout")
                .long("stdout")
                .help("Print annotated report to stdout")
        )
        .arg(
            Arg::new("in-place")
                .long("in-place")
                .help("Rewrite input report")
        )
        .group(
            ArgGroup::new("out")
                .args(&["output", "stdout", "in-place"])
                .conflicts_with("dir"),
        )
        .arg(
            Arg::new("rules")
                .long("rules")
                .takes_value(true)
                .value_name("FILE")
                .help("File with extra rules, one \"FIELD NEEDLE TAG\" per line")
        )
        .arg(
            Arg::new("dedup")
                .long("dedup")
                .help("Do not append tags the report already has")
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .value_name("N")
                .takes_value(true)
                .help("Number of parallel jobs to annotate reports in directory")
                .validator(|arg| {
                    if let Ok(x) = arg.parse::<u64>() {
                        if x > 0 {
                            return Ok(());
                        }
                    }
                    Err(String::from("Couldn't parse jobs value"))
                }),
        )
        .get_matches();

    // Init log.
    util::initialize_logging(matches.value_of("log-level").unwrap_or("info"));

    let extra = if let Some(path) = matches.value_of("rules") {
        rules::rules_from_file(Path::new(path))
            .with_context(|| format!("Couldn't read rules from {}", path))?
    } else {
        Vec::new()
    };
    let dedup = matches.is_present("dedup");

    if matches.is_present("list-rules") {
        let all: Vec<&Rule> = SCROLLBAR_RULES.iter().chain(extra.iter()).collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    if let Some(dir) = matches.value_of("dir") {
        let jobs = if let Some(jobs) = matches.value_of("jobs") {
            jobs.parse::<usize>()?
        } else {
            std::cmp::max(1, num_cpus::get() / 2)
        };
        return annotate_dir(Path::new(dir), &extra, dedup, jobs);
    }

    let Some(input) = matches.value_of("input") else {
        bail!("--input, --dir or --list-rules should be specified.");
    };
    let input = Path::new(input);

    if matches.is_present("in-place") {
        let added = util::annotate_file(input, &extra, dedup)
            .with_context(|| format!("Couldn't annotate report {}", input.display()))?;
        log_tags(input, &added);
        return Ok(());
    }

    if !matches.is_present("output") && !matches.is_present("stdout") {
        bail!("--stdout, --output or --in-place should be specified with --input.");
    }

    let mut report = Report::from_file(input)
        .with_context(|| format!("Couldn't read report {}", input.display()))?;
    let added = util::annotate(&mut report, &extra, dedup);
    log_tags(input, &added);

    let output = matches.value_of("output").map(Path::new);
    util::output_report(&report, output).with_context(|| match output {
        Some(path) => format!("Couldn't save report to file: {}", path.display()),
        None => "Couldn't print report".to_string(),
    })
}
