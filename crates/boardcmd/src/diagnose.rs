use anyhow::Result;
use boardcmd_board::Board;
use clap::Args;
use colored::Colorize;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// Board file to probe
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Serialize)]
pub struct Probe {
    pub name: &'static str,
    pub status: Status,
    pub details: Vec<String>,
}

impl Probe {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            status: Status::Pass,
            details: Vec::new(),
        }
    }

    fn detail(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    fn fail(mut self, line: impl Into<String>) -> Self {
        self.detail(line);
        self.status = Status::Fail;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub file: PathBuf,
    pub probes: Vec<Probe>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.probes
            .iter()
            .filter(|p| p.status == Status::Fail)
            .count()
    }
}

pub fn execute(args: DiagnoseArgs) -> Result<()> {
    let report = diagnose(&args.file);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let failures = report.failures();
    if failures > 0 {
        anyhow::bail!(
            "{failures} of {} board probes failed",
            report.probes.len()
        );
    }
    Ok(())
}

pub fn diagnose(file: &Path) -> Report {
    Report {
        file: file.to_path_buf(),
        probes: vec![probe_new_board(), probe_load(file), probe_save_reload()],
    }
}

fn probe_new_board() -> Probe {
    let mut probe = Probe::new("create_board");
    let board = Board::new();
    probe.detail(format!("layers: {}", board.layers().len()));
    probe.detail(format!("copper layers: {}", board.copper_layer_count()));

    match Board::parse(&board.to_kicad_string()) {
        Ok(reparsed) => {
            probe.detail(format!(
                "serialised board re-parses (version {})",
                reparsed.version().unwrap_or_default()
            ));
            probe
        }
        Err(e) => probe.fail(format!("serialised board does not parse: {e}")),
    }
}

/// `<dir>/<stem>/<name>` next to a missing `<dir>/<name>`, where KiCad projects usually live.
fn alternative_path(file: &Path) -> Option<PathBuf> {
    let name = file.file_name()?;
    let stem = file.file_stem()?;
    let dir = file.parent().unwrap_or(Path::new(""));
    Some(dir.join(stem).join(name))
}

fn probe_load(file: &Path) -> Probe {
    let mut probe = Probe::new("load_board");
    probe.detail(format!("path: {}", file.display()));

    if !file.exists() {
        probe.status = Status::Skip;
        probe.detail("file not found");
        if let Some(alt) = alternative_path(file) {
            probe.detail(format!(
                "try alternative: {} (exists: {})",
                alt.display(),
                alt.exists()
            ));
        }
        return probe;
    }

    let board = match Board::load(file) {
        Ok(board) => board,
        Err(e) => return probe.fail(format!("load failed: {e}")),
    };

    match board.file_name() {
        Some(name) => probe.detail(format!("file name: {}", name.display())),
        None => return probe.fail("loaded board has no file name"),
    }
    if let Some(version) = board.version() {
        probe.detail(format!("format version: {version}"));
    }
    if let Some(title) = board.title() {
        probe.detail(format!("title: {title}"));
    }
    match board.edges_bounding_box() {
        Some(bbox) => {
            probe.detail(format!("edge bbox width: {} mm", bbox.width()));
            probe.detail(format!("edge bbox height: {} mm", bbox.height()));
        }
        None => probe.detail("edge bbox: no Edge.Cuts outline"),
    }
    probe.detail(format!("footprint count: {}", board.footprint_count()));
    probe.detail(format!("net count: {}", board.net_count()));
    probe
}

fn probe_save_reload() -> Probe {
    let mut probe = Probe::new("save_reload");
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => return probe.fail(format!("cannot create temporary directory: {e}")),
    };
    let path = dir.path().join("boardcmd_diag.kicad_pcb");

    let mut board = Board::new();
    board.set_file_name(&path);
    if let Err(e) = board.save() {
        return probe.fail(format!("save failed: {e}"));
    }
    probe.detail(format!("saved to: {}", path.display()));
    debug!("Diagnostic board written to {}", path.display());

    let reloaded = match Board::load(&path) {
        Ok(board) => board,
        Err(e) => return probe.fail(format!("reload failed: {e}")),
    };
    match reloaded.file_name() {
        Some(name) if name == path => {
            probe.detail(format!("reloaded file name: {}", name.display()));
            probe
        }
        other => probe.fail(format!("reloaded file name mismatch: {other:?}")),
    }
}

fn print_report(report: &Report) {
    println!("Board diagnostics for {}", report.file.display().to_string().bold());
    for probe in &report.probes {
        let status = match probe.status {
            Status::Pass => "PASS".green().bold(),
            Status::Fail => "FAIL".red().bold(),
            Status::Skip => "SKIP".yellow().bold(),
        };
        println!();
        println!("{status} {}", probe.name);
        for line in &probe.details {
            println!("     {line}");
        }
    }
}
