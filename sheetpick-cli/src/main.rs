use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sheetpick_core::session::Offer;
use sheetpick_core::{OutputMode, PickerConfig, SheetPicker, Upload, UploadSlots};
use std::fs;
use std::path::{Path, PathBuf};

mod formatter;

#[derive(Parser)]
#[command(name = "sheetpick")]
#[command(about = "Extract selected sheets and a Name/NAV/Cash summary from Excel workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Workbook (.xlsx/.xlsm) and CSV with a 'SheetName' column, in any order
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// What to build
    #[arg(short, long, value_enum, default_value = "filtered")]
    mode: Mode,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Directory the outputs are written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Match sheets and report without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// SelectedSheets.xlsx / .xlsm
    Filtered,
    /// Summary.xlsx
    Summary,
    /// Both outputs
    Both,
}

impl From<Mode> for OutputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Filtered => OutputMode::FilteredWorkbook,
            Mode::Summary => OutputMode::SummarySheet,
            Mode::Both => OutputMode::Both,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "sheetpick_core=debug,sheetpick=debug"
    } else {
        "sheetpick_core=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let picker = SheetPicker::with_config(&config).context("Invalid configuration")?;

    let mut slots = UploadSlots::new();
    for path in &cli.files {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match slots.offer(Upload::new(file_name, bytes))? {
            Offer::Stored(kind) => tracing::debug!(file = %path.display(), ?kind, "accepted input"),
            Offer::Ignored(_) => {
                tracing::warn!(file = %path.display(), "an input of this kind was already given, ignoring")
            }
        }
    }

    let request = slots
        .request(cli.mode.into())
        .context("Both a workbook and a sheet list are required")?;

    if cli.dry_run {
        let plan = picker
            .plan(&request)
            .with_context(|| format!("Failed to match sheets in {}", request.workbook_name))?;
        match cli.format {
            OutputFormat::Human => formatter::print_plan_human(&request, &plan),
            OutputFormat::Json => formatter::print_plan_json(&request, &plan)?,
        }
        return Ok(());
    }

    let report = picker
        .build(&request)
        .with_context(|| format!("Failed to process {}", request.workbook_name))?;

    // Nothing is written unless every requested output was built
    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;
    let mut written = Vec::with_capacity(report.outputs.len());
    for output in &report.outputs {
        let path = cli.output_dir.join(&output.file_name);
        fs::write(&path, &output.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    match cli.format {
        OutputFormat::Human => formatter::print_human(&report, &written),
        OutputFormat::Json => formatter::print_json(&report, &written)?,
    }

    Ok(())
}

/// Explicit `--config`, else `sheetpick.toml` in the working directory,
/// else built-in defaults
fn load_config(path: Option<&Path>) -> Result<PickerConfig> {
    if let Some(config_path) = path {
        return PickerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    let default_config_path = PathBuf::from("sheetpick.toml");
    if default_config_path.exists() {
        PickerConfig::from_file(&default_config_path).with_context(|| {
            format!(
                "Failed to load config from {}",
                default_config_path.display()
            )
        })
    } else {
        Ok(PickerConfig::default())
    }
}
