//! Output formatters for build reports

use anyhow::Result;
use colored::*;
use sheetpick_core::{BuildReport, BuildRequest, Plan, SheetMatch};
use std::path::PathBuf;

/// Print a finished build in human-readable format with colors
pub fn print_human(report: &BuildReport, written: &[PathBuf]) {
    println!("{}", format!("Mode: {}", report.mode).bold());
    println!();

    print_sheet_match(&report.sheet_match);

    for (output, path) in report.outputs.iter().zip(written) {
        println!(
            "{} {} {}",
            "✓".green().bold(),
            path.display().to_string().cyan(),
            format!("({} bytes)", output.size()).bright_black()
        );
    }

    if let Some(summary) = &report.summary {
        let blank = summary
            .rows
            .iter()
            .filter(|r| r.name.is_missing() || r.nav.is_none() || r.cash.is_none())
            .count();
        if blank > 0 {
            println!(
                "  {} {} summary row(s) have a blank Name, NAV or Cash",
                "Note:".blue().bold(),
                blank
            );
        }
    }
}

/// Print a dry run: what would be kept, nothing written
pub fn print_plan_human(request: &BuildRequest<'_>, plan: &Plan) {
    println!(
        "{}",
        format!("[DRY RUN] {} ({} sheets)", request.workbook_name, plan.sheets.len()).bold()
    );
    println!();

    print_sheet_match(&plan.sheet_match);

    println!("{}", "Would write:".bold().underline());
    if request.mode.wants_filtered() {
        println!("  - {}", plan.source_format.filtered_file_name());
    }
    if request.mode.wants_summary() {
        println!("  - {}", sheetpick_core::writer::SUMMARY_FILE_NAME);
    }
}

fn print_sheet_match(sheet_match: &SheetMatch) {
    println!("{}", "Matched sheets:".bold().underline());
    for name in &sheet_match.matched {
        println!("  {}", name.cyan());
    }
    println!();

    if !sheet_match.missing.is_empty() {
        println!(
            "{} These sheets were not found in the workbook:",
            "WARN".yellow().bold()
        );
        for name in &sheet_match.missing {
            println!("  - {}", name.yellow());
        }
        println!();
    }
}

/// Print a finished build in JSON format
pub fn print_json(report: &BuildReport, written: &[PathBuf]) -> Result<()> {
    let outputs: Vec<_> = report
        .outputs
        .iter()
        .zip(written)
        .map(|(output, path)| {
            serde_json::json!({
                "file_name": output.file_name,
                "path": path.display().to_string(),
                "size": output.size(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "mode": report.mode,
        "source_format": report.source_format,
        "matched": report.sheet_match.matched,
        "missing": report.sheet_match.missing,
        "outputs": outputs,
        "summary": report.summary,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print a dry run in JSON format
pub fn print_plan_json(request: &BuildRequest<'_>, plan: &Plan) -> Result<()> {
    let sheets: Vec<&str> = plan.sheets.iter().map(|s| s.name.as_str()).collect();
    let output = serde_json::json!({
        "dry_run": true,
        "workbook": request.workbook_name,
        "mode": request.mode,
        "source_format": plan.source_format,
        "sheets": sheets,
        "matched": plan.sheet_match.matched,
        "missing": plan.sheet_match.missing,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
