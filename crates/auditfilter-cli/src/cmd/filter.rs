//! `afctl filter`: create, update, delete, show and import audit log filters.

use crate::cmd::{Context, read_definition};
use crate::output::{CliError, render, text_kv};
use auditfilter_core::FilterController;
use auditfilter_core::controller::{UpdateReport, UpdateState, Warning};
use auditfilter_core::error::ControllerError;
use auditfilter_core::model::FilterRecord;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum FilterCommand {
    #[command(
        about = "Create a filter",
        after_help = "EXAMPLES:\n    # Create from a file\n    afctl filter create log_conn conn.json\n\n    # Read the definition from stdin\n    cat conn.json | afctl filter create log_conn -"
    )]
    Create(FilterDefinitionArgs),

    #[command(
        about = "Replace a filter's definition",
        long_about = "Replace a filter's definition. The store cannot update filters in place, \
                      so the filter is removed, recreated, and its user assignments restored. \
                      If recreation fails the previous definition is put back.",
        after_help = "EXAMPLES:\n    # Update and show the state trace\n    afctl filter update log_conn conn.json\n\n    # Emit machine-readable output\n    afctl filter update log_conn conn.json --json"
    )]
    Update(FilterDefinitionArgs),

    #[command(about = "Delete a filter and, with it, every assignment to it")]
    Delete(FilterNameArgs),

    #[command(about = "Show a filter as currently stored")]
    Show(ShowArgs),

    #[command(about = "Adopt an existing filter by name")]
    Import(FilterNameArgs),
}

#[derive(Args, Debug)]
pub struct FilterDefinitionArgs {
    /// Filter name.
    pub name: String,

    /// Definition file, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct FilterNameArgs {
    /// Filter name.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Filter name.
    pub name: String,

    /// Definition to compare against; reports drift when the stored one differs.
    #[arg(long, value_name = "FILE")]
    pub expect: Option<PathBuf>,
}

pub fn run(command: &FilterCommand, ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let controller = FilterController::new(&store);

    match command {
        FilterCommand::Create(args) => {
            let text = read_definition(&args.file)?;
            let record = controller.create(&args.name, &text)?;
            render(ctx.output, &record, |r, w| {
                writeln!(w, "created filter '{}'", r.name)?;
                write_record(w, r)
            })
        }
        FilterCommand::Update(args) => {
            let text = read_definition(&args.file)?;
            let report = controller.update(&args.name, &text);
            render(ctx.output, &UpdateOutput::from(&report), write_update)?;
            report.into_result()?;
            Ok(())
        }
        FilterCommand::Delete(args) => {
            controller.delete(&args.name)?;
            render(
                ctx.output,
                &serde_json::json!({ "name": &args.name, "deleted": true }),
                |_, w| writeln!(w, "deleted filter '{}'", args.name),
            )
        }
        FilterCommand::Show(args) => {
            let expected = args.expect.as_deref().map(read_definition).transpose()?;
            let observation = controller
                .read(&args.name, expected.as_deref())?
                .ok_or_else(|| ControllerError::FilterNotFound(args.name.clone()))?;
            render(ctx.output, &observation, |o, w| {
                write_record(w, &o.record)?;
                if expected.is_some() {
                    text_kv(w, "drifted", if o.drifted { "yes" } else { "no" })?;
                }
                Ok(())
            })
        }
        FilterCommand::Import(args) => {
            let record = controller.import(&args.name)?;
            render(ctx.output, &record, |r, w| {
                writeln!(w, "imported filter '{}'", r.name)?;
                write_record(w, r)
            })
        }
    }
}

fn write_record(w: &mut dyn Write, record: &FilterRecord) -> io::Result<()> {
    text_kv(w, "name", &record.name)?;
    text_kv(w, "filter_id", record.filter_id.to_string())?;
    text_kv(w, "definition", &record.stored_text)
}

#[derive(Debug, Serialize)]
struct RestorationOutput {
    user: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateOutput<'a> {
    name: &'a str,
    state: UpdateState,
    trace: &'a [UpdateState],
    warnings: &'a [Warning],
    restorations: Vec<RestorationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a FilterRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<CliError>,
}

impl<'a> From<&'a UpdateReport> for UpdateOutput<'a> {
    fn from(report: &'a UpdateReport) -> Self {
        Self {
            name: &report.filter_name,
            state: report.state(),
            trace: &report.trace,
            warnings: &report.warnings,
            restorations: report
                .restorations
                .iter()
                .map(|outcome| RestorationOutput {
                    user: outcome.assignment.key().spec(),
                    ok: outcome.is_ok(),
                    error: outcome.result.as_ref().err().map(ToString::to_string),
                })
                .collect(),
            record: report.record.as_ref(),
            error: report.error.as_ref().map(CliError::from),
        }
    }
}

fn write_update(out: &UpdateOutput<'_>, w: &mut dyn Write) -> io::Result<()> {
    for warning in out.warnings {
        writeln!(w, "warning: {}", warning.summary)?;
        writeln!(w, "  {}", warning.detail)?;
    }
    text_kv(w, "filter", out.name)?;
    text_kv(w, "state", out.state.as_str())?;
    let trace: Vec<&str> = out.trace.iter().map(|state| state.as_str()).collect();
    text_kv(w, "trace", trace.join(" -> "))?;
    if !out.restorations.is_empty() {
        let restored = out.restorations.iter().filter(|r| r.ok).count();
        text_kv(
            w,
            "restored",
            format!("{restored}/{} assignments", out.restorations.len()),
        )?;
    }
    if let Some(record) = out.record {
        text_kv(w, "filter_id", record.filter_id.to_string())?;
        text_kv(w, "definition", &record.stored_text)?;
    }
    Ok(())
}
