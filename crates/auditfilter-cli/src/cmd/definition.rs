//! `afctl validate` and `afctl canonicalize`: offline definition checks.
//!
//! Neither command opens the store.

use crate::cmd::{Context, read_definition};
use crate::output::render;
use auditfilter_core::error::ControllerError;
use auditfilter_core::{canonicalize, validate};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DefinitionArgs {
    /// Definition file, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    valid: bool,
    canonical: String,
}

pub fn run_validate(args: &DefinitionArgs, ctx: &Context) -> anyhow::Result<()> {
    let text = read_definition(&args.file)?;
    validate(&text).map_err(ControllerError::from)?;
    let canonical = canonicalize(&text).map_err(ControllerError::from)?;

    render(
        ctx.output,
        &ValidateOutput {
            valid: true,
            canonical,
        },
        |_, w| writeln!(w, "{}: valid", args.file.display()),
    )
}

pub fn run_canonicalize(args: &DefinitionArgs, ctx: &Context) -> anyhow::Result<()> {
    let text = read_definition(&args.file)?;
    validate(&text).map_err(ControllerError::from)?;
    let canonical = canonicalize(&text).map_err(ControllerError::from)?;

    render(
        ctx.output,
        &serde_json::json!({ "canonical": &canonical }),
        |_, w| writeln!(w, "{canonical}"),
    )
}
