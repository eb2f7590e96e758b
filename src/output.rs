//! Result rendering for the `boardflow` commands.
//!
//! Every command answers either as a JSON envelope on stdout or as a short
//! plain-text report. Errors use the same envelope with `status = "error"`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "boardflow.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Details,
    Warnings,
    NextSteps,
}

impl Section {
    fn title(self) -> &'static str {
        match self {
            Section::Details => "Details",
            Section::Warnings => "Warnings",
            Section::NextSteps => "Next steps",
        }
    }
}

/// Plain-text report: a header, `key: value` summary rows, then bulleted
/// sections. Warnings and next steps also travel in the JSON envelope.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    sections: BTreeMap<Section, Vec<String>>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            sections: BTreeMap::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.push(Section::Details, line);
    }

    pub fn push_warning(&mut self, line: impl Into<String>) {
        self.push(Section::Warnings, line);
    }

    pub fn push_next_step(&mut self, line: impl Into<String>) {
        self.push(Section::NextSteps, line);
    }

    fn push(&mut self, section: Section, line: impl Into<String>) {
        self.sections.entry(section).or_default().push(line.into());
    }

    fn lines(&self, section: Section) -> &[String] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or_default()
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        if !self.summary.is_empty() {
            write!(f, "\n\nSummary:")?;
            for (key, value) in &self.summary {
                match value.as_str() {
                    "" => write!(f, "\n- {key}")?,
                    value => write!(f, "\n- {key}: {value}")?,
                }
            }
        }
        for (section, lines) in &self.sections {
            write!(f, "\n\n{}:", section.title())?;
            for line in lines {
                write!(f, "\n- {line}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(flatten)]
    error: JsonError,
    kind: &'static str,
}

fn print_json(payload: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            warnings: human.map(|h| h.lines(Section::Warnings)).unwrap_or_default(),
            next_steps: human.map(|h| h.lines(Section::NextSteps)).unwrap_or_default(),
        });
    }
    if let (false, Some(human)) = (options.quiet, human) {
        println!("{human}");
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hints = hints_for(err);
    if json {
        return print_json(&Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(ErrorBody {
                error: JsonError::from(err),
                kind: error_kind(err),
            }),
            warnings: &[],
            next_steps: &hints,
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = hints.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// First positional argument, skipping global flags and their values.
fn infer_command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--root" => {
                args.next();
            }
            flag if flag.starts_with('-') => {}
            _ => return arg,
        }
    }
    "boardflow".to_string()
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "backend_rejected",
        _ => "operation_failed",
    }
}

fn hints_for(err: &Error) -> Vec<String> {
    let hint = match err {
        Error::BoardNotInitialized(_) => "boardflow init",
        Error::TaskNotFound(_) => "boardflow columns --scope <scope>",
        Error::InvalidConfig(_) => "fix .boardflow.toml then retry",
        Error::LockFailed(_) => "retry once other boardflow processes finish",
        Error::Backend(_) | Error::BackendTimeout(_) => "the change was rolled back; retry the move",
        _ => return Vec::new(),
    };
    vec![hint.to_string()]
}
