//! Run command implementation.

use super::dump::{Format, ModelDump};
use super::script::{Script, StepOutcome};
use crate::error::{CliError, CliResult};
use cadledger_core::{Config, ExecutionMode, Session};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options of the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Session configuration file.
    pub config: Option<PathBuf>,
    /// Force pooled execution.
    pub pooled: bool,
    /// Print the model after the last step.
    pub dump: bool,
    /// Output format.
    pub format: Format,
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// One-based step number.
    pub index: usize,
    /// Step operation name.
    pub op: &'static str,
    /// What the step did.
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Serialize)]
struct RunReport<'a> {
    steps: &'a [StepRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<ModelDump>,
}

/// Runs the run command.
pub fn run(script_path: &Path, options: &RunOptions) -> CliResult<()> {
    let config = load_config(options)?;
    let script = Script::load(script_path)?;
    let session = Session::open(config)?;
    info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        "running script"
    );

    let records = execute(&session, &script)?;
    let model = options.dump.then(|| ModelDump::capture(&session));

    match options.format {
        Format::Json => {
            let report = RunReport {
                steps: &records,
                model,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Text => {
            for record in &records {
                println!("{}", text_line(record));
            }
            if let Some(model) = model {
                println!();
                model.print(Format::Text)?;
            }
        }
    }
    Ok(())
}

/// Loads the session configuration, applying command-line overrides.
pub fn load_config(options: &RunOptions) -> CliResult<Config> {
    let mut config = match &options.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|err| CliError::io(path, err))?;
            serde_json::from_str(&text).map_err(|err| CliError::parse(path, err))?
        }
        None => Config::default(),
    };
    if options.pooled {
        config = config.execution_mode(ExecutionMode::Pooled);
    }
    Ok(config)
}

/// Executes every step in order, stopping at the first rejected one.
///
/// A rejected step leaves the session as it was before that step.
pub fn execute(session: &Session, script: &Script) -> CliResult<Vec<StepRecord>> {
    let mut records = Vec::with_capacity(script.steps.len());
    for (offset, step) in script.steps.iter().enumerate() {
        let index = offset + 1;
        let outcome = step.apply(session).map_err(|source| CliError::Step {
            index,
            op: step.op(),
            source,
        })?;
        debug!(index, op = step.op(), ?outcome, "step done");
        records.push(StepRecord {
            index,
            op: step.op(),
            outcome,
        });
    }
    Ok(records)
}

fn text_line(record: &StepRecord) -> String {
    let index = record.index;
    match &record.outcome {
        StepOutcome::Committed {
            description,
            revision,
        } => format!("[{index}] {description} (r{revision})"),
        StepOutcome::Undone {
            description,
            revision,
        } => format!("[{index}] undo: {description} (r{revision})"),
        StepOutcome::Redone {
            description,
            revision,
        } => format!("[{index}] redo: {description} (r{revision})"),
        StepOutcome::Idle => format!("[{index}] {}: nothing to do", record.op),
        StepOutcome::Setting { description } => format!("[{index}] {description}"),
    }
}
