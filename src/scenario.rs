//! Scenario files.
//!
//! A scenario is a YAML list of commands played against one engine. The
//! run produces a report with one step per executed command, which can be
//! written out as JSON.

use std::fs::File;
use std::path::Path;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandOutput};
use crate::engine::Engine;

/// A named sequence of commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub commands: Vec<Command>,
}

/// Outcome of one command in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    Ok { output: CommandOutput },
    Error { error: String, user_facing: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Position of the command in the scenario, starting at 0
    pub index: usize,
    pub command: Command,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Report for a whole scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub steps: Vec<StepReport>,
    pub failed: usize,
    /// True when the run stopped at the first failing command
    pub aborted: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Load a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    info!("Loading scenario from: {:?}", path);
    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open scenario file '{}'", path.display()))?;
    let scenario: Scenario = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse scenario file '{}'", path.display()))?;
    info!("Scenario has {} command(s)", scenario.commands.len());
    Ok(scenario)
}

/// Play `scenario` against `engine`
///
/// Without `keep_going` the run stops after the first failing command.
pub fn run_scenario(engine: &mut Engine, scenario: &Scenario, keep_going: bool) -> RunReport {
    let mut steps = Vec::with_capacity(scenario.commands.len());
    let mut failed = 0;
    let mut aborted = false;

    for (index, command) in scenario.commands.iter().enumerate() {
        let result = match engine.execute(command.clone()) {
            Ok(output) => {
                info!("[{}] {}", index, output);
                StepResult::Ok { output }
            }
            Err(error) => {
                warn!("[{}] {:?} failed: {}", index, command, error);
                failed += 1;
                StepResult::Error {
                    error: error.to_string(),
                    user_facing: error.is_user_facing(),
                }
            }
        };
        let is_error = matches!(result, StepResult::Error { .. });
        steps.push(StepReport {
            index,
            command: command.clone(),
            result,
        });
        if is_error && !keep_going {
            aborted = index + 1 < scenario.commands.len();
            break;
        }
    }

    RunReport {
        scenario: scenario.name.clone(),
        steps,
        failed,
        aborted,
    }
}

/// Write a run report as pretty-printed JSON
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create report file '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, report).wrap_err("Failed to serialize run report")?;
    info!("Wrote run report to {:?}", path);
    Ok(())
}
