// ABOUTME: Structured remote scripts built from named steps.
// ABOUTME: The first failing fatal step aborts the script; tolerated failures are recorded.

use super::executor::RemoteExecutor;
use crate::ssh;

/// What a failing step does to the rest of its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the script and fail the run.
    Fatal,
    /// Record the failure and continue with the next step.
    Tolerated,
}

/// One remote command with its failure policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub command: String,
    /// Tried once if `command` exits non-zero.
    pub fallback: Option<String>,
    pub policy: FailurePolicy,
}

impl Step {
    pub fn fatal(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            fallback: None,
            policy: FailurePolicy::Fatal,
        }
    }

    pub fn tolerated(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            fallback: None,
            policy: FailurePolicy::Tolerated,
        }
    }

    pub fn or_else(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Result of a step that did not abort its script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded { output: String },
    Tolerated { exit_code: u32, output: String },
}

impl StepOutcome {
    pub fn output(&self) -> &str {
        match self {
            StepOutcome::Succeeded { output } | StepOutcome::Tolerated { output, .. } => output,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. })
    }
}

/// Outcomes of every step a script ran, in order.
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub outcomes: Vec<(String, StepOutcome)>,
}

impl ScriptReport {
    /// Names of the steps that failed but were tolerated.
    pub fn tolerated_failures(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.succeeded())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn output_of(&self, step: &str) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, outcome)| outcome.output())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("{script}: step '{step}' exited with code {exit_code}\n  command: {command}\n{output}")]
    StepFailed {
        script: String,
        step: String,
        command: String,
        exit_code: u32,
        output: String,
    },

    #[error("{script}: step '{step}' could not run ({command}): {source}")]
    Transport {
        script: String,
        step: String,
        command: String,
        #[source]
        source: ssh::Error,
    },
}

/// A named, ordered list of remote steps executed over one connection.
#[derive(Debug, Clone)]
pub struct RemoteScript {
    name: String,
    steps: Vec<Step>,
}

impl RemoteScript {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order.
    ///
    /// A transport failure aborts the script whatever the step's policy, since
    /// no later step can run either.
    pub async fn run<E>(&self, executor: &E) -> Result<ScriptReport, ScriptError>
    where
        E: RemoteExecutor + ?Sized,
    {
        let mut report = ScriptReport::default();

        for step in &self.steps {
            tracing::info!("[{}] {}", self.name, step.name);
            tracing::debug!("$ {}", step.command);

            let mut command = step.command.as_str();
            let mut output = self.exec(executor, step, command).await?;

            if !output.success()
                && let Some(fallback) = step.fallback.as_deref()
            {
                tracing::info!(
                    "[{}] {} exited with {}, trying fallback",
                    self.name,
                    step.name,
                    output.exit_code
                );
                tracing::debug!("$ {}", fallback);
                command = fallback;
                output = self.exec(executor, step, command).await?;
            }

            let outcome = if output.success() {
                StepOutcome::Succeeded {
                    output: output.combined(),
                }
            } else {
                match step.policy {
                    FailurePolicy::Fatal => {
                        return Err(ScriptError::StepFailed {
                            script: self.name.clone(),
                            step: step.name.clone(),
                            command: command.to_string(),
                            exit_code: output.exit_code,
                            output: output.combined(),
                        });
                    }
                    FailurePolicy::Tolerated => {
                        tracing::info!(
                            "[{}] {} exited with {} (ignored)",
                            self.name,
                            step.name,
                            output.exit_code
                        );
                        StepOutcome::Tolerated {
                            exit_code: output.exit_code,
                            output: output.combined(),
                        }
                    }
                }
            };

            report.outcomes.push((step.name.clone(), outcome));
        }

        Ok(report)
    }

    async fn exec<E>(
        &self,
        executor: &E,
        step: &Step,
        command: &str,
    ) -> Result<ssh::CommandOutput, ScriptError>
    where
        E: RemoteExecutor + ?Sized,
    {
        executor
            .exec(command)
            .await
            .map_err(|source| ScriptError::Transport {
                script: self.name.clone(),
                step: step.name.clone(),
                command: command.to_string(),
                source,
            })
    }
}
