//! Execution of the external radiative transfer simulator
//!
//! Every simulator invocation is a structured process launch (program,
//! argument list, working directory). Runs are independent and dispatched to
//! a worker pool; the caller resumes only after every run has finished.

use crate::core::modtran_input::{CaseSet, SimulationCase, SimulationRun};
use crate::types::{LstError, LstResult};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// One process launch: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl SimulatorCommand {
    pub fn new<P: AsRef<Path>, D: AsRef<Path>>(program: P, working_dir: D) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Shell-style rendering used for the command list
impl fmt::Display for SimulatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cd {} && {}", self.working_dir.display(), self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of one process launch
#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    /// Exit code, `None` when killed by a signal or on timeout
    pub status_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutcome {
    pub fn succeeded() -> Self {
        Self {
            status_code: Some(0),
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(status_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            success: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Short failure description for error reports
    pub fn describe(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let status = match self.status_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(line) => format!("{}: {}", status, line.trim()),
            None => status,
        }
    }
}

/// Launches external processes
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &SimulatorCommand, timeout: Duration) -> LstResult<ProcessOutcome>;
}

/// Launcher backed by `std::process`
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    poll_interval: Duration,
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl SystemLauncher {
    pub fn new() -> Self {
        Self::default()
    }
}

/// How long captured output is awaited once the process is gone. Descendants
/// that inherited the pipes can hold them open past the process itself.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

fn spawn_reader<R: Read + Send + 'static>(stream: Option<R>) -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buffer);
        }
        let _ = sender.send(buffer);
    });
    receiver
}

/// Output read so far is lost when the pipe is still open at `until`
fn collect_output(reader: &mpsc::Receiver<String>, until: Instant) -> String {
    reader
        .recv_timeout(until.saturating_duration_since(Instant::now()))
        .unwrap_or_default()
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, command: &SimulatorCommand, timeout: Duration) -> LstResult<ProcessOutcome> {
        log::debug!("Launching: {}", command);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                log::warn!("Killing process after {:?}: {}", timeout, command);
                let _ = child.kill();
                let _ = child.wait();
                timed_out = true;
                break None;
            }
            std::thread::sleep(self.poll_interval);
        };

        let output_deadline = Instant::now() + OUTPUT_GRACE;
        let stdout = collect_output(&stdout_reader, output_deadline);
        let stderr = collect_output(&stderr_reader, output_deadline);

        Ok(ProcessOutcome {
            status_code: status.and_then(|s| s.code()),
            success: status.map_or(false, |s| s.success()),
            stdout,
            stderr,
            timed_out,
        })
    }
}

/// Attempts and per-attempt timeout for every run
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// One initial attempt plus `retries` re-invocations
    pub fn new(retries: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(3600))
    }
}

/// Dispatches simulator runs to a bounded worker pool
pub struct SimulationRunner {
    launcher: Arc<dyn ProcessLauncher>,
    process_count: usize,
    policy: RetryPolicy,
}

struct RunJob<'a> {
    case: &'a SimulationCase,
    run: &'a SimulationRun,
}

impl<'a> RunJob<'a> {
    fn label(&self) -> String {
        format!("{}/{}", self.case.id, self.run.variant.dir_name())
    }
}

impl SimulationRunner {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, process_count: usize, policy: RetryPolicy) -> Self {
        Self {
            launcher,
            process_count: process_count.max(1),
            policy,
        }
    }

    /// Run every simulation the case set requires.
    ///
    /// Returns after all runs have completed; the first failing run (in case
    /// order) is reported with its case identifier.
    pub fn run_all(&self, cases: &CaseSet) -> LstResult<()> {
        let jobs: Vec<RunJob> = cases
            .cases
            .iter()
            .filter(|case| case.run_modtran)
            .flat_map(|case| case.runs.iter().map(move |run| RunJob { case, run }))
            .collect();

        log::info!(
            "Running {} simulator invocations for {} cases with {} process(es)",
            jobs.len(),
            cases.num_modtran_runs,
            self.process_count
        );

        let results = self.execute_jobs(&jobs)?;

        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            log::error!("{} of {} simulator runs failed", failures, jobs.len());
        }
        for result in results {
            result?;
        }

        log::info!("✅ All simulator runs completed");
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn execute_jobs(&self, jobs: &[RunJob]) -> LstResult<Vec<LstResult<()>>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.process_count)
            .build()
            .map_err(|e| LstError::Processing(format!("Failed to build simulator worker pool: {}", e)))?;

        Ok(pool.install(|| jobs.par_iter().map(|job| self.execute(job)).collect()))
    }

    #[cfg(not(feature = "parallel"))]
    fn execute_jobs(&self, jobs: &[RunJob]) -> LstResult<Vec<LstResult<()>>> {
        Ok(jobs.iter().map(|job| self.execute(job)).collect())
    }

    fn execute(&self, job: &RunJob) -> LstResult<()> {
        let label = job.label();
        let mut reason = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let outcome = self.launcher.launch(&job.run.command, self.policy.timeout);
            match outcome {
                Ok(outcome) if outcome.success => {
                    log::debug!("Simulator run {} succeeded (attempt {})", label, attempt);
                    return self.extract(job, &label);
                }
                Ok(outcome) => reason = outcome.describe(),
                Err(e) => reason = e.to_string(),
            }
            log::warn!(
                "Simulator run {} failed (attempt {}/{}): {}",
                label,
                attempt,
                self.policy.max_attempts,
                reason
            );
        }

        Err(LstError::SimulationFailed {
            case: label,
            attempts: self.policy.max_attempts,
            reason,
        })
    }

    /// Convert the simulator output into the parsed spectral table
    fn extract(&self, job: &RunJob, label: &str) -> LstResult<()> {
        let command = match &job.run.extract {
            Some(command) => command,
            None => return Ok(()),
        };

        let outcome = self
            .launcher
            .launch(command, self.policy.timeout)
            .map_err(|e| LstError::Reduction {
                case: label.to_string(),
                reason: format!("spectral extraction could not start: {}", e),
            })?;

        if !outcome.success {
            return Err(LstError::Reduction {
                case: label.to_string(),
                reason: format!("spectral extraction failed: {}", outcome.describe()),
            });
        }
        Ok(())
    }
}
