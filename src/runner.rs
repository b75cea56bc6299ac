use anyhow::{Context, Result};
use declarative::error::command_line;
use declarative::{CommandOutput, CommandRunner};
use std::process::{Command, Stdio};

/// Runs commands on the local host
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("Running: {}", command_line(cmd, args));
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute: {}", command_line(cmd, args)))?;

        let output = CommandOutput::from(output);
        if !output.success {
            log::debug!(
                "{} exited with {:?}: {}",
                cmd,
                output.code,
                output.stderr_str().trim()
            );
        }
        Ok(output)
    }
}

/// Check if a command exists on PATH
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Scripted runner for tests
///
/// Responses are keyed by the full command line. Each call pops the next
/// scripted response; the last one repeats. Unscripted commands behave
/// like a missing binary.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockRunner {
        responses: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a response for a command line
        pub fn on(self, line: &str, output: CommandOutput) -> Self {
            self.responses
                .lock()
                .unwrap()
                .entry(line.to_string())
                .or_default()
                .push_back(output);
            self
        }

        /// Script a successful response with the given stdout
        pub fn ok(self, line: &str, stdout: &str) -> Self {
            self.on(line, CommandOutput::ok(stdout))
        }

        /// Script a failing response
        pub fn fail(self, line: &str, code: i32, stderr: &str) -> Self {
            self.on(line, CommandOutput::failed(code, stderr))
        }

        /// Every command line run so far, in order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Command lines starting with a prefix
        pub fn calls_to(&self, prefix: &str) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| c.starts_with(prefix))
                .collect()
        }
    }

    impl CommandRunner for MockRunner {
        fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
            let line = command_line(cmd, args);
            self.calls.lock().unwrap().push(line.clone());

            let mut responses = self.responses.lock().unwrap();
            let Some(queue) = responses.get_mut(&line) else {
                anyhow::bail!("Failed to execute: {line}: No such file or directory");
            };
            let output = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            output.ok_or_else(|| anyhow::anyhow!("no response scripted for {line}"))
        }
    }
}
