use std::{
    fs::{self, OpenOptions},
    path::Path,
    process::{Command as StdCommand, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::executor::{ExecError, ExternalCommand};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `cmd` to completion, capturing stdout/stderr under `log_dir` as
/// `{log_name}_stdout.log` and `{log_name}_stderr.log`.
pub fn run(
    cmd: &ExternalCommand,
    vars: &[(&str, &str)],
    log_dir: &Path,
    log_name: &str,
) -> Result<(), ExecError> {
    fs::create_dir_all(log_dir)?;
    let stdout_path = log_dir.join(format!("{}_stdout.log", log_name));
    let stderr_path = log_dir.join(format!("{}_stderr.log", log_name));

    let stdout_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&stdout_path)?;

    let stderr_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&stderr_path)?;

    let args = cmd.resolve_args(vars);
    log::debug!("Executing {} {}", cmd.program, args.join(" "));

    let mut child = StdCommand::new(&cmd.program)
        .args(&args)
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

    let started = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => {
                let exit_code = status.code().unwrap_or(-1);
                log::debug!("{} completed with exit code: {}", cmd.program, exit_code);
                if exit_code != 0 {
                    return Err(ExecError::Failed {
                        program: cmd.program.clone(),
                        code: exit_code,
                    });
                }
                return Ok(());
            }
            None => {
                if let Some(limit) = cmd.timeout {
                    if started.elapsed() > limit {
                        log::warn!("{} exceeded {:?}, killing", cmd.program, limit);
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ExecError::TimedOut {
                            program: cmd.program.clone(),
                            after: limit,
                        });
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalCommand {
        ExternalCommand::new("sh", &["-c", script])
    }

    #[test]
    fn captures_output_with_substitution() {
        let dir = tempfile::tempdir().unwrap();
        run(&sh("echo $greeting"), &[("greeting", "hello")], dir.path(), "step").unwrap();

        let stdout = fs::read_to_string(dir.path().join("step_stdout.log")).unwrap();
        assert_eq!(stdout.trim(), "hello");
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&sh("exit 3"), &[], dir.path(), "step").unwrap_err();
        assert!(matches!(err, ExecError::Failed { code: 3, .. }));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ExternalCommand::new("/nonexistent/vessel-detector", &[]);
        assert!(matches!(
            run(&cmd, &[], dir.path(), "step"),
            Err(ExecError::Spawn { .. })
        ));
    }

    #[test]
    fn slow_command_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = sh("sleep 5");
        cmd.timeout = Some(Duration::from_millis(200));
        assert!(matches!(
            run(&cmd, &[], dir.path(), "step"),
            Err(ExecError::TimedOut { .. })
        ));
    }
}
