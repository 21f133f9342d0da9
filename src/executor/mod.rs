mod process;

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use process::run;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with code {code}")]
    Failed { program: String, code: i32 },
    #[error("{program} still running after {after:?}, killed")]
    TimedOut { program: String, after: Duration },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An external program invoked with `$name` placeholders substituted in its arguments.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExternalCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, with = "humantime_opt")]
    pub timeout: Option<Duration>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: None,
        }
    }

    pub fn resolve_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("${}", name), value)
                })
            })
            .collect()
    }
}

mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_placeholders() {
        let cmd = ExternalCommand::new("detect", &["--source", "$image", "--out=$labels/x"]);
        let args = cmd.resolve_args(&[("image", "/tmp/a.jpg"), ("labels", "/tmp/l")]);
        assert_eq!(args, vec!["--source", "/tmp/a.jpg", "--out=/tmp/l/x"]);
    }

    #[test]
    fn deserializes_timeout() {
        let cmd: ExternalCommand =
            serde_yaml::from_str("program: gdal_translate\nargs: [$input, $output]\ntimeout: 2m\n")
                .unwrap();
        assert_eq!(cmd.timeout, Some(Duration::from_secs(120)));
        assert_eq!(cmd.args, vec!["$input", "$output"]);
    }
}
