//! External uploader plugins.
//!
//! A plugin is an executable in the plugins directory. It receives the site
//! arguments as `-name=value` flags followed by the `_tail` argument, and
//! reports its result on the last line of its standard output. Standard error
//! is only logged.

use std::{path::Path, process::ExitStatus, time::Duration};

use indexmap::IndexMap;
use thiserror::Error;
use tokio::process::Command;

pub const TAIL_ARGUMENT: &str = "_tail";

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("failed to start plugin `{path}`: `{source}`")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("plugin timed out after {0:?}")]
    Timeout(Duration),
    #[error("plugin exited with {status} and no output: `{stderr}`")]
    Failed { status: ExitStatus, stderr: String },
    #[error("plugin did not return any output: `{0}`")]
    EmptyOutput(String),
}

/// Command-line arguments for a plugin run.
pub fn plugin_args(arguments: &IndexMap<String, String>) -> Vec<String> {
    let mut args: Vec<String> = arguments
        .iter()
        .filter(|(name, _)| name.as_str() != TAIL_ARGUMENT)
        .map(|(name, value)| format!("-{}={}", name, value))
        .collect();
    args.push(
        arguments
            .get(TAIL_ARGUMENT)
            .cloned()
            .unwrap_or_default(),
    );
    args
}

/// The last line of the output, ignoring trailing newlines.
pub fn last_line(output: &str) -> &str {
    let output = output.trim_end_matches(['\n', '\r']);
    output.rsplit('\n').next().unwrap_or(output).trim_end_matches('\r')
}

/// Run a plugin and return the last line it printed.
pub async fn run_plugin(
    plugins_dir: &Path,
    name: &str,
    arguments: &IndexMap<String, String>,
    timeout: Duration,
) -> Result<String, PluginError> {
    let path = plugins_dir.join(name);
    let args = plugin_args(arguments);
    debug!("Running plugin {} with {:?}", path.display(), args);

    let mut command = Command::new(&path);
    command.args(&args).kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(PluginError::Spawn {
                path: path.display().to_string(),
                source,
            })
        }
        Err(_) => return Err(PluginError::Timeout(timeout)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    debug!("Plugin returned {} bytes: {:?}", stdout.len(), stdout);
    if !stderr.is_empty() {
        debug!("Plugin {} stderr: {:?}", name, stderr);
    }

    let line = last_line(&stdout);
    if line.is_empty() {
        if output.status.success() {
            return Err(PluginError::EmptyOutput(stderr));
        }
        return Err(PluginError::Failed {
            status: output.status,
            stderr,
        });
    }
    if !output.status.success() {
        warn!("Plugin {} exited with {}", name, output.status);
    }

    Ok(line.to_string())
}
