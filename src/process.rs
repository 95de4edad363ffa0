// SPDX-License-Identifier: EUPL-1.2

//! Blocking execution of external processes.

use std::process::{Command, Output};

use crate::error::CscError;

/// Run `cmd` to completion.
///
/// A launch failure is a transport error; a non-zero exit is a process
/// error, with the child's stderr logged before returning.
pub fn run_command(description: &str, cmd: &mut Command) -> Result<Output, CscError> {
    tracing::debug!(program = ?cmd.get_program(), "{description}");

    let output = cmd
        .output()
        .map_err(|e| CscError::Transport(format!("{description}: unable to start process: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!(%description, status = %output.status, "{}", stderr.trim_end());
        return Err(CscError::Process {
            description: description.to_string(),
            code: output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into()),
        });
    }

    Ok(output)
}

/// Last non-empty line of a process' stdout.
pub fn last_line(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
}
