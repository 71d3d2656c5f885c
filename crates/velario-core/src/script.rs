//! The replace-and-restart script.
//!
//! A running executable cannot delete or overwrite itself, so the
//! final update step is handed to a generated batch script: wait for
//! the process to exit, delete the old binary (retrying while the
//! file is still locked by the exiting process), move the staged one
//! into place, relaunch it, and remove the script itself. Building
//! the text here keeps the script's logic unit-testable away from
//! process-exit timing.

use std::path::{Path, PathBuf};

/// File name the script is written under in the temp directory.
pub const SCRIPT_NAME: &str = "velario-update.bat";

/// Builds the replace-and-restart script for one update.
pub struct ReplaceScript {
    current_exe: PathBuf,
    staged_exe: PathBuf,
}

impl ReplaceScript {
    pub fn new(current_exe: &Path, staged_exe: &Path) -> Self {
        Self {
            current_exe: current_exe.to_path_buf(),
            staged_exe: staged_exe.to_path_buf(),
        }
    }

    /// Renders the batch script text.
    pub fn render(&self) -> String {
        let old = self.current_exe.display();
        let new = self.staged_exe.display();
        format!(
            "@echo off\r\n\
             :retry\r\n\
             timeout /t 1 /nobreak > nul\r\n\
             del \"{old}\"\r\n\
             if exist \"{old}\" goto retry\r\n\
             move \"{new}\" \"{old}\"\r\n\
             start \"\" \"{old}\"\r\n\
             del \"%~f0\"\r\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> String {
        ReplaceScript::new(
            Path::new(r"C:\Program Files\Velario\velario.exe"),
            Path::new(r"C:\Program Files\Velario\velario.exe.new"),
        )
        .render()
    }

    #[test]
    fn paths_are_quoted() {
        let s = script();

        // Paths with spaces must survive the shell.
        assert!(s.contains(r#"del "C:\Program Files\Velario\velario.exe""#));
        assert!(s.contains(r#"move "C:\Program Files\Velario\velario.exe.new" "C:\Program Files\Velario\velario.exe""#));
    }

    #[test]
    fn delete_retries_while_the_binary_is_locked() {
        let s = script();

        let retry = s.find(":retry").unwrap();
        let del = s.find("del \"C:").unwrap();
        let loop_back = s.find("goto retry").unwrap();
        let mv = s.find("move \"").unwrap();

        // Retry label before the delete, loop-back after it, and the
        // move only once the delete has succeeded.
        assert!(retry < del);
        assert!(del < loop_back);
        assert!(loop_back < mv);
    }

    #[test]
    fn relaunches_after_the_move() {
        let s = script();

        let mv = s.find("move \"").unwrap();
        let start = s.find("start \"\"").unwrap();
        assert!(mv < start);
    }

    #[test]
    fn script_deletes_itself_last() {
        let s = script();

        assert!(s.trim_end().ends_with("del \"%~f0\""));
    }

    #[test]
    fn waits_before_the_first_delete_attempt() {
        let s = script();

        let wait = s.find("timeout /t 1").unwrap();
        let del = s.find("del \"C:").unwrap();
        assert!(wait < del);
    }
}
