//! Replace-and-restart handoff.
//!
//! Writes the generated replace script to the temp directory and
//! spawns it fully detached, so it survives this process exiting.
//! The caller exits immediately afterwards; the script handles the
//! delete-retry/move/relaunch sequence (see `velario_core::script`).

use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::Command;

use velario_core::log_info;
use velario_core::script::{ReplaceScript, SCRIPT_NAME};

/// Windows process creation flags for a fully detached child.
///
/// `CREATE_NEW_PROCESS_GROUP` (0x200) — the script gets its own
/// process group so it is not tied to this process's console events.
///
/// `CREATE_NO_WINDOW` (0x08000000) — no console window flashes up
/// while the script runs.
const DETACH_FLAGS: u32 = 0x08000000 | 0x00000200;

/// Writes and launches the replace script for the staged binary.
///
/// On success the script is running and this process must exit
/// before the script's first delete attempt can succeed.
pub fn handoff(staged: &Path) -> Result<(), String> {
    let current_exe =
        std::env::current_exe().map_err(|e| format!("cannot determine executable path: {e}"))?;

    let script_path = std::env::temp_dir().join(SCRIPT_NAME);
    let script = ReplaceScript::new(&current_exe, staged);
    std::fs::write(&script_path, script.render())
        .map_err(|e| format!("{}: {e}", script_path.display()))?;

    let mut child = Command::new("cmd")
        .arg("/C")
        .arg(&script_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .creation_flags(DETACH_FLAGS)
        .spawn()
        .map_err(|e| format!("cannot launch update script: {e}"))?;

    // Detach: acknowledge the child without blocking so it outlives us.
    let _ = child.try_wait();

    log_info!("update script launched: {}", script_path.display());
    Ok(())
}
