//! The tray controller, as pure logic.
//!
//! Consumes [`Event`]s (user intents and worker results) and returns
//! the [`Effect`]s the platform layer should perform. All update-flow
//! sequencing lives here: the phase transitions, the one-session-at-a-
//! time rule, and the silent-versus-surfaced failure split.

use std::path::PathBuf;

use crate::hotkey::{HotkeyBinding, HotkeyError};
use crate::intent::Intent;
use crate::update::{DownloadOutcome, UpdatePhase};
use crate::version::Release;
use crate::{log_info, log_warn};

/// Everything the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Intent(Intent),
    /// Result of a release check: an available release, `None` for
    /// up-to-date, or the error text.
    CheckFinished(Result<Option<Release>, String>),
    /// The user's answer to the download confirmation prompt.
    ConfirmResult(bool),
    DownloadFinished(DownloadOutcome),
    /// Result of a hotkey re-registration on the hotkey thread.
    RebindResult(Result<HotkeyBinding, HotkeyError>),
    /// The replace script could not be written or spawned.
    HandoffFailed(String),
}

/// Side effects for the platform layer to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ToggleIcons,
    ToggleAutostart,
    OpenHotkeyDialog(HotkeyBinding),
    /// Ask the hotkey thread to re-register.
    Rebind(HotkeyBinding),
    SaveBinding(HotkeyBinding),
    UpdateTooltip(HotkeyBinding),
    StartCheck,
    StartDownload(Release),
    /// Open the progress surface for the tagged download in flight.
    ShowProgress(String),
    CloseProgress,
    /// Ask the user whether to download the tagged release.
    ConfirmUpdate(String),
    ShowInfo(String),
    ShowError(String),
    /// Spawn the replace script for the staged binary and exit.
    Handoff(PathBuf),
    ShowAbout,
    Quit,
}

/// The controller state machine.
pub struct Controller {
    binding: HotkeyBinding,
    phase: UpdatePhase,
}

impl Controller {
    /// `binding` is the hotkey loaded from settings.
    pub fn new(binding: HotkeyBinding) -> Self {
        Self {
            binding,
            phase: UpdatePhase::Idle,
        }
    }

    pub fn binding(&self) -> HotkeyBinding {
        self.binding
    }

    pub fn phase(&self) -> &UpdatePhase {
        &self.phase
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Intent(intent) => self.handle_intent(intent),
            Event::CheckFinished(result) => self.handle_check_finished(result),
            Event::ConfirmResult(accepted) => self.handle_confirm(accepted),
            Event::DownloadFinished(outcome) => self.handle_download_finished(outcome),
            Event::RebindResult(result) => self.handle_rebind_result(result),
            Event::HandoffFailed(e) => {
                self.phase = UpdatePhase::Idle;
                vec![Effect::ShowError(format!("Could not restart for update: {e}"))]
            }
        }
    }

    fn handle_intent(&mut self, intent: Intent) -> Vec<Effect> {
        match intent {
            Intent::ToggleIcons => vec![Effect::ToggleIcons],
            Intent::ToggleAutostart => vec![Effect::ToggleAutostart],
            Intent::ChangeHotkey => vec![Effect::OpenHotkeyDialog(self.binding)],
            Intent::ApplyHotkey(binding) => {
                if binding == self.binding {
                    return Vec::new();
                }
                vec![Effect::Rebind(binding)]
            }
            Intent::CheckForUpdates { user_initiated } => {
                // One session at a time: the progress surface is modal
                // in spirit, so later triggers are dropped.
                if self.phase != UpdatePhase::Idle {
                    return if user_initiated {
                        vec![Effect::ShowInfo("An update check is already in progress.".into())]
                    } else {
                        Vec::new()
                    };
                }
                self.phase = UpdatePhase::Checking { user_initiated };
                vec![Effect::StartCheck]
            }
            Intent::About => vec![Effect::ShowAbout],
            Intent::Exit => vec![Effect::Quit],
        }
    }

    fn handle_check_finished(&mut self, result: Result<Option<Release>, String>) -> Vec<Effect> {
        let UpdatePhase::Checking { user_initiated } = self.phase else {
            return Vec::new();
        };

        match result {
            Ok(Some(release)) => {
                log_info!("update available: {}", release.tag);
                let tag = release.tag.clone();
                self.phase = UpdatePhase::AwaitingConfirm(release);
                vec![Effect::ConfirmUpdate(tag)]
            }
            Ok(None) => {
                self.phase = UpdatePhase::Idle;
                if user_initiated {
                    vec![Effect::ShowInfo("You are on the latest version.".into())]
                } else {
                    Vec::new()
                }
            }
            Err(e) => {
                // Background checks fail silently; the log still records it.
                log_warn!("update check failed: {e}");
                self.phase = UpdatePhase::Idle;
                if user_initiated {
                    vec![Effect::ShowError("Could not check for updates.".into())]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn handle_confirm(&mut self, accepted: bool) -> Vec<Effect> {
        let UpdatePhase::AwaitingConfirm(release) = std::mem::replace(&mut self.phase, UpdatePhase::Idle)
        else {
            return Vec::new();
        };

        if !accepted {
            return Vec::new();
        }
        self.phase = UpdatePhase::Downloading;
        let tag = release.tag.clone();
        vec![Effect::StartDownload(release), Effect::ShowProgress(tag)]
    }

    fn handle_download_finished(&mut self, outcome: DownloadOutcome) -> Vec<Effect> {
        if self.phase != UpdatePhase::Downloading {
            return Vec::new();
        }

        match outcome {
            DownloadOutcome::Completed(staged) => {
                self.phase = UpdatePhase::Relaunching;
                vec![Effect::CloseProgress, Effect::Handoff(staged)]
            }
            DownloadOutcome::Cancelled => {
                log_info!("update download cancelled");
                self.phase = UpdatePhase::Idle;
                vec![Effect::CloseProgress]
            }
            DownloadOutcome::Failed(e) => {
                self.phase = UpdatePhase::Idle;
                vec![
                    Effect::CloseProgress,
                    Effect::ShowError(format!("Update download failed: {e}")),
                ]
            }
        }
    }

    fn handle_rebind_result(&mut self, result: Result<HotkeyBinding, HotkeyError>) -> Vec<Effect> {
        match result {
            Ok(binding) => {
                self.binding = binding;
                vec![Effect::SaveBinding(binding), Effect::UpdateTooltip(binding)]
            }
            Err(e) => vec![Effect::ShowError(format!("{e}. The previous hotkey is still active."))],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::Modifier;
    use crate::version::Version;

    fn controller() -> Controller {
        Controller::new(HotkeyBinding::default_binding())
    }

    fn release(tag: &str) -> Release {
        Release {
            tag: tag.to_string(),
            version: Version::parse(tag).unwrap(),
            download_url: format!("https://github.com/velario-app/velario/releases/download/{tag}/velario.exe"),
        }
    }

    fn check(user_initiated: bool) -> Event {
        Event::Intent(Intent::CheckForUpdates { user_initiated })
    }

    #[test]
    fn toggle_intent_becomes_toggle_effect() {
        let mut c = controller();
        assert_eq!(c.handle(Event::Intent(Intent::ToggleIcons)), vec![Effect::ToggleIcons]);
    }

    #[test]
    fn check_starts_only_from_idle() {
        let mut c = controller();

        assert_eq!(c.handle(check(false)), vec![Effect::StartCheck]);
        // Still checking: a second background trigger is dropped.
        assert_eq!(c.handle(check(false)), Vec::new());
        // A user-initiated one at least says why nothing happens.
        assert_eq!(
            c.handle(check(true)),
            vec![Effect::ShowInfo("An update check is already in progress.".into())]
        );
    }

    #[test]
    fn background_check_failure_is_silent() {
        let mut c = controller();
        c.handle(check(false));

        let effects = c.handle(Event::CheckFinished(Err("timed out".into())));

        assert_eq!(effects, Vec::new());
        assert_eq!(*c.phase(), UpdatePhase::Idle);
    }

    #[test]
    fn user_check_failure_is_surfaced() {
        let mut c = controller();
        c.handle(check(true));

        let effects = c.handle(Event::CheckFinished(Err("timed out".into())));

        assert_eq!(effects, vec![Effect::ShowError("Could not check for updates.".into())]);
    }

    #[test]
    fn up_to_date_is_only_reported_when_asked() {
        let mut c = controller();
        c.handle(check(false));
        assert_eq!(c.handle(Event::CheckFinished(Ok(None))), Vec::new());

        c.handle(check(true));
        assert_eq!(
            c.handle(Event::CheckFinished(Ok(None))),
            vec![Effect::ShowInfo("You are on the latest version.".into())]
        );
    }

    #[test]
    fn available_release_asks_for_confirmation() {
        let mut c = controller();
        c.handle(check(false));

        let effects = c.handle(Event::CheckFinished(Ok(Some(release("v1.0.4")))));

        assert_eq!(effects, vec![Effect::ConfirmUpdate("v1.0.4".into())]);
        assert_eq!(*c.phase(), UpdatePhase::AwaitingConfirm(release("v1.0.4")));
    }

    #[test]
    fn declining_returns_to_idle() {
        let mut c = controller();
        c.handle(check(false));
        c.handle(Event::CheckFinished(Ok(Some(release("v1.0.4")))));

        assert_eq!(c.handle(Event::ConfirmResult(false)), Vec::new());
        assert_eq!(*c.phase(), UpdatePhase::Idle);
    }

    #[test]
    fn accepting_starts_the_download() {
        let mut c = controller();
        c.handle(check(true));
        c.handle(Event::CheckFinished(Ok(Some(release("v1.0.4")))));

        let effects = c.handle(Event::ConfirmResult(true));

        assert_eq!(
            effects,
            vec![
                Effect::StartDownload(release("v1.0.4")),
                Effect::ShowProgress("v1.0.4".into())
            ]
        );
        assert_eq!(*c.phase(), UpdatePhase::Downloading);
    }

    #[test]
    fn completed_download_hands_off() {
        let mut c = controller();
        c.handle(check(true));
        c.handle(Event::CheckFinished(Ok(Some(release("v1.0.4")))));
        c.handle(Event::ConfirmResult(true));

        let staged = PathBuf::from(r"C:\apps\velario.exe.new");
        let effects = c.handle(Event::DownloadFinished(DownloadOutcome::Completed(staged.clone())));

        assert_eq!(effects, vec![Effect::CloseProgress, Effect::Handoff(staged)]);
        assert_eq!(*c.phase(), UpdatePhase::Relaunching);
    }

    #[test]
    fn cancelled_download_closes_quietly() {
        let mut c = controller();
        c.handle(check(true));
        c.handle(Event::CheckFinished(Ok(Some(release("v1.0.4")))));
        c.handle(Event::ConfirmResult(true));

        let effects = c.handle(Event::DownloadFinished(DownloadOutcome::Cancelled));

        assert_eq!(effects, vec![Effect::CloseProgress]);
        assert_eq!(*c.phase(), UpdatePhase::Idle);
    }

    #[test]
    fn failed_download_surfaces_the_error() {
        let mut c = controller();
        c.handle(check(false));
        c.handle(Event::CheckFinished(Ok(Some(release("v1.0.4")))));
        c.handle(Event::ConfirmResult(true));

        let effects = c.handle(Event::DownloadFinished(DownloadOutcome::Failed("connection reset".into())));

        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::CloseProgress);
        assert!(matches!(&effects[1], Effect::ShowError(m) if m.contains("connection reset")));
        assert_eq!(*c.phase(), UpdatePhase::Idle);
    }

    #[test]
    fn new_check_can_start_after_a_failed_one() {
        let mut c = controller();
        c.handle(check(false));
        c.handle(Event::CheckFinished(Err("offline".into())));

        assert_eq!(c.handle(check(false)), vec![Effect::StartCheck]);
    }

    #[test]
    fn successful_rebind_persists_and_relabels() {
        let mut c = controller();
        let new = HotkeyBinding::new(Modifier::Alt, 0x48).unwrap();

        let effects = c.handle(Event::RebindResult(Ok(new)));

        assert_eq!(effects, vec![Effect::SaveBinding(new), Effect::UpdateTooltip(new)]);
        assert_eq!(c.binding(), new);
    }

    #[test]
    fn rebind_conflict_keeps_the_old_binding() {
        let mut c = controller();
        let old = c.binding();
        let new = HotkeyBinding::new(Modifier::Alt, 0x48).unwrap();

        let effects = c.handle(Event::RebindResult(Err(HotkeyError::Conflict(new))));

        assert!(matches!(&effects[0], Effect::ShowError(_)));
        assert_eq!(c.binding(), old);
    }

    #[test]
    fn applying_the_current_binding_is_a_no_op() {
        let mut c = controller();
        let current = c.binding();

        assert_eq!(c.handle(Event::Intent(Intent::ApplyHotkey(current))), Vec::new());
    }

    #[test]
    fn stale_worker_results_are_ignored() {
        let mut c = controller();

        // No check in flight.
        assert_eq!(c.handle(Event::CheckFinished(Ok(None))), Vec::new());
        assert_eq!(
            c.handle(Event::DownloadFinished(DownloadOutcome::Cancelled)),
            Vec::new()
        );
        assert_eq!(c.handle(Event::ConfirmResult(true)), Vec::new());
    }
}
