//! Status panel input handling.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gemlink_core::AuthStatus;

/// Whether `key` activates the recovery control.
///
/// Only presses count, so terminals that report releases do not trigger a
/// second activation.
pub fn is_recovery_key(key: &KeyEvent) -> bool {
    key.kind == KeyEventKind::Press
        && !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        && matches!(key.code, KeyCode::Enter | KeyCode::Char('r'))
}

/// Invokes `recovery_action` once if the control is offered for `status`.
///
/// Returns whether the action ran.
pub fn activate_recovery<F>(status: Option<AuthStatus>, recovery_action: &mut F) -> bool
where
    F: FnMut() + ?Sized,
{
    if status.is_some_and(AuthStatus::allows_recovery) {
        recovery_action();
        true
    } else {
        false
    }
}

/// Routes a key to the panel. Returns whether the recovery action ran.
pub fn handle_key<F>(status: Option<AuthStatus>, key: &KeyEvent, recovery_action: &mut F) -> bool
where
    F: FnMut() + ?Sized,
{
    is_recovery_key(key) && activate_recovery(status, recovery_action)
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyEventState;

    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn recovery_runs_once_per_activation_in_manual_required() {
        let mut calls = 0;
        let mut action = || calls += 1;

        assert!(handle_key(
            Some(AuthStatus::ManualRequired),
            &press(KeyCode::Enter),
            &mut action
        ));
        assert!(handle_key(
            Some(AuthStatus::ManualRequired),
            &press(KeyCode::Char('r')),
            &mut action
        ));
        assert_eq!(calls, 2);
    }

    #[test]
    fn recovery_never_runs_outside_manual_required() {
        let mut calls = 0;
        let mut action = || calls += 1;

        for status in [
            Some(AuthStatus::Loading),
            Some(AuthStatus::Ready),
            Some(AuthStatus::Failed),
            None,
        ] {
            assert!(!handle_key(status, &press(KeyCode::Enter), &mut action));
            assert!(!activate_recovery(status, &mut action));
        }
        assert_eq!(calls, 0);
    }

    #[test]
    fn key_release_and_other_keys_do_not_activate() {
        let mut calls = 0;
        let mut action = || calls += 1;

        let release = KeyEvent {
            code: KeyCode::Enter,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);

        let status = Some(AuthStatus::ManualRequired);
        assert!(!handle_key(status, &release, &mut action));
        assert!(!handle_key(status, &ctrl_r, &mut action));
        assert!(!handle_key(status, &press(KeyCode::Char('x')), &mut action));
        assert_eq!(calls, 0);
    }
}
