//! Keystroke-to-action mapping.

/// What a consumed keystroke asks the console to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Drive RTS to the negation of its last observed level.
    ToggleRts,
    /// Drive DTR to the negation of its last observed level.
    ToggleDtr,
    /// End the session.
    RequestExit,
    NoOp,
}

/// Keystroke that historically ended the session on its own; a newline right
/// after it still confirms exit.
const LEGACY_EXIT_KEY: char = 'q';

/// Map one keystroke to an action, given the previously consumed keystroke.
///
/// Exit requires a two-keystroke confirmation so a stray Enter while typing
/// does not kill the session: newline exits only after another newline,
/// after [`LEGACY_EXIT_KEY`], or as the very first keystroke of the session.
/// The caller records every consumed keystroke as the new pending value,
/// whether or not it produced an action.
pub fn interpret(key: char, pending: Option<char>) -> Action {
    match key {
        'r' => Action::ToggleRts,
        'd' => Action::ToggleDtr,
        '\n' => match pending {
            None | Some('\n') | Some(LEGACY_EXIT_KEY) => Action::RequestExit,
            Some(_) => Action::NoOp,
        },
        _ => Action::NoOp,
    }
}
