//! Pure mapping from a key press to a model-level action. Kept free of
//! engine/cache access, same split as the teacher's
//! `handle_event(event, state) -> Option<Action>`.

use crossterm::event::{KeyCode, KeyEvent};

use monitor_core::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    ToggleOrientation,
    ToggleLog,
    Edit,
    NextIssue { same_tool_only: bool },
    ToggleSort,
    RefreshCurrent,
    RefreshAllOfTool,
    ToggleFullscreen,
    OpenExternally,
    ToggleFocusPane,
    Move(Direction),
    PageResult(i32),
}

/// While the help overlay is up, only the keys that close it are live.
pub fn translate_key(key: KeyEvent, model: &Model) -> Option<Action> {
    if model.help_visible {
        return matches!(key.code, KeyCode::Char('h') | KeyCode::Esc | KeyCode::Char('q')).then_some(
            if key.code == KeyCode::Char('q') { Action::Quit } else { Action::ToggleHelp },
        );
    }
    match key.code {
        KeyCode::Char('h') => Some(Action::ToggleHelp),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('o') | KeyCode::Char('t') => Some(Action::ToggleOrientation),
        KeyCode::Char('l') => Some(Action::ToggleLog),
        KeyCode::Char('e') => Some(Action::Edit),
        KeyCode::Char('n') => Some(Action::NextIssue { same_tool_only: false }),
        KeyCode::Char('N') => Some(Action::NextIssue { same_tool_only: true }),
        KeyCode::Char('s') => Some(Action::ToggleSort),
        KeyCode::Char('r') => Some(Action::RefreshCurrent),
        KeyCode::Char('R') => Some(Action::RefreshAllOfTool),
        KeyCode::Char('f') => Some(Action::ToggleFullscreen),
        KeyCode::Char('x') => Some(Action::OpenExternally),
        KeyCode::Tab => Some(Action::ToggleFocusPane),
        KeyCode::Up => Some(Action::Move(Direction::Up)),
        KeyCode::Down => Some(Action::Move(Direction::Down)),
        KeyCode::Left => Some(Action::Move(Direction::Left)),
        KeyCode::Right => Some(Action::Move(Direction::Right)),
        KeyCode::PageUp => Some(Action::PageResult(-1)),
        KeyCode::PageDown => Some(Action::PageResult(1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent { code, modifiers: KeyModifiers::NONE, kind: KeyEventKind::Press, state: KeyEventState::NONE }
    }

    #[test]
    fn quit_key_maps_to_quit() {
        assert_eq!(translate_key(key(KeyCode::Char('q')), &Model::new()), Some(Action::Quit));
    }

    #[test]
    fn help_overlay_suppresses_unrelated_keys() {
        let mut model = Model::new();
        model.help_visible = true;
        assert_eq!(translate_key(key(KeyCode::Char('r')), &model), None);
        assert_eq!(translate_key(key(KeyCode::Char('h')), &model), Some(Action::ToggleHelp));
    }

    #[test]
    fn next_issue_distinguishes_same_tool_filter() {
        let model = Model::new();
        assert_eq!(translate_key(key(KeyCode::Char('n')), &model), Some(Action::NextIssue { same_tool_only: false }));
        assert_eq!(translate_key(key(KeyCode::Char('N')), &model), Some(Action::NextIssue { same_tool_only: true }));
    }
}
