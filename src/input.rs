use crate::engine::{PlaybackState, SelectView};
use crate::events::{Button, RawInput};

/// What the engine is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PlayAll,
    OpenPlaylistSelect,
    Quit,
    SelectRow(usize),
    ScrollUp,
    ScrollDown,
    StartSelected,
    Back,
    TogglePause,
    ReturnToMenu,
    DecrementDwell,
}

/// Translate one raw input into a command for the given state. Inputs that
/// hit nothing map to `None`.
pub fn dispatch(raw: RawInput, state: PlaybackState, view: &SelectView) -> Option<Command> {
    match raw {
        RawInput::Interrupt => Some(Command::Quit),
        RawInput::Button(button) => Some(match button {
            Button::Quit => Command::Quit,
            Button::TogglePause => Command::TogglePause,
            Button::ReturnToMenu => Command::ReturnToMenu,
            Button::DecrementDwell => Command::DecrementDwell,
        }),
        RawInput::Touch { x, y } => match state {
            PlaybackState::Menu => menu_touch(x, y),
            PlaybackState::PlaylistSelect => select_touch(x, y, view),
            PlaybackState::Playing => None,
        },
    }
}

fn menu_touch(x: i32, y: i32) -> Option<Command> {
    if y > 200 && x < 120 {
        Some(Command::PlayAll)
    } else if y > 200 && x > 260 {
        Some(Command::Quit)
    } else if y > 140 && y < 280 && x > 80 && x < 240 {
        Some(Command::OpenPlaylistSelect)
    } else {
        None
    }
}

fn select_touch(x: i32, y: i32, view: &SelectView) -> Option<Command> {
    let rows = SelectView::ROWS as i32;
    if y > 200 && x < 80 {
        Some(Command::StartSelected)
    } else if y > 210 && x > 240 {
        Some(Command::Back)
    } else if x > 280 {
        if y < 40 && view.offset > 0 {
            Some(Command::ScrollUp)
        } else if (160..200).contains(&y) && view.offset + SelectView::ROWS < view.entries.len() {
            Some(Command::ScrollDown)
        } else {
            None
        }
    } else if (0..rows * 40).contains(&y) {
        let row = (y / 40) as usize;
        (row < view.visible_rows()).then_some(Command::SelectRow(view.offset + row))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(x: i32, y: i32) -> RawInput {
        RawInput::Touch { x, y }
    }

    fn view(n: usize, offset: usize) -> SelectView {
        let mut view = SelectView::new((0..n).map(|i| format!("p{i}.txt")).collect());
        view.offset = offset;
        view
    }

    #[test]
    fn menu_regions() {
        let v = SelectView::default();
        let menu = |x, y| dispatch(touch(x, y), PlaybackState::Menu, &v);
        assert_eq!(menu(10, 230), Some(Command::PlayAll));
        assert_eq!(menu(300, 230), Some(Command::Quit));
        assert_eq!(menu(160, 160), Some(Command::OpenPlaylistSelect));
        assert_eq!(menu(160, 230), Some(Command::OpenPlaylistSelect));
        assert_eq!(menu(160, 60), None);
        assert_eq!(menu(260, 230), None);
    }

    #[test]
    fn select_start_back_and_rows() {
        let v = view(3, 0);
        let sel = |x, y| dispatch(touch(x, y), PlaybackState::PlaylistSelect, &v);
        assert_eq!(sel(20, 220), Some(Command::StartSelected));
        assert_eq!(sel(300, 230), Some(Command::Back));
        assert_eq!(sel(100, 0), Some(Command::SelectRow(0)));
        assert_eq!(sel(100, 79), Some(Command::SelectRow(1)));
        assert_eq!(sel(100, 80), Some(Command::SelectRow(2)));
        // Only three rows are populated.
        assert_eq!(sel(100, 130), None);
    }

    #[test]
    fn select_rows_follow_scroll_offset() {
        let v = view(9, 3);
        let cmd = dispatch(touch(50, 170), PlaybackState::PlaylistSelect, &v);
        assert_eq!(cmd, Some(Command::SelectRow(7)));
    }

    #[test]
    fn scroll_arrows_respect_bounds() {
        let top = view(7, 0);
        let bottom = view(7, 2);
        let at = |v: &SelectView, y| dispatch(touch(300, y), PlaybackState::PlaylistSelect, v);
        assert_eq!(at(&top, 10), None);
        assert_eq!(at(&top, 170), Some(Command::ScrollDown));
        assert_eq!(at(&bottom, 10), Some(Command::ScrollUp));
        assert_eq!(at(&bottom, 170), None);
        // The arrow column never selects a row.
        assert_eq!(at(&top, 90), None);
    }

    #[test]
    fn playing_ignores_touch_but_not_buttons() {
        let v = SelectView::default();
        assert_eq!(dispatch(touch(10, 230), PlaybackState::Playing, &v), None);
        assert_eq!(
            dispatch(RawInput::Button(Button::ReturnToMenu), PlaybackState::Playing, &v),
            Some(Command::ReturnToMenu)
        );
        assert_eq!(
            dispatch(RawInput::Interrupt, PlaybackState::Menu, &v),
            Some(Command::Quit)
        );
    }
}
