//! Application state and logic

use std::time::{Duration, Instant};

use chrono::FixedOffset;
use crossterm::event::{KeyCode, KeyModifiers};

use qline_core::{
    render_details, render_queues, Action, ChannelStatus, ClientState, MemberRow, QueueRow,
};

/// How long a status message stays visible
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Typing the name of a new queue
    Create,
}

/// Which pane has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivePane {
    Queues,
    Members,
}

impl ActivePane {
    pub fn toggle(self) -> Self {
        match self {
            ActivePane::Queues => ActivePane::Members,
            ActivePane::Members => ActivePane::Queues,
        }
    }
}

/// Work the event loop should start on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Dispatch(Action),
    Create(String),
    Refresh,
}

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_quit: bool,
    /// Current input mode
    pub input_mode: InputMode,
    /// Text typed in create mode
    pub input: String,
    /// Which pane has focus
    pub active_pane: ActivePane,
    /// Last state received from the session
    pub state: ClientState,
    /// Queue list rows
    pub queue_rows: Vec<QueueRow>,
    /// Selected queue row
    pub queue_index: usize,
    /// Member rows of the active queue
    pub member_rows: Vec<MemberRow>,
    /// Selected member row
    pub member_index: usize,
    /// Update channel connection
    pub channel_status: ChannelStatus,
    /// Status message to display temporarily
    pub status_message: Option<String>,
    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,
    /// Whether help overlay is visible
    pub show_help: bool,
    zone: FixedOffset,
}

impl App {
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            active_pane: ActivePane::Queues,
            state: ClientState::default(),
            queue_rows: Vec::new(),
            queue_index: 0,
            member_rows: Vec::new(),
            member_index: 0,
            channel_status: ChannelStatus::Disconnected,
            status_message: None,
            status_message_time: None,
            show_help: false,
            zone,
        }
    }

    /// Take a new state snapshot and re-render the rows
    pub fn apply_state(&mut self, state: ClientState) {
        self.queue_rows = render_queues(&state);
        self.member_rows = state
            .active_queue()
            .map(|queue| render_details(queue, &state, &self.zone))
            .unwrap_or_default();
        self.state = state;

        self.queue_index = clamp(self.queue_index, self.queue_rows.len());
        self.member_index = clamp(self.member_index, self.member_rows.len());
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Clear status message after timeout
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn selected_queue(&self) -> Option<&QueueRow> {
        self.queue_rows.get(self.queue_index)
    }

    pub fn selected_member(&self) -> Option<&MemberRow> {
        self.member_rows.get(self.member_index)
    }

    /// Name of the active queue, if it is in the list
    pub fn active_queue_name(&self) -> Option<&str> {
        self.state.active_queue().map(|q| q.name.as_str())
    }

    /// Handle a key press, returning work for the session if any
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<Request> {
        if self.show_help {
            self.show_help = false;
            return None;
        }
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(code, modifiers),
            InputMode::Create => self.handle_create_key(code, modifiers),
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<Request> {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('k') | KeyCode::Up => self.move_up(),
            KeyCode::Char('j') | KeyCode::Down => self.move_down(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Char('l') => {
                self.active_pane = self.active_pane.toggle();
            }
            KeyCode::Enter => return self.activate(),
            KeyCode::Char('s') => return self.member_action(Action::Skip),
            KeyCode::Char('x') => return self.member_action(Action::Leave),
            KeyCode::Char('n') => {
                self.input_mode = InputMode::Create;
                self.input.clear();
            }
            KeyCode::Char('r') => return Some(Request::Refresh),
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
        None
    }

    fn handle_create_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<Request> {
        match code {
            KeyCode::Esc => self.exit_input_mode(),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.exit_input_mode()
            }
            KeyCode::Enter => {
                let name = self.input.trim().to_string();
                self.exit_input_mode();
                if name.is_empty() {
                    self.set_status("Queue name cannot be empty");
                    return None;
                }
                return Some(Request::Create(name));
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        None
    }

    fn exit_input_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
    }

    /// Enter: the selected row's primary action
    fn activate(&mut self) -> Option<Request> {
        match self.active_pane {
            ActivePane::Queues => {
                let row = self.selected_queue()?;
                let action = row.action.clone();
                if matches!(action, Action::Open(_)) {
                    self.active_pane = ActivePane::Members;
                }
                Some(Request::Dispatch(action))
            }
            ActivePane::Members => {
                let row = self.selected_member()?;
                if row.is_self {
                    self.set_status("s: skip turn, x: leave queue");
                    return None;
                }
                let action = Action::RequestSwap(row.entry_id.clone());
                let message = format!("Swap requested with #{}", row.position);
                self.set_status(message);
                Some(Request::Dispatch(action))
            }
        }
    }

    /// Skip or leave, only when our own row offers it
    fn member_action(&mut self, action: Action) -> Option<Request> {
        let offered = self
            .member_rows
            .iter()
            .any(|row| row.is_self && row.actions.contains(&action));
        if !offered {
            self.set_status("You are not in this queue");
            return None;
        }
        Some(Request::Dispatch(action))
    }

    fn move_up(&mut self) {
        match self.active_pane {
            ActivePane::Queues => self.queue_index = self.queue_index.saturating_sub(1),
            ActivePane::Members => self.member_index = self.member_index.saturating_sub(1),
        }
    }

    fn move_down(&mut self) {
        match self.active_pane {
            ActivePane::Queues => {
                self.queue_index = clamp(self.queue_index + 1, self.queue_rows.len())
            }
            ActivePane::Members => {
                self.member_index = clamp(self.member_index + 1, self.member_rows.len())
            }
        }
    }
}

fn clamp(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use qline_core::{EntryId, Member, Queue, QueueId, User, UserId};

    fn member(entry: &str, user: &str) -> Member {
        Member {
            entry_id: EntryId::from(entry),
            user_id: UserId::from(user),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
        }
    }

    fn app_with_state() -> App {
        let mut app = App::new(FixedOffset::east_opt(0).unwrap());
        let mut state = ClientState::default();
        state.authenticated = true;
        state.user = Some(User {
            id: UserId::from("me"),
            name: None,
        });
        state.queues = vec![
            Queue {
                id: QueueId::from("q1"),
                name: "Bread Line".to_string(),
                members: vec![member("e1", "other"), member("e2", "me")],
            },
            Queue {
                id: QueueId::from("q2"),
                name: "Post Office".to_string(),
                members: vec![],
            },
        ];
        state.active_queue_id = Some(QueueId::from("q1"));
        state.my_entry_id = Some(EntryId::from("e2"));
        app.apply_state(state);
        app
    }

    #[test]
    fn test_active_pane_toggle() {
        assert_eq!(ActivePane::Queues.toggle(), ActivePane::Members);
        assert_eq!(ActivePane::Members.toggle(), ActivePane::Queues);
    }

    #[test]
    fn test_apply_state_renders_rows() {
        let app = app_with_state();
        assert_eq!(app.queue_rows.len(), 2);
        assert_eq!(app.member_rows.len(), 2);
        assert_eq!(app.active_queue_name(), Some("Bread Line"));
    }

    #[test]
    fn test_selection_clamped_when_list_shrinks() {
        let mut app = app_with_state();
        app.queue_index = 1;

        let mut state = app.state.clone();
        state.queues.truncate(1);
        app.apply_state(state);
        assert_eq!(app.queue_index, 0);
    }

    #[test]
    fn test_enter_on_queue_dispatches_row_action() {
        let mut app = app_with_state();
        app.handle_key(KeyCode::Down, KeyModifiers::NONE);

        let request = app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            request,
            Some(Request::Dispatch(Action::Join(QueueId::from("q2"))))
        );
    }

    #[test]
    fn test_enter_on_other_member_requests_swap() {
        let mut app = app_with_state();
        app.handle_key(KeyCode::Tab, KeyModifiers::NONE);

        let request = app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            request,
            Some(Request::Dispatch(Action::RequestSwap(EntryId::from("e1"))))
        );
    }

    #[test]
    fn test_skip_and_leave_need_membership() {
        let mut app = app_with_state();
        assert_eq!(
            app.handle_key(KeyCode::Char('s'), KeyModifiers::NONE),
            Some(Request::Dispatch(Action::Skip))
        );

        let mut state = app.state.clone();
        state.queues[0].members.pop();
        state.my_entry_id = None;
        app.apply_state(state);
        assert_eq!(app.handle_key(KeyCode::Char('x'), KeyModifiers::NONE), None);
        assert!(app.status_message.is_some());
    }

    #[test]
    fn test_create_mode_collects_name() {
        let mut app = App::new(FixedOffset::east_opt(0).unwrap());
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE);
        assert_eq!(app.input_mode, InputMode::Create);

        for c in "Bread".chars() {
            app.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        app.handle_key(KeyCode::Backspace, KeyModifiers::NONE);

        let request = app.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(request, Some(Request::Create("Brea".to_string())));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_blank_create_is_not_sent() {
        let mut app = App::new(FixedOffset::east_opt(0).unwrap());
        app.handle_key(KeyCode::Char('n'), KeyModifiers::NONE);
        app.handle_key(KeyCode::Char(' '), KeyModifiers::NONE);

        assert_eq!(app.handle_key(KeyCode::Enter, KeyModifiers::NONE), None);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = App::new(FixedOffset::east_opt(0).unwrap());
        app.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }
}
