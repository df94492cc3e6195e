//! Render projection
//!
//! Pure functions from [`ClientState`] to the rows a front end draws. Each
//! row carries the [`Action`]s it offers; front ends hand those back to
//! [`QueueSession::dispatch`](crate::session::QueueSession::dispatch).

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Local, Offset, Timelike, Utc};

use crate::models::{EntryId, Queue, QueueId, UserId};
use crate::state::ClientState;

/// Month names in the genitive case, as used in dates
pub const RUSSIAN_MONTHS: [&str; 12] = [
    "Января",
    "Февраля",
    "Марта",
    "Апреля",
    "Мая",
    "Июня",
    "Июля",
    "Августа",
    "Сентября",
    "Октября",
    "Ноября",
    "Декабря",
];

/// Something the user can do from a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Join a queue we are not in
    Join(QueueId),
    /// Make a queue we are already in the active one
    Open(QueueId),
    /// Let the next person go first
    Skip,
    /// Leave the active queue
    Leave,
    /// Ask the owner of this entry to trade places
    RequestSwap(EntryId),
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Join(_) => "Join",
            Action::Open(_) => "Open",
            Action::Skip => "Skip",
            Action::Leave => "Leave",
            Action::RequestSwap(_) => "Request Swap",
        }
    }
}

/// One line of the queue list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    pub queue_id: QueueId,
    pub name: String,
    pub member_count: usize,
    /// The user holds an entry in this queue
    pub joined: bool,
    /// This is the active queue
    pub active: bool,
    /// What selecting the row does
    pub action: Action,
}

impl fmt::Display for QueueRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Queue: {} ({} members)", self.name, self.member_count)
    }
}

/// One member of the active queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    /// 1-based place in the queue
    pub position: usize,
    pub entry_id: EntryId,
    pub user_id: UserId,
    /// Join time, formatted for the viewer
    pub joined_at: String,
    /// This row is the viewing user
    pub is_self: bool,
    pub actions: Vec<Action>,
}

impl fmt::Display for MemberRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} User: {}, Time: {}",
            self.position, self.user_id, self.joined_at
        )
    }
}

/// Rows for every known queue, in server order
pub fn render_queues(state: &ClientState) -> Vec<QueueRow> {
    state
        .queues
        .iter()
        .map(|queue| {
            let joined = state.is_member_of(queue);
            QueueRow {
                queue_id: queue.id.clone(),
                name: queue.name.clone(),
                member_count: queue.members.len(),
                joined,
                active: state.active_queue_id.as_ref() == Some(&queue.id),
                action: if joined {
                    Action::Open(queue.id.clone())
                } else {
                    Action::Join(queue.id.clone())
                },
            }
        })
        .collect()
}

/// Rows for the members of `queue`, in server order
pub fn render_details(queue: &Queue, state: &ClientState, zone: &FixedOffset) -> Vec<MemberRow> {
    let me = state.user.as_ref().map(|u| &u.id);
    let my_entry = if state.active_queue_id.as_ref() == Some(&queue.id) {
        state.my_entry_id.as_ref()
    } else {
        None
    };

    queue
        .members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let is_self = match me {
                Some(user_id) => &member.user_id == user_id,
                None => my_entry == Some(&member.entry_id),
            };
            let actions = if is_self {
                vec![Action::Skip, Action::Leave]
            } else {
                vec![Action::RequestSwap(member.entry_id.clone())]
            };

            MemberRow {
                position: index + 1,
                entry_id: member.entry_id.clone(),
                user_id: member.user_id.clone(),
                joined_at: format_timestamp(&member.timestamp, zone),
                is_self,
                actions,
            }
        })
        .collect()
}

/// `5 Марта 2024 14:30` in the given zone
pub fn format_timestamp(timestamp: &DateTime<Utc>, zone: &FixedOffset) -> String {
    let local = timestamp.with_timezone(zone);
    format!(
        "{} {} {} {:02}:{:02}",
        local.day(),
        RUSSIAN_MONTHS[local.month0() as usize],
        local.year(),
        local.hour(),
        local.minute()
    )
}

/// Zone for rendering: a fixed offset in minutes, or the system's own
pub fn viewer_zone(utc_offset_minutes: Option<i32>) -> FixedOffset {
    utc_offset_minutes
        .and_then(|minutes| FixedOffset::east_opt(minutes.saturating_mul(60)))
        .unwrap_or_else(|| Local::now().offset().fix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Member, User};
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn member(entry: &str, user: &str, minute: u32) -> Member {
        Member {
            entry_id: EntryId::from(entry),
            user_id: UserId::from(user),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, minute, 0).unwrap(),
        }
    }

    fn state_with(queues: Vec<Queue>) -> ClientState {
        let mut state = ClientState::default();
        state.authenticated = true;
        state.queues = queues;
        state
    }

    #[test]
    fn test_march_renders_in_russian() {
        let ts = DateTime::parse_from_rfc3339("2024-03-05T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let rendered = format_timestamp(&ts, &utc());
        assert_eq!(rendered, "5 Марта 2024 14:30");
    }

    #[test]
    fn test_timestamp_uses_viewer_zone() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 22, 5, 0).unwrap();
        let moscow = FixedOffset::east_opt(3 * 3600).unwrap();
        assert_eq!(format_timestamp(&ts, &moscow), "1 Января 2025 01:05");
    }

    #[test]
    fn test_viewer_zone_fixed_offset() {
        assert_eq!(viewer_zone(Some(180)).local_minus_utc(), 3 * 3600);
        assert_eq!(viewer_zone(Some(-90)).local_minus_utc(), -90 * 60);
    }

    #[test]
    fn test_member_count_matches_members() {
        let queues = vec![
            Queue {
                id: QueueId::from("q1"),
                name: "Bread Line".to_string(),
                members: vec![member("e1", "u1", 0), member("e2", "u2", 1), member("e3", "u3", 2)],
            },
            Queue {
                id: QueueId::from("q2"),
                name: "Empty".to_string(),
                members: vec![],
            },
        ];
        let state = state_with(queues.clone());

        let rows = render_queues(&state);
        for (row, queue) in rows.iter().zip(&queues) {
            assert_eq!(row.member_count, queue.members.len());
        }
        assert_eq!(rows[0].to_string(), "Queue: Bread Line (3 members)");
        assert_eq!(rows[1].action, Action::Join(QueueId::from("q2")));
    }

    #[test]
    fn test_joined_queue_opens_instead_of_joining() {
        let mut state = state_with(vec![Queue {
            id: QueueId::from("q1"),
            name: "Mine".to_string(),
            members: vec![member("e1", "me", 0)],
        }]);
        state.user = Some(User {
            id: UserId::from("me"),
            name: None,
        });

        let rows = render_queues(&state);
        assert!(rows[0].joined);
        assert_eq!(rows[0].action, Action::Open(QueueId::from("q1")));
    }

    #[test]
    fn test_details_rows_and_actions() {
        let queue = Queue {
            id: QueueId::from("q1"),
            name: "Bread Line".to_string(),
            members: vec![member("e1", "other", 30), member("e2", "me", 31)],
        };
        let mut state = state_with(vec![queue.clone()]);
        state.user = Some(User {
            id: UserId::from("me"),
            name: None,
        });

        let rows = render_details(&queue, &state, &utc());

        assert_eq!(rows[0].position, 1);
        assert!(!rows[0].is_self);
        assert_eq!(rows[0].actions, vec![Action::RequestSwap(EntryId::from("e1"))]);
        assert_eq!(rows[0].to_string(), "#1 User: other, Time: 5 Марта 2024 14:30");

        assert_eq!(rows[1].position, 2);
        assert!(rows[1].is_self);
        assert_eq!(rows[1].actions, vec![Action::Skip, Action::Leave]);
    }

    #[test]
    fn test_self_row_by_entry_when_user_unknown() {
        let queue = Queue {
            id: QueueId::from("q1"),
            name: "Q".to_string(),
            members: vec![member("e1", "a", 0), member("e2", "b", 1)],
        };
        let mut state = state_with(vec![queue.clone()]);
        state.active_queue_id = Some(QueueId::from("q1"));
        state.my_entry_id = Some(EntryId::from("e2"));

        let rows = render_details(&queue, &state, &utc());
        assert!(!rows[0].is_self);
        assert!(rows[1].is_self);
    }

    #[test]
    fn test_rendering_preserves_server_order() {
        let queue = Queue {
            id: QueueId::from("q1"),
            name: "Q".to_string(),
            members: vec![member("e9", "z", 59), member("e1", "a", 0)],
        };
        let state = state_with(vec![queue.clone()]);

        let entries: Vec<_> = render_details(&queue, &state, &utc())
            .into_iter()
            .map(|r| r.entry_id.to_string())
            .collect();
        assert_eq!(entries, vec!["e9", "e1"]);
    }
}
