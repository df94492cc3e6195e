//! Push updates from the server
//!
//! The server announces `{ "queueId": ... }` on a server-sent events stream
//! whenever a queue changes. The channel only signals; the session decides
//! whether to re-fetch.

mod channel;
mod sse;

pub use channel::{
    next_reconnect_delay, spawn_update_channel, ChannelCommand, ChannelStatus, UpdateChannelConfig,
    UpdateChannelHandle, UpdateEvent,
};
pub use sse::{SseDecoder, SseEvent};
