//! Trait seams between the client core and its transports.

pub mod channel;
pub mod fallback;

pub use channel::{ChannelEvent, CloseReason, DuplexChannel};
pub use fallback::FallbackApi;
