//! Service-agnostic domain types exchanged with the remote trading service.
//!
//! Every payload carried by either transport decodes into one of these
//! types; there is no dynamically-typed data past the protocol layer.

pub mod analysis;
pub mod balance;
pub mod diagnostics;
pub mod id;
pub mod session;
pub mod trade;

pub use analysis::{MarketAnalysis, Signal};
pub use balance::Balance;
pub use diagnostics::{ConnectivityStatus, ServerInfo};
pub use id::{SessionId, TradeId};
pub use session::{OpenSessionRequest, Session, SessionStatus};
pub use trade::{Trade, TradeSide};
