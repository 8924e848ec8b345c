//! Domain fixtures for tests.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Balance, MarketAnalysis, ServerInfo, Session, SessionId, SessionStatus, Signal, Trade,
    TradeId, TradeSide,
};

pub fn session(id: &str) -> Session {
    Session {
        id: SessionId::new(id),
        symbol: "BTCUSDT".into(),
        strategy: "momentum".into(),
        status: SessionStatus::Active,
        opened_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        closed_at: None,
        realized_pnl: Decimal::ZERO,
        open_positions: 1,
    }
}

pub fn trade(id: &str, session_id: &str) -> Trade {
    Trade {
        id: TradeId::new(id),
        session_id: SessionId::new(session_id),
        symbol: "BTCUSDT".into(),
        side: TradeSide::Buy,
        price: Decimal::new(64_000, 0),
        quantity: Decimal::new(1, 1),
        executed_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 30, 0).unwrap(),
    }
}

pub fn analysis(symbol: &str) -> MarketAnalysis {
    MarketAnalysis {
        symbol: symbol.into(),
        signal: Signal::Hold,
        confidence: Decimal::new(5, 1),
        last_price: Decimal::new(64_000, 0),
        generated_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        summary: None,
    }
}

pub fn balance() -> Balance {
    Balance {
        currency: "USDT".into(),
        total: Decimal::new(10_000, 0),
        available: Decimal::new(8_500, 0),
        updated_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
    }
}

pub fn server_info() -> ServerInfo {
    ServerInfo {
        version: "1.4.2".into(),
        uptime_secs: 86_400,
        analysis_interval_ms: Some(60_000),
        risk_checks_enabled: true,
    }
}
