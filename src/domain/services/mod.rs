pub mod alert_engine;
pub mod dca_scheduler;
pub mod schedule;
pub mod trade_dispatcher;
