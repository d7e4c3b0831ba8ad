//! Broker server
//!
//! The dispatcher reads the administrative channel and feeds a bounded
//! queue; a fixed pool of workers drains it. A worker that picks up a
//! publisher or subscriber registration runs that session to completion.

pub mod config;
pub mod dispatcher;
pub mod listener;
pub mod worker;

pub use config::BrokerConfig;
pub use dispatcher::DispatchEnd;
pub use listener::Broker;
