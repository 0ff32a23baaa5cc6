pub mod capture_session;
pub mod consumer;
pub mod notifier;
