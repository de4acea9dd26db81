pub mod adapter;
pub mod commands;
pub mod dispatch;
pub mod handler;
pub mod plan;
pub mod send;

pub use adapter::RelayAdapter;
pub use dispatch::Dispatcher;
