pub mod backend;
pub mod chat;
pub mod evaluate;
pub mod report;
pub mod store;

mod dispatch;

pub use dispatch::dispatch;
