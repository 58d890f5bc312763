pub mod api;
pub mod logging;
pub mod notifications;
pub mod retry;
pub mod session;
pub mod storage;
