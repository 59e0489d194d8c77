pub mod purge;
pub mod retry;

pub use purge::purge_worker;
pub use retry::retry_worker;
