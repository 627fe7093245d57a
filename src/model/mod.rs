pub mod auth;
pub mod ballot;
pub mod id;
pub mod juror;
pub mod pagination;
pub mod panel;
pub mod pool;
pub mod session;
pub mod verdict;
