//! Background execution: the TaskRunner drains Renderer jobs off the HTTP
//! request path, and the Sweeper periodically reclaims expired sessions
//! (§4.7, §4.8).

pub mod sweeper;
pub mod task_runner;

pub use sweeper::SweepReport;
pub use sweeper::Sweeper;
pub use task_runner::TaskRunner;
