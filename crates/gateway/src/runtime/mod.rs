//! Agent runtime: the per-session supervisor, the routing façade over the
//! session table and the background poller.

pub mod poller;
pub mod prompt;
pub mod router;
pub mod supervisor;

pub use poller::BackgroundPoller;
pub use router::{RoutedReply, RoutedStream, SessionRouter};
pub use supervisor::{SupervisorAgent, SupervisorFactory, TurnSettings};
