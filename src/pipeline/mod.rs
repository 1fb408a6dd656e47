//! Bet pipeline: intake queue, ordered callback dispatch, session lifecycle
//! and routing into storage and execution.

pub mod dispatcher;
pub mod queue;
pub mod router;
pub mod session;


pub use dispatcher::{handler_fn, payload_handler, run_processing_loop, BetHandler, DispatchReport, Dispatcher};
pub use queue::{intake_queue, IntakeReceiver, IntakeSender, MessageSink};
pub use router::BetRouter;
pub use session::SessionManager;
