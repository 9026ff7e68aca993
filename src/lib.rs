//! # tokio-fsm-engine
//!
//! Table-driven asynchronous finite state machines on Tokio.
//!
//! Transitions are registered as `(from, event) -> (to, action)` entries on a
//! [`FsmBuilder`]. Any number of producers submit events through cloneable
//! [`FsmHandle`]s without blocking. A single event loop processes them in
//! submission order, awaiting each action before committing the next state, so
//! two actions of the same machine never run at once.
//!
//! ## Example
//!
//! ```rust
//! use std::convert::Infallible;
//!
//! use tokio_fsm_engine::Fsm;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Light {
//!     Red,
//!     Green,
//! }
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Signal {
//!     Go,
//!     Stop,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fsm = Fsm::<Light, Signal, Infallible>::builder(Light::Red)
//!     .transition(Light::Red, Signal::Go, Light::Green, || async {
//!         println!("lights on");
//!         Ok(())
//!     })
//!     .transition_to(Light::Green, Signal::Stop, Light::Red)
//!     .build();
//!
//! let (handle, task) = fsm.spawn();
//! handle.submit(Signal::Go);
//! handle.wait_for_state(Light::Green).await.unwrap();
//!
//! handle.shutdown_graceful();
//! assert_eq!(task.await.unwrap(), Light::Green);
//! # }
//! ```

mod engine;
mod handle;
pub mod queue;
pub mod table;

pub use crate::engine::{Fsm, FsmBuilder};
pub use crate::handle::{FsmHandle, FsmTask};
pub use crate::table::{Action, Transition, TransitionTable};
#[doc(inline)]
pub use tokio_fsm_engine_core::{
    DispatchOutcome, FsmError, FsmEvent, FsmState, ShutdownMode, TaskError,
};
