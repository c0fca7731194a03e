//! The agent orchestration core of AgroMesh.
//!
//! A query flows through four stages:
//!
//! 1. **Route**: the [`ComplexityRouter`] asks a small model whether the
//!    query is `SIMPLE` (answer with one or more responders) or
//!    `ITERATIVE` (needs the tool loop), falling back to keyword rules
//! 2. **Dispatch**: the [`Coordinator`] fans out to [`Responder`]s in
//!    parallel or in sequence and merges their answers in declared order
//! 3. **Iterate**: the [`IterativeLoop`] runs a bounded
//!    THOUGHT → ACTION → OBSERVATION cycle against the tool registry
//! 4. **Stream**: the [`StreamEmitter`] replays the answer as word chunks
//!    ending in a single completion marker
//!
//! Nothing here returns an error for a failed model call. Every path ends
//! in text the user can read.

pub mod coordinator;
pub mod emitter;
pub mod iterative;
pub mod responders;
pub mod router;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use coordinator::{CoordinatedAnswer, Coordinator};
pub use emitter::{split_words, StreamClosed, StreamEmitter};
pub use iterative::{IterationStep, IterativeLoop, LoopOutcome, ParsedResponse, Termination};
pub use responders::{Capability, Responder, ResponderSet, SpecialistResponder};
pub use router::{ComplexityRouter, RoutingDecision, RoutingMode};
pub use stream_event::{CompletionInfo, ResponseChunk};
