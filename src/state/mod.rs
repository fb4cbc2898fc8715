//! Node State Machine
//!
//! Tracks the local node's quorum status (`Down`, `NotInQuorum`,
//! `SuspectNotInQuorum`, `Up`) and moves it in response to membership events,
//! asking the configured quorum provider when a transition depends on quorum.
//!
//! ## Suspicion Episodes
//! Losing quorum while `Up` only moves the node to `SuspectNotInQuorum`. Each entry
//! into that state opens a numbered episode with its own cancellation token; the
//! caller arms a grace timer for it and reports expiry through
//! `on_suspicion_timeout`. Expiries of an episode that already ended are ignored.

pub mod machine;

pub use machine::{NodeStateMachine, StateEvent, SuspicionEpisode, Transition};
