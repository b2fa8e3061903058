//! Core types for storypoint

mod fields;
mod message;
mod output;
mod reason;

pub use fields::{round_to, ComplexityRating, DerivedScore, FieldReading, Hours, PriorityLabel};
pub use message::{Ack, Action, EventTarget, HostEvent, HostEventKind, Request, Trigger, UserEdit};
pub use output::{CycleOutput, WritePath};
pub use reason::ReasonCode;
