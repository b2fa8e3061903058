//! Host page access: selector engine and document model

mod document;
mod selector;

pub use document::{DispatchedEvent, EditView, HostDocument, NodeId, PageDocument};
pub use selector::Selector;
