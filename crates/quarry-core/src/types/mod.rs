//! Shared data types.

pub mod entity;
pub mod message;

pub use entity::{Entity, ExtractionResult, GraphDelta, PropertyMap, Relationship};
pub use message::{Message, MessageRole};
