//! # Chunk Types
//!
//! This crate defines the fundamental types shared by every layer of the
//! chunks field widget.
//!
//! ## Philosophy
//!
//! - **Typed identity**: field names, instances and chunk types are distinct types
//! - **Live positions**: a [`Delta`] is a structural index, never a stable identity
//! - **Serializable**: everything mirrored into the form can round-trip through serde
//!
//! ## Key Types
//!
//! - [`ChunkView`]: the mutually exclusive display mode of one chunk
//! - [`Configuration`]: a chunk's type-specific key/value configuration
//! - [`FieldSettings`]: per-field settings delivered by the server as JSON
//! - [`Activation`]: the pointer/key gesture that activates a control
//! - [`FocusTarget`]: a control that can hold keyboard focus

pub mod config;
pub mod focus;
pub mod ids;
pub mod input;
pub mod settings;
pub mod view;

pub use config::Configuration;
pub use focus::FocusTarget;
pub use ids::{
    ChunkTypeId, Delta, FieldName, InstanceName, LangCode, NodeId, RequestId, RowKey, TicketId,
};
pub use input::{Activation, Key, KeyPhase, KeyPress, PointerButton};
pub use settings::{ChunkInstance, FieldSettings, InstanceTypeSettings, SettingsError};
pub use view::{ChunkView, Stripe};
