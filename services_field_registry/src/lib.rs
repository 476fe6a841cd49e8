//! # Field Registry
//!
//! Attach/detach controller for chunks fields on one form page.
//!
//! ## Philosophy
//!
//! - **Explicit context**: the registry is owned by the page controller, not a global
//! - **Update in place**: a re-processed container refreshes its field, never replaces it
//! - **Clean teardown**: detaching a field unbinds every handler it registered
//! - **Bounded waits**: in-flight requests are abandoned after a configurable number of ticks
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A network client; requests are taken from and responses fed to the widget
//! - A page framework; containers arrive already rendered

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod widget;

pub use config::{ConfigError, WidgetConfig};
pub use error::WidgetError;
pub use events::{DispatchOutcome, UiControl, UiEvent};
pub use registry::FieldRegistry;
pub use widget::ChunksWidget;
