//! # Chunks Field
//!
//! Client-side state of one chunks field: its chunks, their views, and the
//! bookkeeping that keeps them consistent across server round trips.
//!
//! ## Philosophy
//!
//! - **Explicit transitions**: a chunk's view only moves through its transition table
//! - **One request at a time**: field actions queue behind the in-flight request
//! - **Claims, not counters**: every add is a ticket redeemed in order
//! - **Client wins on rebind**: a re-rendered row resumes the chunk's client view
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A transport; requests are handed out, responses handed in
//! - A rich-text editor; editors attach through plugins

pub mod action_queue;
pub mod audit;
pub mod chunk;
pub mod config_cache;
pub mod env;
pub mod error;
pub mod field;
pub mod ordering;
pub mod server;
pub mod staging;

pub use action_queue::{ActionQueue, InFlight, QueuedAction};
pub use audit::{AuditEntry, AuditLog, WidgetEvent};
pub use chunk::{transition, Chunk, ChunkAction};
pub use config_cache::ConfigCache;
pub use env::FieldEnv;
pub use error::ChunksError;
pub use field::{ChunksField, EditorKeyOutcome, FieldAction, KeyOutcome};
pub use server::{
    FieldFormState, Outbox, RowFormState, ServerOperation, ServerRequest, ServerResponse, Signal,
};
pub use staging::{AddOrigin, Claim, StagingQueue};
