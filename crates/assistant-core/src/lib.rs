pub mod client;
pub mod config;
pub mod context;
pub mod conversation;
pub mod segment;
pub mod sse;
pub mod state;

// Re-export main types for convenience
pub use client::{ChatClient, ContextClient, Health};
pub use config::Config;
pub use context::{dedup_by_source, ContextItem, Relevance};
pub use conversation::Conversation;
pub use segment::{segment, Segment, SegmentKind};
pub use sse::{decode_stream, SseDecoder, StreamEvent};
pub use state::{ChatMessage, ChatRole};
