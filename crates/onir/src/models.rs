//! These models represent the objects passed between the UI, the broker and the API
//!
//! There are three related formats we need to interact with:
//! - conversation messages, sent from the interface to the broker
//! - chat events, sent from the broker back to the interface
//! - openai-style chat completion payloads, exchanged with the DeepSeek API
//!
//! The first two are owned here; the wire format of the API lives next to the
//! provider in `providers::utils`.
pub mod event;
pub mod message;
pub mod options;
pub mod role;
