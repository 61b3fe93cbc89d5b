//! These models represent the objects passed around by the agent
//!
//! Two related formats are in play:
//! - the canonical messages/tools the rest of the system operates on
//! - anthropic messages/tools, sent from the agent to the LLM
//!
//! The wire format is converted to and from these internal structs at the
//! provider boundary using to/from helpers. The internal models are not an
//! exact match to the wire format.
pub mod message;
pub mod role;
pub mod tool;
