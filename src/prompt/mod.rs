//! Prompt rendering and the language firewall.
//!
//! All prompts are external handlebars templates rendered with named
//! parameters; nothing in the pipeline builds a prompt by string
//! concatenation. Every rendered prompt passes through the outbound firewall
//! before dispatch, and every model response is checked symmetrically.

pub mod firewall;
pub mod renderer;

pub use firewall::{non_ascii_density, InboundVerdict, PromptFirewall};
pub use renderer::PromptRenderer;
