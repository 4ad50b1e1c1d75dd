//! # taskloop-agent
//!
//! External collaborators of the task loop, behind narrow traits:
//!
//! - [`GenerationGateway`]: prompt in, text out. [`AnthropicGateway`] talks
//!   to the Anthropic Messages API and owns its own retry policy.
//! - [`VectorBackend`]: embed / query / upsert for semantic context.
//!   [`InMemoryVectorIndex`] keeps vectors in process and delegates
//!   embedding to an [`Embedder`] such as [`OpenAiEmbedder`].
//!
//! Nothing here knows about phases or queues.

mod auth;
mod client;
mod embeddings;
mod gateway;
mod types;
mod vector;

pub use auth::get_api_key;
pub use client::AnthropicGateway;
pub use embeddings::OpenAiEmbedder;
pub use gateway::GenerationGateway;
pub use types::*;
pub use vector::{cosine_similarity, Embedder, InMemoryVectorIndex, VectorBackend};
