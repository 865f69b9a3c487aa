//! Capability interfaces for the external collaborators the pipeline
//! depends on but does not reimplement.
//!
//! ```text
//!                  ┌────────────────────┐
//!                  │  Capability traits │
//!                  └─────────┬──────────┘
//!                            │
//!        ┌───────────────────┼───────────────────┐
//!        ▼                   ▼                   ▼
//!  TextExtractor      EmbeddingProvider   CompletionProvider
//!  (bytes → pages)    (texts → vectors)   (prompt → text)
//! ```
//!
//! Each trait has an in-library test double (`PlainTextExtractor`,
//! [`MockEmbeddingProvider`], [`ScriptedCompletionProvider`]) plus a
//! reqwest-backed remote client in [`remote`]. Production deployments plug in
//! their own vendor bindings by implementing the trait.

pub mod completion;
pub mod embeddings;
pub mod extraction;
pub mod remote;

pub use completion::{CompletionProvider, ScriptedCompletionProvider};
pub use embeddings::{EmbeddingProvider, MockEmbeddingProvider};
pub use extraction::{PlainTextExtractor, TextExtractor};
pub use remote::{RemoteCompletionClient, RemoteEmbeddingClient};
