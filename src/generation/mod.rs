//! Text and concept tree generation against the chat completions proxy.
//!
//! - [`topics`]: the topic catalog and recent-topic-avoiding selection
//! - [`client`]: prose generation, request/response wire types, error mapping
//! - [`concept_tree`]: tree generation and normalization of model output

mod client;
mod concept_tree;
mod topics;

pub use client::{
    build_http_client, build_section_prompt, clean_generated_text, GeneratedText,
    GenerationClient, GenerationError, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    DEFAULT_TREE_TEMPERATURE, PROXY_PATH,
};
pub use concept_tree::{build_tree_prompt, fallback_root, parse_concept_tree, ConceptNode};
pub use topics::{pick_topic, BITCOIN_TOPICS};
