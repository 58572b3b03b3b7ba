//! Prompt generation domain

mod request;
mod response;

pub use request::{PromptRequest, DEFAULT_INSTRUCTIONS};
pub use response::{parse_prompt_response, try_parse_prompts, ResponseParseError};
