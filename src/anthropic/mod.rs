pub mod client;
pub mod error;
pub mod generator;
pub mod types;

pub use client::{AnthropicClient, MessageSender};
pub use error::AnthropicError;
pub use generator::AnthropicGenerator;
pub use types::{Message, MessagesRequest, MessagesResponse, Usage};
