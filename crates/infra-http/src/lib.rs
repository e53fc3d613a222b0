// Lingflow Infrastructure - HTTP adapters

mod api;
mod auth_flow;
mod sse;

pub use api::HttpJobApi;
pub use auth_flow::{BrowserPrompt, CallbackListener};
pub use sse::SseStream;
