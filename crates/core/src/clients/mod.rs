pub mod anthropic;

pub use anthropic::AnthropicScoringClient;
