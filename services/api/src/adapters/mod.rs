pub mod db;
pub mod feed;
pub mod generation_llm;

pub use db::PgStore;
pub use feed::PgCounterFeed;
pub use generation_llm::OpenAiGenerationAdapter;
