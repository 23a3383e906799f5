//! HTTP adapters for the dictionary providers and the Groq generation API.

mod cambridge;
mod groq;
mod scrape;
mod webster;

pub use cambridge::CambridgeProvider;
pub use groq::GroqClient;
pub use webster::WebsterProvider;
