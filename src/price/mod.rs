pub mod adapter;
pub mod cache;
pub mod rest_adapter;
pub mod stream_adapter;

pub use adapter::PriceAdapter;
pub use cache::{PriceCache, PriceQuote};
