pub mod event;
pub mod provider;
pub mod signal;

pub use event::SignalEvent;
pub use provider::{Provider, WebhookSubscription};
pub use signal::Signal;
