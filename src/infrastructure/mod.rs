pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod oauth_client;
pub mod spotify_client;
pub mod token_store;
