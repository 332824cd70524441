pub mod bootstrap;
pub mod commands;
pub mod oauth;
pub mod playback;
pub mod scheduler;
pub mod tasks;
pub mod timer;
