// Engine orchestration: session lifecycle, event loop and engine collaborator ports.

pub mod event_loop;
pub mod events;
pub mod manager;
pub mod scripted;
pub mod session;
pub mod traits;
