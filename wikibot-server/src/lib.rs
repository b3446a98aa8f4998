pub mod http;
pub mod page;
pub mod pipeline;
pub mod prompts;
pub mod router;
pub mod session;
pub mod subsystems;
