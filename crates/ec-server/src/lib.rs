pub mod auth_middleware;
pub mod error;
pub mod handlers;
pub mod multipart_response;
pub mod router;
pub mod server;
pub mod state;
pub mod user_list;

pub use router::build_router;
pub use server::run;
pub use state::AppState;
