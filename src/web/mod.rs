pub mod auth;
pub mod landing;
pub mod registrations;
pub mod reports;
pub mod responses;
pub mod router;
pub mod session;
pub mod state;
pub mod system;
pub mod templates;
pub mod uploads;

pub use state::AppState;
