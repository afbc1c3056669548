pub mod admin_handlers;
pub mod content_handlers;
pub mod health_handlers;
pub mod image_handlers;
pub mod profile_handlers;
