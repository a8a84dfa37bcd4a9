//! HTTP API handlers for roomlog-api

pub mod files;
pub mod health;
pub mod images;
pub mod rooms;
pub mod uploads;

pub use files::file_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use rooms::room_routes;
