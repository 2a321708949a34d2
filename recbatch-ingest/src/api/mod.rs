//! HTTP API handlers for recbatch-ingest

pub mod auth;
pub mod batches;
pub mod health;
pub mod media;
pub mod presign;
pub mod recordings;
pub mod ui;
pub mod upload;

pub use batches::batch_routes;
pub use health::health_routes;
pub use media::media_routes;
pub use presign::presign_routes;
pub use recordings::recording_routes;
pub use ui::ui_routes;
pub use upload::upload_routes;
