pub mod api;
pub mod api_doc;
pub mod auth;
pub mod server;

pub use server::run_server;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::reporter::Reporter;
use crate::source::PushSource;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reporter: Arc<Mutex<Reporter>>,
    /// Present only when the configured location source is `push`.
    pub push: Option<Arc<PushSource>>,
}
