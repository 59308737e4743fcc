// Shared application state threaded through every route handler via axum's
// `State` extractor. One struct shared by all route modules rather than one
// per module, since conduit-api's routes collaborate over the same
// Dispatcher/EventBus/ObserverManager.

use std::path::PathBuf;
use std::sync::Arc;

use conduit_core::atoms::CallModelAtom;
use conduit_core::retry::FallbackChain;
use conduit_storage::Database;
use conduit_tools::{DiscoveryCache, LargeOutputStore, ToolRegistry};

use crate::config::ConfigModel;
use crate::event_bus::EventBus;
use crate::observer::ObserverManager;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub observers: Arc<ObserverManager>,
    pub event_bus: EventBus,
    pub registry: Arc<ToolRegistry>,
    pub discovery: Arc<DiscoveryCache>,
    pub large_output: Arc<LargeOutputStore>,
    pub call_model: CallModelAtom,
    pub default_chain: FallbackChain,
    pub config: Arc<ConfigModel>,
    pub workspace_root: PathBuf,
}
