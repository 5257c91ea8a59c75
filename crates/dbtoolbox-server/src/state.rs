use std::sync::Arc;

use dbtoolbox_runtime::Toolbox;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub toolbox: Arc<Toolbox>,
}

impl AppState {
    pub fn new(toolbox: Arc<Toolbox>) -> Self {
        Self { toolbox }
    }
}
