use podscan_core::SessionController;

/// State shared with the HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub controller: SessionController,
}

impl AppState {
    pub fn new(controller: SessionController) -> Self {
        Self { controller }
    }
}
