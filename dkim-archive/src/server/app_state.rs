use crate::batch_update::BatchUpdater;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) batch_updater: BatchUpdater,
}

impl AppState {
    pub fn new(batch_updater: BatchUpdater) -> Self {
        Self { batch_updater }
    }
}
