use std::sync::Arc;

use aftercare_core::cipher::CipherService;
use aftercare_core::extract::ExtractionGateway;
use aftercare_core::store::RecordStore;
use aftercare_core::supersession::SupersessionManager;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub cipher: Arc<dyn CipherService>,
    pub gateway: Arc<dyn ExtractionGateway>,
    pub supersession: Arc<SupersessionManager>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cipher: Arc<dyn CipherService>,
        gateway: Arc<dyn ExtractionGateway>,
    ) -> Self {
        let supersession = Arc::new(SupersessionManager::new(store.clone(), cipher.clone()));
        Self {
            store,
            cipher,
            gateway,
            supersession,
        }
    }
}
