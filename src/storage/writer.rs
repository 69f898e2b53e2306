// Write-behind store
// Saves are queued to a dedicated writer thread so a tick loop never waits on disk.
// Loads flush the queue first and then read the wrapped store directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use super::{CrateStore, LocationIndex, StoredConfig};
use crate::crates::CrateConfig;
use crate::error::StoreError;

enum WriteRequest {
    SaveCrate(CrateConfig),
    DeleteCrate(String, Sender<Result<bool, StoreError>>),
    SaveLocations(LocationIndex),
    Flush(Sender<()>),
    Shutdown,
}

pub struct BackgroundStore {
    inner: Arc<dyn CrateStore>,
    tx: Sender<WriteRequest>,
    failed: Arc<AtomicUsize>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundStore {
    pub fn new(inner: Arc<dyn CrateStore>) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let failed = Arc::new(AtomicUsize::new(0));
        let worker = spawn_writer(Arc::clone(&inner), rx, Arc::clone(&failed))?;
        Ok(Self {
            inner,
            tx,
            failed,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queued writes that failed since startup
    pub fn failed_writes(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn send(&self, request: WriteRequest) -> Result<(), StoreError> {
        self.tx.send(request).map_err(|_| StoreError::WriterStopped)
    }
}

fn spawn_writer(
    store: Arc<dyn CrateStore>,
    rx: Receiver<WriteRequest>,
    failed: Arc<AtomicUsize>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("crate-store-writer".to_string())
        .spawn(move || {
            let report = |what: &str, result: Result<(), StoreError>| {
                if let Err(err) = result {
                    failed.fetch_add(1, Ordering::SeqCst);
                    error!(%err, "Background write failed: {what}");
                }
            };

            while let Ok(request) = rx.recv() {
                match request {
                    WriteRequest::SaveCrate(config) => {
                        report(&config.id, store.save_crate_definition(&config));
                    }
                    WriteRequest::DeleteCrate(id, reply) => {
                        let result = store.delete_crate_definition(&id);
                        if let Err(err) = &result {
                            failed.fetch_add(1, Ordering::SeqCst);
                            error!(%err, "Background delete failed: {id}");
                        }
                        let _ = reply.send(result);
                    }
                    WriteRequest::SaveLocations(index) => {
                        report("locations", store.save_location_index(&index));
                    }
                    WriteRequest::Flush(reply) => {
                        let _ = reply.send(());
                    }
                    WriteRequest::Shutdown => break,
                }
            }
            debug!("crate-store-writer stopped");
        })
}

impl CrateStore for BackgroundStore {
    fn load_crate_definitions(&self) -> Result<Vec<StoredConfig>, StoreError> {
        self.flush()?;
        self.inner.load_crate_definitions()
    }

    fn save_crate_definition(&self, config: &CrateConfig) -> Result<(), StoreError> {
        self.send(WriteRequest::SaveCrate(config.clone()))
    }

    /// Waits for the writer so the caller learns whether anything was removed
    fn delete_crate_definition(&self, id: &str) -> Result<bool, StoreError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(WriteRequest::DeleteCrate(id.to_string(), reply_tx))?;
        reply_rx.recv().map_err(|_| StoreError::WriterStopped)?
    }

    fn load_location_index(&self) -> Result<LocationIndex, StoreError> {
        self.flush()?;
        self.inner.load_location_index()
    }

    fn save_location_index(&self, index: &LocationIndex) -> Result<(), StoreError> {
        self.send(WriteRequest::SaveLocations(index.clone()))
    }

    fn flush(&self) -> Result<(), StoreError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(WriteRequest::Flush(reply_tx))?;
        reply_rx.recv().map_err(|_| StoreError::WriterStopped)
    }
}

impl Drop for BackgroundStore {
    fn drop(&mut self) {
        let _ = self.tx.send(WriteRequest::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}
