//! Per-attribute bookkeeping shared by the posting layer and its owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::attribute::status::AttributeStatus;
use crate::config::AttributeConfig;
use crate::error::Result;
use crate::generation::{Generation, GenerationGuard, GenerationHandler};

/// Configuration, document count, status and generation of one attribute.
#[derive(Debug)]
pub struct AttributeVector {
    config: Arc<AttributeConfig>,
    generation_handler: GenerationHandler,
    num_docs: AtomicU32,
    committed_doc_id_limit: AtomicU32,
    status: Mutex<AttributeStatus>,
}

impl AttributeVector {
    /// Create a vector for a validated configuration.
    pub fn new(config: AttributeConfig) -> Result<Self> {
        config.validate()?;
        Ok(AttributeVector {
            config: Arc::new(config),
            generation_handler: GenerationHandler::new(),
            num_docs: AtomicU32::new(0),
            committed_doc_id_limit: AtomicU32::new(0),
            status: Mutex::new(AttributeStatus::default()),
        })
    }

    pub fn config(&self) -> &Arc<AttributeConfig> {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Document id limit seen by the writer.
    pub fn get_num_docs(&self) -> u32 {
        self.num_docs.load(Ordering::Acquire)
    }

    pub(crate) fn set_num_docs(&self, num_docs: u32) {
        self.num_docs.store(num_docs, Ordering::Release);
    }

    /// Document id limit visible to readers.
    pub fn committed_doc_id_limit(&self) -> u32 {
        self.committed_doc_id_limit.load(Ordering::Acquire)
    }

    pub(crate) fn set_committed_doc_id_limit(&self, limit: u32) {
        self.committed_doc_id_limit.store(limit, Ordering::Release);
    }

    pub fn current_generation(&self) -> Generation {
        self.generation_handler.current_generation()
    }

    pub fn inc_generation(&self) -> Generation {
        self.generation_handler.inc_generation()
    }

    pub fn oldest_used_generation(&self) -> Generation {
        self.generation_handler.oldest_used_generation()
    }

    pub fn take_guard(&self) -> GenerationGuard {
        self.generation_handler.take_guard()
    }

    pub fn generation_handler(&self) -> &GenerationHandler {
        &self.generation_handler
    }

    /// Latest published statistics.
    pub fn get_status(&self) -> AttributeStatus {
        self.status.lock().clone()
    }

    pub(crate) fn update_status(&self, status: AttributeStatus) {
        *self.status.lock() = status;
    }
}
