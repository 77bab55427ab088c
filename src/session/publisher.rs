//! Outlet for content operations this client originates.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::transport::{OutboundMessage, OutboundSender};

use super::update::ScriptUpdate;

/// Sends locally originated [`ScriptUpdate`]s to the other viewers.
///
/// Injected once when a session is built.
pub trait UpdatePublisher: Send {
    /// # Errors
    ///
    /// Returns an error if the update could not be queued.
    fn publish(&self, update: &ScriptUpdate) -> Result<()>;
}

impl UpdatePublisher for OutboundSender {
    fn publish(&self, update: &ScriptUpdate) -> Result<()> {
        let (update_type, changes) = update.to_wire()?;
        self.send(OutboundMessage::ScriptUpdate {
            update_type,
            changes,
        })
    }
}

/// Publisher for sessions with no server, e.g. local rehearsal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl UpdatePublisher for NullPublisher {
    fn publish(&self, _update: &ScriptUpdate) -> Result<()> {
        Ok(())
    }
}

/// Collects published updates in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<ScriptUpdate>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, oldest first.
    pub fn published(&self) -> Vec<ScriptUpdate> {
        match self.published.lock() {
            Ok(p) => p.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }
}

impl UpdatePublisher for RecordingPublisher {
    fn publish(&self, update: &ScriptUpdate) -> Result<()> {
        match self.published.lock() {
            Ok(mut p) => p.push(update.clone()),
            Err(p) => p.into_inner().push(update.clone()),
        }
        Ok(())
    }
}
