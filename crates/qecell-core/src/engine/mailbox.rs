use super::atom_sync::SyncDirection;
use crate::core::models::ids::OriginIndex;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;

/// A request posted from another thread, applied on the owning thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteRequest {
    /// Remove the card entry at this origin (and with it the structural atom).
    RemoveAtom(OriginIndex),
    /// Rebuild one side of the atom binding from the other.
    ResyncAll(SyncDirection),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RemoteError {
    #[error("The cell binding has been dropped")]
    Disconnected,
}

/// Sendable handle for posting [`RemoteRequest`]s to a cell binding.
///
/// Requests are queued, not applied: the owning thread applies them in order when
/// it calls `CellBinding::process_pending`.
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    sender: Sender<RemoteRequest>,
}

impl RemoteHandle {
    pub fn send(&self, request: RemoteRequest) -> Result<(), RemoteError> {
        self.sender
            .send(request)
            .map_err(|_| RemoteError::Disconnected)
    }

    pub fn remove_atom(&self, origin: OriginIndex) -> Result<(), RemoteError> {
        self.send(RemoteRequest::RemoveAtom(origin))
    }

    pub fn resync(&self, direction: SyncDirection) -> Result<(), RemoteError> {
        self.send(RemoteRequest::ResyncAll(direction))
    }
}

#[derive(Debug)]
pub(crate) struct Mailbox {
    sender: Sender<RemoteRequest>,
    receiver: Receiver<RemoteRequest>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn handle(&self) -> RemoteHandle {
        RemoteHandle {
            sender: self.sender.clone(),
        }
    }

    /// Takes every request queued so far without blocking.
    pub fn drain(&self) -> Vec<RemoteRequest> {
        self.receiver.try_iter().collect()
    }
}
