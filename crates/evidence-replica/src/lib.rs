//! Secondary-replica port: content-addressed replication to IPFS.
//!
//! Replication is strictly optional. The service runs with this port
//! absent, and a pin failure never rolls back a primary write: callers
//! log and count it. Two backends are dispatched through the
//! [`ReplicaStore`] sum type: a self-hosted node speaking the IPFS HTTP
//! API, and a third-party pinning service authenticated with an API key.

pub mod node;
pub mod pinning;

mod error;

use tokio::io::AsyncRead;

pub use error::ReplicaError;
pub use node::IpfsNode;
pub use pinning::PinningService;

/// A read-once stream handed to `pin`.
pub type ReplicaReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Outcome of a successful pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pinned {
    /// CIDv1 of the pinned content.
    pub cid: String,
    /// Size reported by the replica network.
    pub size: u64,
}

/// Secondary-replica backend, chosen once at startup.
#[derive(Clone)]
pub enum ReplicaStore {
    Node(IpfsNode),
    Pinning(PinningService),
}

impl ReplicaStore {
    /// Pins a stream of bytes, returning its CIDv1.
    pub async fn pin(&self, reader: ReplicaReader) -> Result<Pinned, ReplicaError> {
        match self {
            Self::Node(node) => node.pin(reader).await,
            Self::Pinning(svc) => svc.pin(reader).await,
        }
    }

    /// Removes a pin. Unpinning content that is not pinned is a no-op.
    pub async fn unpin(&self, cid: &str) -> Result<(), ReplicaError> {
        match self {
            Self::Node(node) => node.unpin(cid).await,
            Self::Pinning(svc) => svc.unpin(cid).await,
        }
    }

    /// Public gateway URL for a CID.
    pub fn gateway_url(&self, cid: &str) -> String {
        match self {
            Self::Node(node) => node.gateway_url(cid),
            Self::Pinning(svc) => svc.gateway_url(cid),
        }
    }
}
