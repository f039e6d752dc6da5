//! Replica port tests against a mocked IPFS HTTP API.

use evidence_replica::{IpfsNode, PinningService, ReplicaError, ReplicaStore};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reader(bytes: &'static [u8]) -> Box<dyn tokio::io::AsyncRead + Send + Sync + Unpin> {
    Box::new(bytes)
}

#[tokio::test]
async fn test_node_pin_returns_cid_and_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .and(query_param("cid-version", "1"))
        .and(query_param("pin", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Name": "blob",
            "Hash": "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
            "Size": "12"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = ReplicaStore::Node(IpfsNode::new(server.uri(), "https://ipfs.example.org"));
    let pinned = store.pin(reader(b"hello world!")).await.unwrap();

    assert_eq!(
        pinned.cid,
        "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
    );
    assert_eq!(pinned.size, 12);
}

#[tokio::test]
async fn test_node_pin_surfaces_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(500).set_body_string("add failed"))
        .mount(&server)
        .await;

    let store = ReplicaStore::Node(IpfsNode::new(server.uri(), "https://ipfs.example.org"));
    match store.pin(reader(b"x")).await {
        Err(ReplicaError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "add failed");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_node_unpin_tolerates_not_pinned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/pin/rm"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("pin/rm: bafyfoo is not pinned or pinned indirectly"),
        )
        .mount(&server)
        .await;

    let store = ReplicaStore::Node(IpfsNode::new(server.uri(), "https://ipfs.example.org"));
    store.unpin("bafyfoo").await.unwrap();
}

#[tokio::test]
async fn test_node_gateway_url() {
    let store = ReplicaStore::Node(IpfsNode::new(
        "http://127.0.0.1:5001",
        "https://ipfs.example.org/",
    ));
    assert_eq!(
        store.gateway_url("bafyfoo"),
        "https://ipfs.example.org/ipfs/bafyfoo"
    );
}

#[tokio::test]
async fn test_pinning_service_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": "bafybeibwzifw52ttrkqlikfzext5d4qh4bczsvnnpjkfkbmupsbgab2g24",
            "PinSize": 42,
            "Timestamp": "2026-01-12T09:30:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = ReplicaStore::Pinning(PinningService::new(
        server.uri(),
        "secret-key",
        "https://gateway.example.org",
    ));
    let pinned = store.pin(reader(b"evidence")).await.unwrap();
    assert_eq!(pinned.size, 42);
}

#[tokio::test]
async fn test_pinning_service_unpin_tolerates_missing() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/pinning/unpin/bafygone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = ReplicaStore::Pinning(PinningService::new(
        server.uri(),
        "secret-key",
        "https://gateway.example.org",
    ));
    store.unpin("bafygone").await.unwrap();
}
