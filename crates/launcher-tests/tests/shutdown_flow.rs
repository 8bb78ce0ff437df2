use launcher_protocol::Signal;
use launcher_tests::harness::{
    client::TestClient, init_tracing, node::TestNode, provider::TestProvider, store_device,
};
use std::time::Duration;

#[tokio::test]
async fn shutdown_signal_stops_the_node() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    provider.set_device(store_device("121"));
    let mut node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let socket_path = node.socket_path.clone();
    TestClient::connect(&socket_path).await.unwrap();

    provider.signal(Signal::ShutdownRequested);

    assert!(node.wait_stopped(Duration::from_secs(2)).await);
    assert!(!socket_path.exists(), "command socket left behind");
    assert!(TestClient::connect(&socket_path).await.is_err());
}

#[tokio::test]
async fn session_change_does_not_stop_the_node() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    let mut node = TestNode::spawn(&provider.socket_path).await.unwrap();

    provider.signal(Signal::SessionChanged { kind: None });

    assert!(!node.wait_stopped(Duration::from_millis(300)).await);
}
