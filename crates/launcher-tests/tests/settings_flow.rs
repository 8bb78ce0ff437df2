use launcher_protocol::ErrorCode;
use launcher_session::UserSession;
use launcher_tests::harness::{
    associate, client::TestClient, init_tracing, node::TestNode, provider::TestProvider,
    store_device, unwrap_error_code, unwrap_ok_data,
};
use serde_json::json;

#[tokio::test]
async fn settings_overlay_is_derived_from_both_sessions() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    provider.set_device(store_device("121"));
    provider.set_user(associate("dxr0121"));
    let node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let mut client = TestClient::connect(&node.socket_path).await.unwrap();

    let settings = client.settings().await.unwrap();
    assert_eq!(
        settings,
        json!({
            "device": {
                "name": "TC75",
                "version": "3.4.0",
                "languageCode": "en_US",
                "isQA": false
            },
            "user": {
                "associateUserID": "dxr0121",
                "userType": "associate",
                "imsUserLevel": 40,
                "ldapGroups": ["POS", "MGR"]
            },
            "location": {
                "locationName": "Store 121",
                "storeNumber": "121",
                "storeServer": "http://st121.homedepot.com"
            },
            "services": { "rootUrl": "http://st121.homedepot.com" },
            "estimatorServiceUri": "http://st121.homedepot.com:12100/ECommProxy/rs/calculatorService/"
        })
    );
}

#[tokio::test]
async fn repeated_reads_hit_the_provider_once() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    provider.set_device(store_device("121"));
    provider.set_user(associate("dxr0121"));
    let node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let mut client = TestClient::connect(&node.socket_path).await.unwrap();

    for _ in 0..3 {
        unwrap_ok_data(client.get_device().await.unwrap());
        unwrap_ok_data(client.get_user().await.unwrap());
        client.settings().await.unwrap();
    }
    assert_eq!(provider.device_calls(), 1);
    assert_eq!(provider.user_calls(), 1);
}

#[tokio::test]
async fn record_views_use_application_field_names() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    provider.set_device(store_device("121"));
    provider.set_user(associate("dxr0121"));
    let node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let mut client = TestClient::connect(&node.socket_path).await.unwrap();

    let device = unwrap_ok_data(client.get_device().await.unwrap());
    assert_eq!(device["storeNumber"], "121");
    assert_eq!(device["extensionNumber"], "4410");
    assert_eq!(device["ipAddress"], "10.0.0.17");

    let user = unwrap_ok_data(client.get_user().await.unwrap());
    assert_eq!(user["firstName"], "Dana");
    assert_eq!(user["thdSsoToken"], "sso-abc");
    assert_eq!(user["ldapGroups"], json!(["POS", "MGR"]));
    assert!(user.get("middleName").is_none());
}

#[tokio::test]
async fn logged_out_user_is_omitted_from_settings() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    provider.set_device(store_device("121"));
    provider.set_user(UserSession::Empty);
    let node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let mut client = TestClient::connect(&node.socket_path).await.unwrap();

    let settings = client.settings().await.unwrap();
    assert!(settings.get("user").is_none());
    assert_eq!(settings["location"]["storeNumber"], "121");

    let code = unwrap_error_code(client.get_user().await.unwrap());
    assert_eq!(code, ErrorCode::SessionUnavailable);
}

#[tokio::test]
async fn missing_device_fails_settings_and_device_lookups() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    provider.set_user(associate("dxr0121"));
    let node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let mut client = TestClient::connect(&node.socket_path).await.unwrap();

    let code = unwrap_error_code(client.get_settings().await.unwrap());
    assert_eq!(code, ErrorCode::DeviceUnavailable);
    let code = unwrap_error_code(client.get_device().await.unwrap());
    assert_eq!(code, ErrorCode::SessionUnavailable);
}

#[tokio::test]
async fn unrouted_actions_are_rejected() {
    init_tracing();
    let provider = TestProvider::spawn().await.unwrap();
    let node = TestNode::spawn(&provider.socket_path).await.unwrap();
    let mut client = TestClient::connect(&node.socket_path).await.unwrap();
    assert!(!client.version().is_empty());

    let code = unwrap_error_code(client.raw(r#"{"cmd":"launchApp"}"#).await.unwrap());
    assert_eq!(code, ErrorCode::InvalidAction);
    let code = unwrap_error_code(client.raw("{oops").await.unwrap());
    assert_eq!(code, ErrorCode::InvalidRequest);

    // The connection stays usable after a rejected line.
    let code = unwrap_error_code(client.get_settings().await.unwrap());
    assert_eq!(code, ErrorCode::DeviceUnavailable);
}
