pub mod client;
pub mod node;
pub mod provider;

use launcher_protocol::{CommandResponse, ErrorCode};
use launcher_session::{DeviceSessionData, UserSessionData};
use std::future::Future;
use std::time::Duration;

/// Poll `check` until it returns true, or timeout. Returns the last result.
pub async fn poll_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Initialize tracing for tests (only once per process).
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("launcher_session=debug,launcher_node=debug,launcher_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Extract data from an Ok response, or panic.
pub fn unwrap_ok_data(resp: CommandResponse) -> serde_json::Value {
    match resp {
        CommandResponse::Ok { data: Some(data) } => data,
        CommandResponse::Error { code, message } => {
            panic!("expected Ok, got Error({code:?}): {message}")
        }
        other => panic!("expected Ok with data, got {other:?}"),
    }
}

/// Extract the code from an Error response, or panic.
pub fn unwrap_error_code(resp: CommandResponse) -> ErrorCode {
    match resp {
        CommandResponse::Error { code, .. } => code,
        other => panic!("expected Error, got {other:?}"),
    }
}

pub fn store_device(store: &str) -> DeviceSessionData {
    DeviceSessionData {
        store_number: Some(store.to_string()),
        extension_number: Some("4410".to_string()),
        device_id: Some(format!("dev-{store}")),
        device_model_number: Some("TC75".to_string()),
        ip_address: Some("10.0.0.17".to_string()),
        locale: Some("en_US".to_string()),
        launcher_version: Some("3.4.0".to_string()),
        ..Default::default()
    }
}

pub fn associate(user_id: &str) -> UserSessionData {
    UserSessionData {
        first_name: Some("Dana".to_string()),
        last_name: Some("Reyes".to_string()),
        user_id: Some(user_id.to_string()),
        user_type: Some("associate".to_string()),
        ims_user_level: 40,
        sso_token: Some("sso-abc".to_string()),
        groups: vec!["POS".to_string(), "MGR".to_string()],
        ..Default::default()
    }
}
