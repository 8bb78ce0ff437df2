//! Turns cached session records into the shapes consumed by applications.
//!
//! Every output field is described by a [`FieldRule`]; a field is emitted
//! only when its source yields a value, so no key is ever `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProjectionError;
use crate::model::{DeviceSessionData, UserSessionData, is_blank};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Domain under which each store's server is reachable as `st{n}.{domain}`.
    pub store_domain: String,
    pub estimator_port: u16,
    pub estimator_path: String,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            store_domain: "homedepot.com".to_string(),
            estimator_port: 12100,
            estimator_path: "/ECommProxy/rs/calculatorService/".to_string(),
        }
    }
}

/// Settings overlay for the application framework.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    pub device: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimator_service_uri: Option<String>,
}

/// One output key and where its value comes from.
struct FieldRule<T> {
    key: &'static str,
    source: fn(&T) -> Option<Value>,
}

fn apply<T>(rules: &[FieldRule<T>], input: &T) -> Map<String, Value> {
    rules
        .iter()
        .filter_map(|rule| (rule.source)(input).map(|value| (rule.key.to_string(), value)))
        .collect()
}

fn text(value: &Option<String>) -> Option<Value> {
    value.clone().map(Value::String)
}

fn list(values: &[String]) -> Option<Value> {
    Some(Value::from(values.to_vec()))
}

/// Store-derived context, present only when the device names a store.
struct StoreContext {
    store_number: String,
    root_url: String,
}

const DEVICE_SETTINGS: &[FieldRule<DeviceSessionData>] = &[
    FieldRule {
        key: "name",
        source: |d| text(&d.device_model_number),
    },
    FieldRule {
        key: "version",
        source: |d| text(&d.launcher_version),
    },
    FieldRule {
        key: "languageCode",
        source: |d| text(&d.locale),
    },
    FieldRule {
        key: "isQA",
        source: |d| Some(Value::Bool(d.qa)),
    },
];

const USER_SETTINGS: &[FieldRule<UserSessionData>] = &[
    FieldRule {
        key: "associateUserID",
        source: |u| text(&u.user_id),
    },
    FieldRule {
        key: "userType",
        source: |u| text(&u.user_type),
    },
    FieldRule {
        key: "imsUserLevel",
        source: |u| Some(Value::from(u.ims_user_level)),
    },
    FieldRule {
        key: "ldapGroups",
        source: |u| list(&u.groups),
    },
];

const LOCATION_SETTINGS: &[FieldRule<StoreContext>] = &[
    FieldRule {
        key: "locationName",
        source: |s| Some(Value::String(format!("Store {}", s.store_number))),
    },
    FieldRule {
        key: "storeNumber",
        source: |s| Some(Value::String(s.store_number.clone())),
    },
    FieldRule {
        key: "storeServer",
        source: |s| Some(Value::String(s.root_url.clone())),
    },
];

const SERVICES_SETTINGS: &[FieldRule<StoreContext>] = &[
    FieldRule {
        key: "rootUrl",
        source: |s| Some(Value::String(s.root_url.clone())),
    },
];

const DEVICE_VIEW: &[FieldRule<DeviceSessionData>] = &[
    FieldRule {
        key: "storeNumber",
        source: |d| text(&d.store_number),
    },
    FieldRule {
        key: "extensionNumber",
        source: |d| text(&d.extension_number),
    },
    FieldRule {
        key: "deviceId",
        source: |d| text(&d.device_id),
    },
    FieldRule {
        key: "deviceModelNumber",
        source: |d| text(&d.device_model_number),
    },
    FieldRule {
        key: "ipAddress",
        source: |d| text(&d.ip_address),
    },
    FieldRule {
        key: "locale",
        source: |d| text(&d.locale),
    },
];

const USER_VIEW: &[FieldRule<UserSessionData>] = &[
    FieldRule {
        key: "departmentNumber",
        source: |u| text(&u.department_number),
    },
    FieldRule {
        key: "firstName",
        source: |u| text(&u.first_name),
    },
    FieldRule {
        key: "middleName",
        source: |u| text(&u.middle_name),
    },
    FieldRule {
        key: "lastName",
        source: |u| text(&u.last_name),
    },
    FieldRule {
        key: "thdSsoToken",
        source: |u| text(&u.sso_token),
    },
    FieldRule {
        key: "ldapGroups",
        source: |u| list(&u.groups),
    },
    FieldRule {
        key: "locationNumber",
        source: |u| text(&u.location_number),
    },
    FieldRule {
        key: "locationType",
        source: |u| text(&u.location_type),
    },
    FieldRule {
        key: "associateUserID",
        source: |u| text(&u.user_id),
    },
    FieldRule {
        key: "userType",
        source: |u| text(&u.user_type),
    },
    FieldRule {
        key: "imsUserLevel",
        source: |u| Some(Value::from(u.ims_user_level)),
    },
];

/// Pure mapping from session records to application-facing views.
#[derive(Debug, Clone, Default)]
pub struct SessionProjector {
    config: ProjectorConfig,
}

impl SessionProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Build the settings overlay.
    ///
    /// A missing device session is fatal: nothing store-specific can be
    /// derived without it. A missing user session just means nobody is
    /// logged in, and the user section is left out.
    pub fn project(
        &self,
        user: Option<&UserSessionData>,
        device: Option<&DeviceSessionData>,
    ) -> Result<ViewSettings, ProjectionError> {
        let device = device.ok_or(ProjectionError::DeviceUnavailable)?;

        let mut settings = ViewSettings {
            device: apply(DEVICE_SETTINGS, device),
            user: user.map(|u| apply(USER_SETTINGS, u)),
            ..Default::default()
        };

        if let Some(store) = self.store_context(device) {
            settings.location = Some(apply(LOCATION_SETTINGS, &store));
            settings.services = Some(apply(SERVICES_SETTINGS, &store));
            settings.estimator_service_uri = Some(format!(
                "{}:{}{}",
                store.root_url, self.config.estimator_port, self.config.estimator_path
            ));
        }

        Ok(settings)
    }

    fn store_context(&self, device: &DeviceSessionData) -> Option<StoreContext> {
        let store_number = device.store_number.as_deref()?;
        if is_blank(Some(store_number)) {
            return None;
        }
        Some(StoreContext {
            store_number: store_number.to_string(),
            root_url: format!("http://st{store_number}.{}", self.config.store_domain),
        })
    }

    /// Device record with the field names applications expect.
    pub fn device_view(&self, device: &DeviceSessionData) -> Map<String, Value> {
        apply(DEVICE_VIEW, device)
    }

    /// User record with the field names applications expect.
    pub fn user_view(&self, user: &UserSessionData) -> Map<String, Value> {
        apply(USER_VIEW, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device() -> DeviceSessionData {
        DeviceSessionData {
            store_number: Some("121".into()),
            device_id: Some("dev-1".into()),
            device_model_number: Some("TC75".into()),
            launcher_version: Some("3.4.0".into()),
            locale: Some("en_US".into()),
            qa: false,
            ..Default::default()
        }
    }

    fn user() -> UserSessionData {
        UserSessionData {
            user_id: Some("dxr0121".into()),
            user_type: Some("associate".into()),
            ims_user_level: 40,
            groups: vec!["POS".into()],
            first_name: Some("Dana".into()),
            sso_token: Some("tok".into()),
            ..Default::default()
        }
    }

    #[test]
    fn store_number_derives_location_and_urls() {
        let settings = SessionProjector::default()
            .project(Some(&user()), Some(&device()))
            .unwrap();

        let location = settings.location.as_ref().unwrap();
        assert_eq!(location["locationName"], "Store 121");
        assert_eq!(location["storeNumber"], "121");
        assert_eq!(location["storeServer"], "http://st121.homedepot.com");
        assert_eq!(
            settings.services.as_ref().unwrap()["rootUrl"],
            "http://st121.homedepot.com"
        );
        assert_eq!(
            settings.estimator_service_uri.as_deref(),
            Some("http://st121.homedepot.com:12100/ECommProxy/rs/calculatorService/")
        );
    }

    #[test]
    fn settings_serialize_in_framework_shape() {
        let settings = SessionProjector::default()
            .project(Some(&user()), Some(&device()))
            .unwrap();
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            value,
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
                    "ldapGroups": ["POS"]
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

    #[test]
    fn missing_device_is_a_hard_failure() {
        let err = SessionProjector::default()
            .project(Some(&user()), None)
            .unwrap_err();
        assert_eq!(err, ProjectionError::DeviceUnavailable);
    }

    #[test]
    fn logged_out_user_omits_user_section() {
        let settings = SessionProjector::default()
            .project(None, Some(&device()))
            .unwrap();
        assert!(settings.user.is_none());
        let value = serde_json::to_value(&settings).unwrap();
        assert!(value.get("user").is_none());
        assert!(value.get("device").is_some());
    }

    #[test]
    fn no_store_number_omits_every_derived_field() {
        let mut device = device();
        device.store_number = None;
        let settings = SessionProjector::default().project(None, Some(&device)).unwrap();
        let value = serde_json::to_value(&settings).unwrap();
        assert!(value.get("location").is_none());
        assert!(value.get("services").is_none());
        assert!(value.get("estimatorServiceUri").is_none());

        device.store_number = Some(" ".into());
        let settings = SessionProjector::default().project(None, Some(&device)).unwrap();
        assert!(settings.location.is_none());
    }

    #[test]
    fn null_sources_are_omitted_not_nulled() {
        let device = DeviceSessionData {
            store_number: Some("9".into()),
            device_id: Some("d".into()),
            ..Default::default()
        };
        let settings = SessionProjector::default().project(None, Some(&device)).unwrap();
        assert_eq!(settings.device.len(), 1);
        assert_eq!(settings.device["isQA"], false);
    }

    #[test]
    fn store_domain_is_configurable() {
        let projector = SessionProjector::new(ProjectorConfig {
            store_domain: "stores.example.net".into(),
            estimator_port: 8443,
            estimator_path: "/estimate/".into(),
        });
        let settings = projector.project(None, Some(&device())).unwrap();
        assert_eq!(
            settings.estimator_service_uri.as_deref(),
            Some("http://st121.stores.example.net:8443/estimate/")
        );
    }

    #[test]
    fn user_view_renames_fields() {
        let view = SessionProjector::default().user_view(&user());
        assert_eq!(view["associateUserID"], "dxr0121");
        assert_eq!(view["firstName"], "Dana");
        assert_eq!(view["thdSsoToken"], "tok");
        assert!(!view.contains_key("middleName"));
        assert!(!view.contains_key("user_id"));
    }

    #[test]
    fn device_view_copies_identity_fields() {
        let view = SessionProjector::default().device_view(&device());
        assert_eq!(view["storeNumber"], "121");
        assert_eq!(view["deviceId"], "dev-1");
        assert_eq!(view["deviceModelNumber"], "TC75");
        assert!(!view.contains_key("ipAddress"));
    }
}
