use crate::parcel::{ParcelError, ParcelReader, ParcelWriter, Parcelable};

use super::is_blank;

/// Identifying context of the device the application runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSessionData {
    pub store_number: Option<String>,
    pub extension_number: Option<String>,
    /// Push-to-talk channel identifiers, in provider order.
    pub channels: Vec<String>,
    pub voip_registration_code: Option<String>,
    pub device_id: Option<String>,
    pub device_model_number: Option<String>,
    pub ip_address: Option<String>,
    pub locale: Option<String>,
    pub launcher_version: Option<String>,
    pub qa: bool,
}

impl DeviceSessionData {
    /// A device record is usable only with both a device id and a store number.
    pub fn is_valid(&self) -> bool {
        !is_blank(self.device_id.as_deref()) && !is_blank(self.store_number.as_deref())
    }
}

/// A device session, or the provider's explicit "no session" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeviceSession {
    #[default]
    Empty,
    Populated(DeviceSessionData),
}

impl DeviceSession {
    pub fn is_empty(&self) -> bool {
        matches!(self, DeviceSession::Empty)
    }

    pub fn data(&self) -> Option<&DeviceSessionData> {
        match self {
            DeviceSession::Empty => None,
            DeviceSession::Populated(data) => Some(data),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.data().is_some_and(DeviceSessionData::is_valid)
    }

    /// The populated record, if it passes [`DeviceSessionData::is_valid`].
    pub fn into_valid(self) -> Option<DeviceSessionData> {
        match self {
            DeviceSession::Populated(data) if data.is_valid() => Some(data),
            _ => None,
        }
    }
}

impl From<DeviceSessionData> for DeviceSession {
    fn from(data: DeviceSessionData) -> Self {
        DeviceSession::Populated(data)
    }
}

impl Parcelable for DeviceSession {
    fn write_to(&self, w: &mut ParcelWriter) {
        let Some(d) = self.data() else {
            w.write_bool(true);
            return;
        };
        w.write_bool(false);
        w.write_string(d.store_number.as_deref());
        w.write_string(d.extension_number.as_deref());
        w.write_string_list(&d.channels);
        w.write_string(d.voip_registration_code.as_deref());
        w.write_string(d.device_id.as_deref());
        w.write_string(d.device_model_number.as_deref());
        w.write_string(d.ip_address.as_deref());
        w.write_string(d.locale.as_deref());
        w.write_string(d.launcher_version.as_deref());
        w.write_bool(d.qa);
    }

    fn read_from(r: &mut ParcelReader<'_>) -> Result<Self, ParcelError> {
        if r.read_bool()? {
            return Ok(DeviceSession::Empty);
        }
        Ok(DeviceSession::Populated(DeviceSessionData {
            store_number: r.read_string()?,
            extension_number: r.read_string()?,
            channels: r.read_string_list()?,
            voip_registration_code: r.read_string()?,
            device_id: r.read_string()?,
            device_model_number: r.read_string()?,
            ip_address: r.read_string()?,
            locale: r.read_string()?,
            launcher_version: r.read_string()?,
            qa: r.read_bool()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceSessionData {
        DeviceSessionData {
            store_number: Some("121".into()),
            extension_number: Some("4410".into()),
            channels: vec!["ops".into(), "front-end".into()],
            voip_registration_code: None,
            device_id: Some("dev-9f2".into()),
            device_model_number: Some("TC75".into()),
            ip_address: Some("10.1.2.3".into()),
            locale: Some("en_US".into()),
            launcher_version: Some("3.4.0".into()),
            qa: true,
        }
    }

    #[test]
    fn empty_session_encodes_only_the_flag() {
        assert_eq!(&DeviceSession::Empty.to_parcel()[..], &[1]);
        let decoded = DeviceSession::from_parcel(&[1]).unwrap();
        assert_eq!(decoded, DeviceSession::Empty);
    }

    #[test]
    fn populated_session_survives_the_boundary() {
        let session = DeviceSession::from(sample());
        let bytes = session.to_parcel();
        assert_eq!(bytes[0], 0);
        assert_eq!(DeviceSession::from_parcel(&bytes).unwrap(), session);
    }

    #[test]
    fn fields_follow_declaration_order() {
        let data = DeviceSessionData {
            store_number: Some("7".into()),
            ..Default::default()
        };
        let bytes = DeviceSession::from(data).to_parcel();
        // flag, store number "7", extension null, empty channel list.
        assert_eq!(
            &bytes[..14],
            &[0, 1, 0, 0, 0, b'7', 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]
        );
        // Trailing qa flag.
        assert_eq!(bytes[bytes.len() - 1], 0);
    }

    #[test]
    fn trailing_bytes_after_empty_flag_are_rejected() {
        let err = DeviceSession::from_parcel(&[1, 0]).unwrap_err();
        assert_eq!(err, ParcelError::TrailingBytes(1));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let bytes = DeviceSession::from(sample()).to_parcel();
        let err = DeviceSession::from_parcel(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, ParcelError::Truncated { .. }));
    }

    #[test]
    fn validity_requires_device_id_and_store_number() {
        assert!(DeviceSession::from(sample()).is_valid());
        assert!(!DeviceSession::Empty.is_valid());

        let mut no_store = sample();
        no_store.store_number = Some("  ".into());
        assert!(!no_store.is_valid());

        let mut no_device = sample();
        no_device.device_id = None;
        assert!(!DeviceSession::from(no_device).is_valid());
    }

    #[test]
    fn into_valid_drops_invalid_records() {
        assert_eq!(DeviceSession::from(sample()).into_valid(), Some(sample()));
        assert_eq!(DeviceSession::Empty.into_valid(), None);
        let invalid = DeviceSessionData {
            device_id: Some("dev".into()),
            ..Default::default()
        };
        assert_eq!(DeviceSession::from(invalid).into_valid(), None);
    }

    #[test]
    fn equality_covers_every_field() {
        let mut other = sample();
        other.channels.reverse();
        assert_ne!(sample(), other);
        let mut other = sample();
        other.qa = false;
        assert_ne!(DeviceSession::from(sample()), DeviceSession::from(other));
        let blank = DeviceSession::from(DeviceSessionData::default());
        assert_ne!(DeviceSession::Empty, blank);
    }
}
