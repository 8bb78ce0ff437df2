use std::fmt;

use crate::parcel::{ParcelError, ParcelReader, ParcelWriter, Parcelable};

use super::is_blank;

/// The associate currently logged in on the device.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserSessionData {
    pub department_number: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub location_number: Option<String>,
    pub location_type: Option<String>,
    pub locale: Option<String>,
    pub user_id: Option<String>,
    pub user_type: Option<String>,
    pub ims_user_level: i32,
    pub sso_token: Option<String>,
    /// Directory group names, in provider order.
    pub groups: Vec<String>,
}

impl UserSessionData {
    /// A user record is usable once it names a user id.
    pub fn is_valid(&self) -> bool {
        !is_blank(self.user_id.as_deref())
    }
}

impl fmt::Debug for UserSessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSessionData")
            .field("department_number", &self.department_number)
            .field("first_name", &self.first_name)
            .field("middle_name", &self.middle_name)
            .field("last_name", &self.last_name)
            .field("location_number", &self.location_number)
            .field("location_type", &self.location_type)
            .field("locale", &self.locale)
            .field("user_id", &self.user_id)
            .field("user_type", &self.user_type)
            .field("ims_user_level", &self.ims_user_level)
            .field("sso_token", &self.sso_token.as_ref().map(|_| "<redacted>"))
            .field("groups", &self.groups)
            .finish()
    }
}

/// A user session, or the provider's explicit "nobody logged in" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UserSession {
    #[default]
    Empty,
    Populated(UserSessionData),
}

impl UserSession {
    pub fn is_empty(&self) -> bool {
        matches!(self, UserSession::Empty)
    }

    pub fn data(&self) -> Option<&UserSessionData> {
        match self {
            UserSession::Empty => None,
            UserSession::Populated(data) => Some(data),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.data().is_some_and(UserSessionData::is_valid)
    }

    pub fn into_valid(self) -> Option<UserSessionData> {
        match self {
            UserSession::Populated(data) if data.is_valid() => Some(data),
            _ => None,
        }
    }
}

impl From<UserSessionData> for UserSession {
    fn from(data: UserSessionData) -> Self {
        UserSession::Populated(data)
    }
}

impl Parcelable for UserSession {
    fn write_to(&self, w: &mut ParcelWriter) {
        let Some(u) = self.data() else {
            w.write_bool(true);
            return;
        };
        w.write_bool(false);
        w.write_string(u.department_number.as_deref());
        w.write_string(u.first_name.as_deref());
        w.write_string(u.middle_name.as_deref());
        w.write_string(u.last_name.as_deref());
        w.write_string(u.location_number.as_deref());
        w.write_string(u.location_type.as_deref());
        w.write_string(u.locale.as_deref());
        w.write_string(u.user_id.as_deref());
        w.write_string(u.user_type.as_deref());
        w.write_i32(u.ims_user_level);
        w.write_string(u.sso_token.as_deref());
        w.write_string_list(&u.groups);
    }

    fn read_from(r: &mut ParcelReader<'_>) -> Result<Self, ParcelError> {
        if r.read_bool()? {
            return Ok(UserSession::Empty);
        }
        Ok(UserSession::Populated(UserSessionData {
            department_number: r.read_string()?,
            first_name: r.read_string()?,
            middle_name: r.read_string()?,
            last_name: r.read_string()?,
            location_number: r.read_string()?,
            location_type: r.read_string()?,
            locale: r.read_string()?,
            user_id: r.read_string()?,
            user_type: r.read_string()?,
            ims_user_level: r.read_i32()?,
            sso_token: r.read_string()?,
            groups: r.read_string_list()?,
        }))
    }
}
