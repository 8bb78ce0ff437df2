//! Immutable session records as published by the session provider.

mod device;
mod user;

pub use device::{DeviceSession, DeviceSessionData};
pub use user::{UserSession, UserSessionData};

/// Absent or whitespace-only.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::is_blank;

    #[test]
    fn blank_covers_missing_and_whitespace() {
        assert!(is_blank(None));
        assert!(is_blank(Some("")));
        assert!(is_blank(Some(" \t")));
        assert!(!is_blank(Some("121")));
    }
}
