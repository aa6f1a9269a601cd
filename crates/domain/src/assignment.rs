use chrono::{DateTime, Utc};

/// Returns whether an assignment is active at `as_of`.
///
/// Activity is never stored: a row whose expiry has passed stays in the
/// store but stops counting from that instant on.
#[must_use]
pub fn is_assignment_active(expires_at: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> bool {
    expires_at.is_none_or(|expires_at| expires_at > as_of)
}
