use chrono::NaiveDate;

use crate::{CoreError, CoreResult};

pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Minimal RFC-agnostic email shape check: one `@`, non-empty local part,
/// domain with at least one dot.
pub fn validate_email(email: &str) -> CoreResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(CoreError::ValidationError("invalid email address".into()));
    };
    if local.is_empty() || domain.len() < 3 || !domain.contains('.') || domain.contains('@') {
        return Err(CoreError::ValidationError("invalid email address".into()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(CoreError::ValidationError(format!(
            "password must be at least {} characters",
            PASSWORD_MIN_LENGTH
        )));
    }
    Ok(())
}

/// Reject inverted or zero-length stay ranges before any availability check
/// runs. The overlap predicate itself never sees such ranges.
pub fn validate_date_range(check_in: NaiveDate, check_out: NaiveDate) -> CoreResult<()> {
    if check_out <= check_in {
        return Err(CoreError::ValidationError(
            "check-out must be after check-in".into(),
        ));
    }
    Ok(())
}

pub fn validate_non_empty(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}
