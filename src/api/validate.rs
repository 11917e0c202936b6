//! Input-shape validation for the unauthenticated endpoints.

use super::error::{ApiError, FieldError};

/// Trim and lowercase an email. Applied uniformly before every store key
/// and durable lookup so mixed casing cannot bypass throttles or mint a
/// second OTP.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_name(name: &str) -> Option<FieldError> {
    if name.trim().len() < 3 {
        return Some(FieldError {
            field: "name",
            message: "Name must be at least 3 char",
        });
    }
    None
}

fn check_email(email: &str) -> Option<FieldError> {
    let email = email.trim();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !email.contains(char::is_whitespace)
    });
    if !valid {
        return Some(FieldError {
            field: "email",
            message: "Invalid email format",
        });
    }
    None
}

fn check_password(password: &str) -> Option<FieldError> {
    if password.len() < 8 {
        return Some(FieldError {
            field: "password",
            message: "Password must be at least 8 char",
        });
    }
    None
}

/// Validate a registration payload, collecting every field failure.
pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    let errors: Vec<FieldError> = [check_name(name), check_email(email), check_password(password)]
        .into_iter()
        .flatten()
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Validate a login payload.
pub fn validate_login(email: &str, password: &str) -> Result<(), ApiError> {
    let errors: Vec<FieldError> = [check_email(email), check_password(password)]
        .into_iter()
        .flatten()
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ann@X.Com "), "ann@x.com");
    }

    #[test]
    fn test_registration_collects_all_errors() {
        let err = validate_registration("ab", "not-an-email", "short").unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["name", "email", "password"]);
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_valid_inputs_pass() {
        assert!(validate_registration("Ann", "ann@x.com", "password123").is_ok());
        assert!(validate_login("ann@x.com", "password123").is_ok());
    }

    #[test]
    fn test_email_shapes() {
        assert!(check_email("ann@x.com").is_none());
        assert!(check_email("a@b.co.uk").is_none());
        assert!(check_email("@x.com").is_some());
        assert!(check_email("ann@xcom").is_some());
        assert!(check_email("ann@.com").is_some());
        assert!(check_email("ann @x.com").is_some());
        assert!(check_email("ann").is_some());
    }
}
