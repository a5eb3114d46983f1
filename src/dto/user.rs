use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file::FileRead;
use crate::models::User;
use crate::utils::error::AppError;

const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?`~";

fn invalid(message: &str) -> AppError {
    AppError::ValidationError(message.to_string())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let well_formed = email.len() <= 255
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };
    if well_formed {
        Ok(())
    } else {
        Err(invalid("email is not a valid address"))
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    let strong = (8..=30).contains(&len)
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));
    if strong {
        Ok(())
    } else {
        Err(invalid(
            "password must be 8 to 30 characters with an uppercase letter, a lowercase letter, a digit and a symbol",
        ))
    }
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    if phone.is_empty() || phone.chars().count() > 15 {
        return Err(invalid("phone_number must be between 1 and 15 characters"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub dob: NaiveDate,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl RegisterRequest {
    /// Validates the payload and normalises the email in place.
    pub fn validate(&mut self) -> Result<(), AppError> {
        let name_len = self.full_name.trim().chars().count();
        if !(3..=255).contains(&name_len) {
            return Err(invalid("full_name must be between 3 and 255 characters"));
        }
        self.email = normalize_email(&self.email);
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if let Some(phone) = &self.phone_number {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.email = self.email.as_deref().map(normalize_email);
        if self.email.is_none() && self.phone_number.is_none() {
            return Err(invalid("either email or phone_number must be provided"));
        }
        if self.password.is_empty() {
            return Err(invalid("password is required"));
        }
        Ok(())
    }
}

/// Presence aware profile update; `null` clears a field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub full_name: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub dob: Option<Option<NaiveDate>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub gender: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub phone_number: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub profile_id: Option<Option<String>>,
}

impl ProfileUpdateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(Some(name)) = &self.full_name {
            let len = name.trim().chars().count();
            if !(3..=255).contains(&len) {
                return Err(invalid("full_name must be between 3 and 255 characters"));
            }
        }
        if let Some(Some(phone)) = &self.phone_number {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeRequest {
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRead {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub roles: String,
    pub gender: Option<String>,
    pub phone_number: Option<String>,
    pub phone_verified_at: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub profile: Option<FileRead>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRead {
    pub fn new(user: User, profile: Option<FileRead>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            dob: user.dob,
            roles: user.roles,
            gender: user.gender,
            phone_number: user.phone_number,
            phone_verified_at: user.phone_verified_at,
            email_verified_at: user.email_verified_at,
            profile,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserRead,
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn register(password: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "John Rai".into(),
            email: "  John@Example.COM ".into(),
            password: password.into(),
            dob: NaiveDate::from_ymd_opt(2001, 9, 6).unwrap(),
            phone_number: Some("9810338577".into()),
        }
    }

    #[rstest]
    #[case("Test@123", true)]
    #[case("test@123", false)]
    #[case("TEST@123", false)]
    #[case("Test@abc", false)]
    #[case("Test1234", false)]
    #[case("T@1a", false)]
    #[case("Test@123456789012345678901234567", false)]
    fn test_password_rules(#[case] password: &str, #[case] ok: bool) {
        assert_eq!(register(password).validate().is_ok(), ok);
    }

    #[test]
    fn test_email_is_normalised() {
        let mut body = register("Test@123");
        body.validate().unwrap();
        assert_eq!(body.email, "john@example.com");
    }

    #[rstest]
    #[case("plain")]
    #[case("a@b")]
    #[case("@example.com")]
    #[case("a b@example.com")]
    fn test_malformed_email_is_rejected(#[case] email: &str) {
        assert!(validate_email(email).is_err());
    }

    #[test]
    fn test_login_needs_email_or_phone() {
        let mut body = LoginRequest {
            email: None,
            phone_number: None,
            password: "Test@123".into(),
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_profile_update_presence() {
        let body: ProfileUpdateRequest =
            serde_json::from_str(r#"{"phone_number": null, "gender": "f"}"#).unwrap();
        assert_eq!(body.phone_number, Some(None));
        assert_eq!(body.gender, Some(Some("f".into())));
        assert_eq!(body.profile_id, None);
    }
}
