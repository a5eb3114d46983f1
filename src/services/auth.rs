use tracing::{info, warn};

use super::user;
use crate::auth::password::{hash_password, verify_password};
use crate::dto::{LoginRequest, LoginResponse, RegisterRequest, UserRead};
use crate::models::{NewUser, UserRole};
use crate::state::AppState;
use crate::store::{StoreError, USER_EMAIL_CONSTRAINT};
use crate::utils::error::AppError;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn register_conflict(err: StoreError) -> AppError {
    if err.is_unique_violation_of(USER_EMAIL_CONSTRAINT) {
        AppError::Conflict("Email already used".to_string())
    } else {
        user::phone_conflict(err)
    }
}

/// Runs CPU-bound password work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::InternalServerError(format!("password task failed: {}", e)))
}

pub async fn register(state: &AppState, mut request: RegisterRequest) -> Result<UserRead, AppError> {
    request.validate()?;

    {
        let mut session = state.store.snapshot().await?;
        if session.find_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("Email already used".to_string()));
        }
        if let Some(phone) = &request.phone_number {
            if session.find_user_by_phone(phone).await?.is_some() {
                return Err(AppError::Conflict("Phone number already used".to_string()));
            }
        }
    }

    let password = request.password;
    let hash = blocking(move || hash_password(&password)).await??;

    let mut session = state.store.begin().await?;
    let created = session
        .insert_user(&NewUser {
            email: request.email,
            password: hash,
            full_name: Some(request.full_name.trim().to_string()),
            dob: Some(request.dob),
            roles: UserRole::User.as_str().to_string(),
            phone_number: request.phone_number,
        })
        .await
        .map_err(register_conflict)?;
    session.commit().await?;

    info!(user_id = %created.id, "user registered");
    Ok(user::render(state, created, None).await)
}

pub async fn login(state: &AppState, mut request: LoginRequest) -> Result<LoginResponse, AppError> {
    request.validate()?;

    let (found, profile) = {
        let mut session = state.store.snapshot().await?;
        let found = match (&request.email, &request.phone_number) {
            (Some(email), _) => session.find_user_by_email(email).await?,
            (None, Some(phone)) => session.find_user_by_phone(phone.trim()).await?,
            (None, None) => None,
        };
        let Some(found) = found else {
            warn!("login for unknown account");
            return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
        };
        let profile = user::load_profile(session.as_mut(), &found).await?;
        (found, profile)
    };

    let password = request.password;
    let hash = found.password.clone();
    if !blocking(move || verify_password(&password, &hash)).await? {
        warn!(user_id = %found.id, "login with wrong password");
        return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
    }

    let access_token = state.tokens.sign(found.id)?;
    info!(user_id = %found.id, "user logged in");
    Ok(LoginResponse {
        user: user::render(state, found, profile).await,
        access_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use chrono::NaiveDate;
    use rstest::rstest;

    const PASSWORD: &str = "Str0ng!pass";

    fn register_request(email: &str, phone: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            full_name: "John Rai".into(),
            email: email.into(),
            password: PASSWORD.into(),
            dob: NaiveDate::from_ymd_opt(2001, 9, 6).unwrap(),
            phone_number: phone.map(str::to_string),
        }
    }

    fn login_request(email: Option<&str>, phone: Option<&str>, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (state, _) = test_state();
        let registered = register(&state, register_request(" John@Example.com", Some("9810338577")))
            .await
            .unwrap();
        assert_eq!(registered.email, "john@example.com");
        assert_eq!(registered.roles, "user");
        assert!(registered.email_verified_at.is_none());

        let by_email = login(&state, login_request(Some("JOHN@example.com"), None, PASSWORD))
            .await
            .unwrap();
        assert_eq!(by_email.user.id, registered.id);
        assert_eq!(state.tokens.verify(&by_email.access_token).unwrap(), registered.id);

        let by_phone = login(&state, login_request(None, Some("9810338577"), PASSWORD))
            .await
            .unwrap();
        assert_eq!(by_phone.user.id, registered.id);
    }

    #[tokio::test]
    async fn test_stored_password_is_hashed() {
        let (state, _) = test_state();
        let registered = register(&state, register_request("a@example.com", None))
            .await
            .unwrap();
        let stored = state
            .store
            .snapshot()
            .await
            .unwrap()
            .find_user(registered.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password, PASSWORD);
        assert!(stored.password.starts_with("$argon2"));
    }

    #[rstest]
    #[case("a@example.com", None, "Email already used")]
    #[case("b@example.com", Some("111"), "Phone number already used")]
    #[tokio::test]
    async fn test_duplicate_registration_conflicts(
        #[case] email: &str,
        #[case] phone: Option<&str>,
        #[case] message: &str,
    ) {
        let (state, _) = test_state();
        register(&state, register_request("a@example.com", Some("111")))
            .await
            .unwrap();

        let err = register(&state, register_request(email, phone)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == message));
    }

    #[rstest]
    #[case(Some("a@example.com"), None, "Wr0ng!pass")]
    #[case(Some("nobody@example.com"), None, PASSWORD)]
    #[case(None, Some("000"), PASSWORD)]
    #[tokio::test]
    async fn test_bad_credentials_are_rejected(
        #[case] email: Option<&str>,
        #[case] phone: Option<&str>,
        #[case] password: &str,
    ) {
        let (state, _) = test_state();
        register(&state, register_request("a@example.com", Some("111")))
            .await
            .unwrap();

        let err = login(&state, login_request(email, phone, password)).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(msg) if msg == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_weak_password_is_rejected() {
        let (state, _) = test_state();
        let mut request = register_request("a@example.com", None);
        request.password = "password".into();
        assert!(matches!(
            register(&state, request).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
