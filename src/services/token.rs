use chrono::{Duration, Utc};
use rand::Rng;
use tracing::debug;

use crate::models::NewToken;
use crate::store::Session;
use crate::utils::error::AppError;

pub const EMAIL_VERIFICATION: &str = "user_email_verification";

const CODE_TTL_MINUTES: i64 = 5;

fn generate_code() -> i32 {
    rand::thread_rng().gen_range(100_000..1_000_000)
}

/// Issues a fresh code for the resource, replacing any earlier one.
pub async fn create_token(
    session: &mut dyn Session,
    resource_type: &str,
    resource_id: &str,
) -> Result<i32, AppError> {
    let code = generate_code();
    session
        .replace_token(&NewToken {
            code,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            expires_at: Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
        })
        .await?;

    debug!(resource_type, resource_id, "one-time code issued");
    Ok(code)
}

/// Checks a code. With `consume` a matching code is spent.
pub async fn verify_token(
    session: &mut dyn Session,
    code: i32,
    resource_type: &str,
    resource_id: &str,
    consume: bool,
) -> Result<bool, AppError> {
    Ok(session
        .take_token(code, resource_type, resource_id, Utc::now(), consume)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;

    #[test]
    fn test_codes_have_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert!((100_000..=999_999).contains(&code));
        }
    }

    #[tokio::test]
    async fn test_code_is_spent_once() {
        let (state, _) = test_state();
        let mut session = state.store.begin().await.unwrap();
        let code = create_token(session.as_mut(), EMAIL_VERIFICATION, "u1")
            .await
            .unwrap();

        assert!(verify_token(session.as_mut(), code, EMAIL_VERIFICATION, "u1", false)
            .await
            .unwrap());
        assert!(!verify_token(session.as_mut(), code, EMAIL_VERIFICATION, "u2", true)
            .await
            .unwrap());
        assert!(verify_token(session.as_mut(), code, EMAIL_VERIFICATION, "u1", true)
            .await
            .unwrap());
        assert!(!verify_token(session.as_mut(), code, EMAIL_VERIFICATION, "u1", true)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_new_code_replaces_previous() {
        let (state, _) = test_state();
        let mut session = state.store.begin().await.unwrap();
        let first = create_token(session.as_mut(), EMAIL_VERIFICATION, "u1")
            .await
            .unwrap();
        let second = create_token(session.as_mut(), EMAIL_VERIFICATION, "u1")
            .await
            .unwrap();

        if first != second {
            assert!(!verify_token(session.as_mut(), first, EMAIL_VERIFICATION, "u1", false)
                .await
                .unwrap());
        }
        assert!(verify_token(session.as_mut(), second, EMAIL_VERIFICATION, "u1", false)
            .await
            .unwrap());
    }
}
