use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::{
    dto::auth::{
        AdminLoginRequest, AdminLoginResponse, Claims, LoginRequest, LoginResponse,
        RegisterRequest,
    },
    entity::{
        admins::{Column as AdminCol, Entity as Admins},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    models::UserPublic,
    response::ApiResponse,
    state::AppState,
};

const TOKEN_TTL_HOURS: i64 = 24;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Issue a signed bearer token naming the subject id and role.
pub fn issue_token(secret: &str, subject_id: i32, role: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: subject_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(token)
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserPublic>> {
    let exist = Users::find()
        .filter(UserCol::Email.eq(payload.email.as_str()))
        .one(&state.orm)
        .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;

    let user = UserActive {
        id: NotSet,
        name: Set(payload.name),
        email: Set(payload.email),
        phone: Set(payload.phone),
        password_hash: Set(password_hash),
        status: Set("active".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(user_id = user.id, "user registered");

    Ok(ApiResponse::success(
        "Registration successful",
        UserPublic {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let user = Users::find()
        .filter(UserCol::Email.eq(payload.email.as_str()))
        .one(&state.orm)
        .await?;

    // Same message for unknown email and wrong password.
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized("Invalid credentials".into())),
    };

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = issue_token(&state.config.jwt_secret, user.id, "user")?;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            user: UserPublic {
                id: user.id,
                name: user.name,
                email: user.email,
            },
        },
    ))
}

pub async fn login_admin(
    state: &AppState,
    payload: AdminLoginRequest,
) -> AppResult<ApiResponse<AdminLoginResponse>> {
    let admin = Admins::find()
        .filter(AdminCol::Email.eq(payload.email.as_str()))
        .one(&state.orm)
        .await?;

    let admin = match admin {
        Some(a) => a,
        None => return Err(AppError::Unauthorized("Invalid admin credentials".into())),
    };

    if !verify_password(&payload.password, &admin.password_hash) {
        return Err(AppError::Unauthorized("Invalid admin credentials".into()));
    }

    let token = issue_token(&state.config.jwt_secret, admin.id, &admin.role)?;

    Ok(ApiResponse::success(
        "Admin login successful",
        AdminLoginResponse { token },
    ))
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    use super::*;

    #[test]
    fn hash_is_never_the_plaintext_and_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        // Fresh salt per hash.
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("secret", "not-a-phc-string"));
    }

    #[test]
    fn token_round_trip_carries_subject_and_role() {
        let token = issue_token("test-secret", 42, "admin").unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, "42");
        assert_eq!(decoded.claims.role, "admin");
    }

    #[test]
    fn token_fails_with_wrong_secret() {
        let token = issue_token("test-secret", 1, "user").unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
