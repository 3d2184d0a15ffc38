use super::*;
use jsonwebtoken::{EncodingKey, Header, encode};

const JWT_SECRET: &str = "supersecretjwtsecretforunittesting123";

fn make_token(secret: &str, exp: usize) -> String {
    let claims = SupabaseClaims {
        sub: "123e4567-e89b-12d3-a456-426614174000".to_string(),
        aud: "authenticated".to_string(),
        role: "authenticated".to_string(),
        email: Some("test@example.com".to_string()),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[test]
fn test_validate_supabase_jwt_success() {
    let token = make_token(JWT_SECRET, 9999999999);

    let claims = validate_supabase_jwt(&token, JWT_SECRET).expect("Valid token should pass");
    assert_eq!(claims.sub, "123e4567-e89b-12d3-a456-426614174000");
    assert_eq!(claims.email, Some("test@example.com".to_string()));
}

#[test]
fn test_validate_supabase_jwt_expired() {
    let token = make_token(JWT_SECRET, 1);

    let result = validate_supabase_jwt(&token, JWT_SECRET);
    assert!(result.is_err());
}

#[test]
fn test_validate_supabase_jwt_invalid_signature() {
    let token = make_token("wrongsecret", 9999999999);

    let result = validate_supabase_jwt(&token, JWT_SECRET);
    assert!(result.is_err());
}

#[test]
fn test_access_token_from_cookie_header() {
    let header = "locale=en; sb-access-token=eyJ.token.value; other=1";
    assert_eq!(
        access_token_from_cookie_header(header),
        Some("eyJ.token.value".to_string())
    );

    assert_eq!(access_token_from_cookie_header("locale=en"), None);
}
