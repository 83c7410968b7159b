use crate::auth::jwt_service::{JwtConfig, JwtError, JwtService};
use chrono::Duration;
use uuid::Uuid;

fn create_test_service(expiry: Duration) -> JwtService {
    JwtService::new(JwtConfig {
        secret_key: "test_secret_key_for_unit_testing_12345".to_string(),
        token_expiry: expiry,
    })
}

#[test]
fn test_generate_and_validate_round_trip() {
    let service = create_test_service(Duration::minutes(15));
    let user_id = Uuid::new_v4();

    let token = service.generate_token(user_id, "user@example.com").unwrap();
    assert!(!token.is_empty());

    let claims = service.validate_token(&token).unwrap();
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email, "user@example.com");
    assert!(claims.exp > claims.iat);
}

#[test]
fn test_expired_token_rejected() {
    let service = create_test_service(Duration::minutes(-5));
    let token = service
        .generate_token(Uuid::new_v4(), "user@example.com")
        .unwrap();

    match service.validate_token(&token) {
        Err(JwtError::TokenExpired) => {}
        other => panic!("expected TokenExpired, got {:?}", other.map(|c| c.sub)),
    }
}

#[test]
fn test_wrong_secret_rejected() {
    let service = create_test_service(Duration::minutes(15));
    let token = service
        .generate_token(Uuid::new_v4(), "user@example.com")
        .unwrap();

    let other = JwtService::new(JwtConfig {
        secret_key: "a_completely_different_secret".to_string(),
        token_expiry: Duration::minutes(15),
    });
    assert!(matches!(
        other.validate_token(&token),
        Err(JwtError::InvalidToken(_))
    ));
}

#[test]
fn test_garbage_token_rejected() {
    let service = create_test_service(Duration::minutes(15));
    assert!(matches!(
        service.validate_token("not.a.token"),
        Err(JwtError::InvalidToken(_))
    ));
}
