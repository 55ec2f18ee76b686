//! HMAC JWT parsing
//!
//! Tokens issued by the shared auth service are HMAC-signed with a secret
//! known to every consumer. Only the HMAC family is accepted: a token whose
//! header advertises any other algorithm is rejected before the signature is
//! checked, so a public key can never be confused for the shared secret.

use std::collections::HashSet;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use crate::error::CoreError;

/// Decoded claims, kept as a free-form JSON object.
pub type Claims = serde_json::Map<String, serde_json::Value>;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Verify `token` with `secret_key` and return its claims.
///
/// `exp`, `nbf` and `iat` are enforced when present but not required.
pub fn parse(token: &str, secret_key: &str) -> Result<Claims, CoreError> {
    let header = decode_header(token)?;
    if !HMAC_ALGORITHMS.contains(&header.alg) {
        return Err(CoreError::UnexpectedSigningMethod(format!("{:?}", header.alg)));
    }

    let mut validation = Validation::new(header.alg);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.required_spec_claims = HashSet::new();
    validation.leeway = 0;
    validation.validate_nbf = true;
    validation.validate_aud = false;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret_key.as_bytes()),
        &validation,
    )?;

    // jsonwebtoken leaves `iat` alone
    let now = jsonwebtoken::get_current_timestamp() as f64;
    if let Some(iat) = data.claims.get("iat").and_then(|v| v.as_f64()) {
        if iat > now {
            return Err(CoreError::UsedBeforeIssued);
        }
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret-key-min-32-characters-long";

    fn sign(alg: Algorithm, claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(alg),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign test token")
    }

    #[test]
    fn test_parse_returns_claims() {
        let token = sign(
            Algorithm::HS256,
            json!({"sub": "user-1", "org": "acme", "admin": true}),
            SECRET,
        );
        let claims = parse(&token, SECRET).expect("valid token");
        assert_eq!(claims["sub"], "user-1");
        assert_eq!(claims["org"], "acme");
        assert_eq!(claims["admin"], true);
    }

    #[test]
    fn test_parse_accepts_hs512() {
        let token = sign(Algorithm::HS512, json!({"sub": "user-2"}), SECRET);
        assert_eq!(parse(&token, SECRET).expect("valid token")["sub"], "user-2");
    }

    #[test]
    fn test_parse_rejects_wrong_secret() {
        let token = sign(Algorithm::HS256, json!({"sub": "user-1"}), SECRET);
        let err = parse(&token, "another-secret").unwrap_err();
        assert!(matches!(err, CoreError::InvalidToken(_)));
    }

    #[test]
    fn test_parse_rejects_non_hmac_algorithm() {
        // {"alg":"RS256","typ":"JWT"}.{"sub":"1234567890"}.sig
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiIxMjM0NTY3ODkwIn0.c2ln";
        let err = parse(token, SECRET).unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedSigningMethod(ref alg) if alg == "RS256"));
    }

    #[test]
    fn test_parse_rejects_expired_token() {
        let exp = chrono::Utc::now().timestamp() - 120;
        let token = sign(Algorithm::HS256, json!({"sub": "user-1", "exp": exp}), SECRET);
        assert!(matches!(
            parse(&token, SECRET),
            Err(CoreError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_parse_accepts_future_expiry() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(Algorithm::HS256, json!({"sub": "user-1", "exp": exp}), SECRET);
        assert!(parse(&token, SECRET).is_ok());
    }

    #[test]
    fn test_parse_rejects_future_iat() {
        let iat = chrono::Utc::now().timestamp() + 3600;
        let token = sign(Algorithm::HS256, json!({"sub": "user-1", "iat": iat}), SECRET);
        assert!(matches!(parse(&token, SECRET), Err(CoreError::UsedBeforeIssued)));
    }

    #[test]
    fn test_parse_accepts_past_iat() {
        let iat = chrono::Utc::now().timestamp() - 60;
        let token = sign(Algorithm::HS256, json!({"sub": "user-1", "iat": iat}), SECRET);
        assert_eq!(parse(&token, SECRET).expect("valid token")["iat"], iat);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("not.a.token", SECRET).is_err());
    }
}
