use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("missing token secret")]
    MissingSecret,
    #[error("invalid token expiry setting")]
    InvalidExpiry,
}

/// Access-token payload. The role claim lets the middleware authorize
/// without a store read on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub id: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn sign_access_token(
    id: &str,
    email: &str,
    role: &str,
    secret: &str,
    expires_in: &str,
) -> Result<String, TokenError> {
    let (iat, exp) = issue_window(expires_in)?;
    let claims = AccessClaims {
        id: id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iat,
        exp,
    };
    sign(&claims, secret)
}

pub fn sign_refresh_token(
    id: &str,
    email: &str,
    secret: &str,
    expires_in: &str,
) -> Result<String, TokenError> {
    let (iat, exp) = issue_window(expires_in)?;
    let claims = RefreshClaims {
        id: id.to_string(),
        email: email.to_string(),
        iat,
        exp,
    };
    sign(&claims, secret)
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessClaims, TokenError> {
    let claims: AccessClaims = verify(token, secret)?;
    check_expiry(claims.exp)?;
    Ok(claims)
}

pub fn verify_refresh_token(token: &str, secret: &str) -> Result<RefreshClaims, TokenError> {
    let claims: RefreshClaims = verify(token, secret)?;
    check_expiry(claims.exp)?;
    Ok(claims)
}

fn issue_window(expires_in: &str) -> Result<(i64, i64), TokenError> {
    let lifetime_ms = parse_expires_in_ms(expires_in)?;
    let iat = Utc::now().timestamp();
    let exp = Utc::now()
        .checked_add_signed(chrono::Duration::milliseconds(lifetime_ms))
        .ok_or(TokenError::InvalidExpiry)?
        .timestamp();
    Ok((iat, exp))
}

fn sign<C: Serialize>(claims: &C, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let header_json = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
    let header_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header_json).map_err(|_| TokenError::Invalid)?);
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).map_err(|_| TokenError::Invalid)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Invalid)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{sig_b64}"))
}

fn verify<C: for<'de> Deserialize<'de>>(token: &str, secret: &str) -> Result<C, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::Invalid)?;
    let payload_b64 = parts.next().ok_or(TokenError::Invalid)?;
    let sig_b64 = parts.next().ok_or(TokenError::Invalid)?;
    if parts.next().is_some() {
        return Err(TokenError::Invalid);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| TokenError::Invalid)?;
    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Invalid)?;
    let alg = header_json
        .get("alg")
        .and_then(|value| value.as_str())
        .ok_or(TokenError::Invalid)?;
    if alg != "HS256" {
        return Err(TokenError::Invalid);
    }

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| TokenError::Invalid)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Invalid)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes).map_err(|_| TokenError::Invalid)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| TokenError::Invalid)?;
    serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Invalid)
}

fn check_expiry(exp: i64) -> Result<(), TokenError> {
    if Utc::now().timestamp() >= exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, TokenError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 {
        return Err(TokenError::InvalidExpiry);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);
    let amount: i64 = digits.parse().map_err(|_| TokenError::InvalidExpiry)?;
    if amount <= 0 {
        return Err(TokenError::InvalidExpiry);
    }

    match unit {
        "s" => Ok(amount * 1000),
        "m" => Ok(amount * 60 * 1000),
        "h" => Ok(amount * 60 * 60 * 1000),
        "d" => Ok(amount * 24 * 60 * 60 * 1000),
        _ => Err(TokenError::InvalidExpiry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "test-secret";
    const OTHER_SECRET: &str = "other-secret";

    #[test]
    fn access_token_round_trip_preserves_identity() {
        let token =
            sign_access_token("user-1", "kid@example.com", "student", SECRET, "1h").unwrap();
        let claims = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.email, "kid@example.com");
        assert_eq!(claims.role, "student");
    }

    #[test]
    fn refresh_token_round_trip() {
        let token = sign_refresh_token("user-2", "t@example.com", SECRET, "7d").unwrap();
        let claims = verify_refresh_token(&token, SECRET).unwrap();
        assert_eq!(claims.id, "user-2");
        assert_eq!(claims.email, "t@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_refresh_token("user-3", "x@example.com", SECRET, "7d").unwrap();
        assert!(matches!(
            verify_refresh_token(&token, OTHER_SECRET),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn access_token_does_not_verify_as_refresh_with_other_secret() {
        let token = sign_access_token("u", "e@example.com", "teacher", SECRET, "1h").unwrap();
        assert!(verify_refresh_token(&token, OTHER_SECRET).is_err());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = sign_access_token("u", "e@example.com", "teacher", SECRET, "1h").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"id":"u","email":"e@example.com","role":"admin","iat":0,"exp":9999999999}"#);
        parts[1] = &forged;
        let tampered = parts.join(".");
        assert!(verify_access_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // 1s lifetime with an exp already in the past via manual claims
        let claims = AccessClaims {
            id: "u".into(),
            email: "e@example.com".into(),
            role: "student".into(),
            iat: 0,
            exp: 1,
        };
        let token = sign(&claims, SECRET).unwrap();
        assert!(matches!(
            verify_access_token(&token, SECRET),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn missing_secret_fails() {
        assert!(matches!(
            sign_access_token("u", "e", "student", "", "1h"),
            Err(TokenError::MissingSecret)
        ));
    }

    #[test]
    fn expiry_units() {
        assert_eq!(parse_expires_in_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_expires_in_ms("15m").unwrap(), 900_000);
        assert_eq!(parse_expires_in_ms("1h").unwrap(), 3_600_000);
        assert_eq!(parse_expires_in_ms("7d").unwrap(), 604_800_000);
        assert!(parse_expires_in_ms("7w").is_err());
        assert!(parse_expires_in_ms("h").is_err());
        assert!(parse_expires_in_ms("-1h").is_err());
        assert!(parse_expires_in_ms("").is_err());
    }

    proptest! {
        #[test]
        fn expiry_parse_never_panics(s in "\\PC{0,12}") {
            let _ = parse_expires_in_ms(&s);
        }

        #[test]
        fn positive_amounts_parse_for_known_units(amount in 1i64..10_000) {
            for unit in ["s", "m", "h", "d"] {
                let parsed = parse_expires_in_ms(&format!("{amount}{unit}")).unwrap();
                prop_assert!(parsed > 0);
            }
        }
    }
}
