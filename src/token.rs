//! Token codec (§4.2): mints and verifies short-lived HMAC-signed bearer
//! tokens. AIMS is the issuer here, unlike the teacher's OIDC relying-party
//! verification of third-party tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims minted for an agent. `scopes` is a snapshot of the agent's
/// granted capability names at mint time — later grants/revokes do not
/// retroactively change a token already issued (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub scopes: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token encoding failed")]
    Encode,
    #[error("token verification failed")]
    Invalid,
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Parses the configured `JWT_ALGORITHM` (§6). Only HMAC variants are
/// supported — AIMS signs and verifies with the same shared secret, so
/// asymmetric algorithms have no counterpart here (asymmetric-key JWTs are
/// an explicit Non-goal, spec §1).
fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    match name {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Mints a bearer token for `agent_id` carrying `scopes`, expiring
/// `expiration_minutes` from now.
pub fn mint(
    secret: &str,
    algorithm: &str,
    agent_id: &str,
    scopes: &[String],
    expiration_minutes: i64,
) -> Result<(String, i64), TokenError> {
    let alg = parse_algorithm(algorithm)?;
    let now = chrono::Utc::now().timestamp();
    let exp = now + expiration_minutes * 60;
    let claims = Claims {
        sub: agent_id.to_string(),
        scopes: scopes.to_vec(),
        iat: now,
        exp,
    };
    let token = jsonwebtoken::encode(
        &Header::new(alg),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| TokenError::Encode)?;
    Ok((token, expiration_minutes * 60))
}

/// Verifies a bearer token's signature and expiry, returning its claims.
/// Fails if the signature is invalid, `exp` has passed, the token's
/// algorithm disagrees with `algorithm`, or the payload is malformed or
/// missing `sub` (§4.2).
pub fn verify(secret: &str, algorithm: &str, token: &str) -> Result<Claims, TokenError> {
    let alg = parse_algorithm(algorithm)?;
    let mut validation = Validation::new(alg);
    validation.validate_exp = true;
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| TokenError::Invalid)?;
    if data.claims.sub.is_empty() {
        return Err(TokenError::Invalid);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_then_verify_round_trips_claims() {
        // GIVEN: a minted token
        let scopes = vec!["agents:read".to_string()];
        let (token, expires_in) = mint("secret", "HS256", "agent-1", &scopes, 30).unwrap();
        assert_eq!(expires_in, 1800);

        // WHEN: it is verified with the same secret
        let claims = verify("secret", "HS256", &token).unwrap();

        // THEN: the claims match what was minted
        assert_eq!(claims.sub, "agent-1");
        assert_eq!(claims.scopes, scopes);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let (token, _) = mint("secret", "HS256", "agent-1", &[], 30).unwrap();
        assert!(verify("other-secret", "HS256", &token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(verify("secret", "HS256", "not-a-jwt").is_err());
    }

    #[test]
    fn verify_rejects_algorithm_mismatch() {
        let (token, _) = mint("secret", "HS256", "agent-1", &[], 30).unwrap();
        assert!(verify("secret", "HS384", &token).is_err());
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        assert!(mint("secret", "RS256", "agent-1", &[], 30).is_err());
    }
}
