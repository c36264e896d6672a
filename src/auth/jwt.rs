use crate::config::JwtConfig;
use crate::error::{QuotagateError, Result};
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// JWT validator
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    /// Create a new JWT validator from configuration
    pub fn new(config: &JwtConfig) -> Result<Self> {
        let algorithm = Self::parse_algorithm(&config.algorithm)?;

        let decoding_key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config.secret.as_ref().ok_or_else(|| {
                    QuotagateError::Config(
                        "JWT secret is required for HS256/HS384/HS512 algorithms".to_string(),
                    )
                })?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                let public_key = config.public_key.as_ref().ok_or_else(|| {
                    QuotagateError::Config(
                        "JWT public key is required for RS256/RS384/RS512 algorithms".to_string(),
                    )
                })?;
                DecodingKey::from_rsa_pem(public_key.as_bytes())
                    .map_err(|e| QuotagateError::Config(format!("Invalid RSA public key: {}", e)))?
            }
            _ => {
                return Err(QuotagateError::Config(format!(
                    "Unsupported JWT algorithm: {}",
                    config.algorithm
                )))
            }
        };

        let mut validation = Validation::new(algorithm);

        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        // If issuer or audience are not specified, we don't validate them
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Verify the bearer token in the request headers and return its claims
    pub fn verify(&self, headers: &HeaderMap) -> Result<Claims> {
        let token = self.extract_token(headers)?;

        let token_data = decode::<Claims>(&token, &self.decoding_key, &self.validation)
            .map_err(|e| QuotagateError::InvalidToken(format!("Token validation failed: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Extract JWT token from Authorization header
    fn extract_token(&self, headers: &HeaderMap) -> Result<String> {
        let auth_header = headers
            .get("authorization")
            .or_else(|| headers.get("Authorization"))
            .ok_or(QuotagateError::MissingCredentials)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| QuotagateError::InvalidToken("Invalid authorization header".to_string()))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            Ok(token.to_string())
        } else if let Some(token) = auth_str.strip_prefix("bearer ") {
            Ok(token.to_string())
        } else {
            Err(QuotagateError::InvalidToken(
                "Authorization header must start with 'Bearer '".to_string(),
            ))
        }
    }

    /// Parse algorithm string to Algorithm enum
    fn parse_algorithm(algo: &str) -> Result<Algorithm> {
        match algo.to_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            _ => Err(QuotagateError::Config(format!(
                "Unsupported algorithm: {}",
                algo
            ))),
        }
    }
}
