//! Bearer credential resolution.
//!
//! A credential is either a provider-signed identity token or a synthetic
//! service-actor token of the form `npc-<actorId>-<actingUserId>`.

use crate::global;
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct IdClaims {
    sub: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpcToken {
    pub actor_id: String,
    pub acting_user_id: String,
}

/// Parses `npc-<actorId>-<actingUserId>`. The actor id carries no dashes;
/// everything after its separator belongs to the acting user id.
pub fn parse_npc_token(raw: &str) -> Option<NpcToken> {
    let rest = raw.strip_prefix("npc-")?;
    let (actor_id, acting_user_id) = rest.split_once('-')?;
    if actor_id.is_empty() || acting_user_id.is_empty() {
        return None;
    }
    Some(NpcToken {
        actor_id: actor_id.to_owned(),
        acting_user_id: acting_user_id.to_owned(),
    })
}

/// Resolves a signed identity-provider token to a stable caller id.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<String>;
}

/// Cryptographic verification against the provider's published key.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_pem(pem: &[u8], project_id: &str) -> anyhow::Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id]);
        Ok(Self { key, validation })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<String> {
        let data = decode::<IdClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims.sub)
    }
}

/// Emulator mode: tokens are unsigned, so only the payload is decoded.
pub struct EmulatorVerifier;

#[async_trait]
impl IdentityVerifier for EmulatorVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<String> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("malformed identity token"))?;
        let raw = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)?;
        let claims: serde_json::Value = serde_json::from_slice(&raw)?;
        claims
            .get("sub")
            .or_else(|| claims.get("user_id"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("identity token missing subject"))
    }
}

/// Picks the verifier from process configuration. Panics on missing or
/// unusable key material, which is a deployment error.
pub fn verifier_from_env() -> Arc<dyn IdentityVerifier> {
    if global::get_auth_emulator_host().is_some() {
        log::warn!("AUTH_EMULATOR_HOST set, identity tokens will NOT be verified");
        return Arc::new(EmulatorVerifier);
    }
    let pem = global::get_identity_jwt_pubkey()
        .as_ref()
        .expect("IDENTITY_JWT_PUBKEY missing from .env (hint: provider RS256 public key, PEM)");
    let verifier = JwtVerifier::from_pem(pem.as_bytes(), global::get_identity_project_id())
        .expect("IDENTITY_JWT_PUBKEY could not be parsed as an RSA PEM");
    Arc::new(verifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_npc_token() {
        let tok = parse_npc_token("npc-robot1-user-abc").unwrap();
        assert_eq!(tok.actor_id, "robot1");
        assert_eq!(tok.acting_user_id, "user-abc");

        assert!(parse_npc_token("npc-robot1-").is_none());
        assert!(parse_npc_token("npc--useronly").is_none());
        assert!(parse_npc_token("npc-nodelimiter").is_none());
        assert!(parse_npc_token("bearer-robot1-user").is_none());
    }

    #[actix_rt::test]
    async fn test_emulator_decode() {
        let payload =
            base64::encode_config(br#"{"sub":"emu-user-7"}"#, base64::URL_SAFE_NO_PAD);
        let token = format!("eyJhbGciOiJub25lIn0.{}.", payload);
        let uid = EmulatorVerifier.verify(&token).await.unwrap();
        assert_eq!(uid, "emu-user-7");
    }

    #[actix_rt::test]
    async fn test_emulator_rejects_garbage() {
        assert!(EmulatorVerifier.verify("not-a-token").await.is_err());
        assert!(EmulatorVerifier.verify("a.!!!.c").await.is_err());
        let empty = base64::encode_config(b"{}", base64::URL_SAFE_NO_PAD);
        assert!(EmulatorVerifier
            .verify(&format!("h.{}.s", empty))
            .await
            .is_err());
    }
}
