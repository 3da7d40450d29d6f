//! # Session Credentials
//!
//! A short-lived credential proving that the holder of an address's key
//! authorized an ephemeral session key for one domain and a bounded TTL.
//!
//! ## Typestate
//!
//! ```text
//! SessionCredential<Unsigned> ──sign(wallet)──▶ SessionCredential<Signed>
//! ```
//!
//! Only a `SessionCredential<Signed>` can be exported, validated or used
//! to sign decryption artifacts. An unsigned credential cannot be
//! presented and a signed one cannot be signed again.
//!
//! ## Challenge
//!
//! The wallet signs the canonical JSON of
//! `{address, created_at, domain, session_public_key, ttl_min}`. A
//! credential validates at time `now` only if the signature verifies,
//! the signer's key derives to `address`, `domain` matches,
//! `created_at` is not ahead of `now` by more than the tolerated clock
//! skew, and `now < created_at + ttl_min * 60_000`.

use std::marker::PhantomData;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use vaultgate_access::{status_at, GrantIssuer, GrantStatus};
use vaultgate_core::{Address, CanonicalBytes, EpochMillis};
use vaultgate_crypto::{derive_address, verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use vaultgate_ledger::Ledger;
use zeroize::Zeroize;

use crate::error::GateError;

/// Longest session a wallet may authorize, in minutes.
pub const MAX_SESSION_TTL_MIN: u64 = 30;

/// How far a credential's creation time may run ahead of ledger time.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

mod private {
    pub trait Sealed {}
}

/// Marker trait for credential states.
pub trait CredentialState: private::Sealed + Send + Sync + 'static {
    /// State name for logs.
    fn name() -> &'static str;
}

/// Created, session key generated, not yet authorized by the wallet.
#[derive(Debug)]
pub struct Unsigned;

/// Authorized by the wallet; presentable.
#[derive(Debug)]
pub struct Signed;

impl private::Sealed for Unsigned {}
impl private::Sealed for Signed {}

impl CredentialState for Unsigned {
    fn name() -> &'static str {
        "UNSIGNED"
    }
}

impl CredentialState for Signed {
    fn name() -> &'static str {
        "SIGNED"
    }
}

#[derive(Debug, Clone, Copy)]
struct Proof {
    signer: Ed25519PublicKey,
    signature: Ed25519Signature,
}

/// A session credential in state `S`.
pub struct SessionCredential<S: CredentialState> {
    address: Address,
    domain: String,
    created_at: EpochMillis,
    ttl_min: u64,
    session_key: Ed25519KeyPair,
    proof: Option<Proof>,
    _state: PhantomData<S>,
}

#[derive(Serialize)]
struct Challenge<'a> {
    address: &'a Address,
    created_at: EpochMillis,
    domain: &'a str,
    session_public_key: Ed25519PublicKey,
    ttl_min: u64,
}

impl<S: CredentialState> SessionCredential<S> {
    /// Address the credential speaks for.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Domain-separation context.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Creation time.
    pub fn created_at(&self) -> EpochMillis {
        self.created_at
    }

    /// Lifetime in minutes.
    pub fn ttl_min(&self) -> u64 {
        self.ttl_min
    }

    /// First instant at which the credential is no longer valid.
    pub fn expires_at(&self) -> EpochMillis {
        self.created_at.saturating_add_minutes(self.ttl_min)
    }

    /// Whether the credential has lapsed at `now`.
    pub fn is_expired(&self, now: EpochMillis) -> bool {
        now >= self.expires_at()
    }

    /// Public half of the ephemeral session key.
    pub fn session_public_key(&self) -> Ed25519PublicKey {
        self.session_key.public_key()
    }

    /// Current state name.
    pub fn state_name(&self) -> &'static str {
        S::name()
    }

    /// Canonical bytes the wallet signs.
    pub fn challenge(&self) -> Result<CanonicalBytes, GateError> {
        Ok(CanonicalBytes::new(&Challenge {
            address: &self.address,
            created_at: self.created_at,
            domain: &self.domain,
            session_public_key: self.session_key.public_key(),
            ttl_min: self.ttl_min,
        })?)
    }

    fn check_proof(&self, proof: &Proof) -> Result<(), GateError> {
        if derive_address(&proof.signer) != self.address {
            return Err(GateError::InvalidCredential(format!(
                "signer key does not derive to {}",
                self.address
            )));
        }
        verify(&self.challenge()?, &proof.signature, &proof.signer)
            .map_err(|e| GateError::InvalidCredential(e.to_string()))
    }
}

impl SessionCredential<Unsigned> {
    /// Start a credential for `address` with a fresh session key.
    ///
    /// # Errors
    ///
    /// [`GateError::Validation`] if `ttl_min` is outside `1..=30` or the
    /// domain is empty.
    pub fn new(
        address: Address,
        domain: impl Into<String>,
        ttl_min: u64,
        created_at: EpochMillis,
    ) -> Result<Self, GateError> {
        Self::with_session_key(address, domain, ttl_min, created_at, Ed25519KeyPair::generate())
    }

    /// Start a credential with a caller-supplied session key.
    pub fn with_session_key(
        address: Address,
        domain: impl Into<String>,
        ttl_min: u64,
        created_at: EpochMillis,
        session_key: Ed25519KeyPair,
    ) -> Result<Self, GateError> {
        let domain = domain.into();
        if domain.trim().is_empty() {
            return Err(GateError::Validation("credential domain must not be empty".into()));
        }
        if !(1..=MAX_SESSION_TTL_MIN).contains(&ttl_min) {
            return Err(GateError::Validation(format!(
                "session TTL must be between 1 and {MAX_SESSION_TTL_MIN} minutes, got {ttl_min}"
            )));
        }
        Ok(Self {
            address,
            domain,
            created_at,
            ttl_min,
            session_key,
            proof: None,
            _state: PhantomData,
        })
    }

    /// Sign the challenge with the address's own key.
    pub fn sign(self, wallet: &Ed25519KeyPair) -> Result<SessionCredential<Signed>, GateError> {
        let signature = wallet.sign(&self.challenge()?);
        self.attach_signature(wallet.public_key(), signature)
    }

    /// Attach a signature produced elsewhere (e.g. a hardware wallet).
    ///
    /// The signature is verified before the state transition.
    pub fn attach_signature(
        self,
        signer: Ed25519PublicKey,
        signature: Ed25519Signature,
    ) -> Result<SessionCredential<Signed>, GateError> {
        let proof = Proof { signer, signature };
        self.check_proof(&proof)?;
        Ok(SessionCredential {
            address: self.address,
            domain: self.domain,
            created_at: self.created_at,
            ttl_min: self.ttl_min,
            session_key: self.session_key,
            proof: Some(proof),
            _state: PhantomData,
        })
    }
}

impl SessionCredential<Signed> {
    fn proof(&self) -> Result<&Proof, GateError> {
        self.proof
            .as_ref()
            .ok_or_else(|| GateError::Internal("signed credential without proof".into()))
    }

    /// The wallet key that signed the challenge.
    pub fn signer(&self) -> Result<Ed25519PublicKey, GateError> {
        Ok(self.proof()?.signer)
    }

    /// Check the wallet signature and that its key derives to the address.
    ///
    /// Ignores domain and expiry.
    pub fn verify_proof(&self) -> Result<(), GateError> {
        self.check_proof(self.proof()?)
    }

    /// Check signature, address binding, domain and expiry at `now`,
    /// tolerating [`DEFAULT_CLOCK_SKEW`].
    pub fn validate(&self, domain: &str, now: EpochMillis) -> Result<(), GateError> {
        self.validate_with_skew(domain, now, DEFAULT_CLOCK_SKEW)
    }

    /// [`validate`](Self::validate) with an explicit skew allowance.
    ///
    /// A credential created more than `max_skew` after `now` is refused:
    /// its validity window would otherwise extend past `now + ttl`.
    pub fn validate_with_skew(&self, domain: &str, now: EpochMillis, max_skew: Duration) -> Result<(), GateError> {
        if self.domain != domain {
            return Err(GateError::InvalidCredential(format!(
                "credential is bound to domain {:?}",
                self.domain
            )));
        }
        let skew_ms = u64::try_from(max_skew.as_millis()).unwrap_or(u64::MAX);
        if self.created_at.as_millis() > now.as_millis().saturating_add(skew_ms) {
            return Err(GateError::InvalidCredential(format!(
                "credential created at {} is ahead of ledger time {now}",
                self.created_at
            )));
        }
        if self.is_expired(now) {
            return Err(GateError::InvalidCredential(format!(
                "credential expired at {}",
                self.expires_at()
            )));
        }
        self.check_proof(self.proof()?)
    }

    /// Sign artifact bytes with the session key.
    pub(crate) fn sign_with_session_key(&self, data: &CanonicalBytes) -> Ed25519Signature {
        self.session_key.sign(data)
    }

    /// Export as a base64url JSON access token.
    ///
    /// The token carries the session private key; it is a bearer secret.
    pub fn to_access_token(&self) -> Result<String, GateError> {
        let proof = self.proof()?;
        let seed = self.session_key.seed_hex();
        let exported = ExportedCredential {
            address: self.address.clone(),
            domain: self.domain.clone(),
            created_at: self.created_at,
            ttl_min: self.ttl_min,
            session_key: seed.to_string(),
            signer: proof.signer,
            signature: proof.signature,
        };
        let json = serde_json::to_vec(&exported).map_err(|e| GateError::Internal(e.to_string()));
        drop(exported);
        Ok(URL_SAFE_NO_PAD.encode(json?))
    }

    /// Import an access token, verifying its signature and address binding.
    ///
    /// Expiry and domain are checked by [`validate`](Self::validate) at use.
    pub fn from_access_token(token: &str) -> Result<Self, GateError> {
        let malformed = |what: &str| GateError::InvalidCredential(format!("malformed access token: {what}"));
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| malformed("not base64url"))?;
        let exported: ExportedCredential =
            serde_json::from_slice(&raw).map_err(|_| malformed("unexpected shape"))?;
        let session_key = Ed25519KeyPair::from_seed_hex(&exported.session_key)
            .map_err(|_| malformed("session key"))?;
        let unsigned = SessionCredential::<Unsigned>::with_session_key(
            exported.address.clone(),
            exported.domain.clone(),
            exported.ttl_min,
            exported.created_at,
            session_key,
        )
        .map_err(|e| GateError::InvalidCredential(e.to_string()))?;
        unsigned.attach_signature(exported.signer, exported.signature)
    }
}

impl<S: CredentialState> std::fmt::Debug for SessionCredential<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("state", &S::name())
            .field("address", &self.address)
            .field("domain", &self.domain)
            .field("created_at", &self.created_at)
            .field("ttl_min", &self.ttl_min)
            .field("session_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ExportedCredential {
    address: Address,
    domain: String,
    created_at: EpochMillis,
    ttl_min: u64,
    session_key: String,
    signer: Ed25519PublicKey,
    signature: Ed25519Signature,
}

impl Drop for ExportedCredential {
    fn drop(&mut self) {
        self.session_key.zeroize();
    }
}

/// Exchange a bearer token for a session credential.
///
/// The grant named by `bearer_token` must be active at ledger time and
/// `wallet` must control the grant's `owner_address`. The bearer token
/// alone never authorizes decryption.
pub async fn exchange_for_session_credential(
    grants: &GrantIssuer,
    ledger: &dyn Ledger,
    bearer_token: &str,
    wallet: &Ed25519KeyPair,
    ttl_min: u64,
    domain: &str,
) -> Result<SessionCredential<Signed>, GateError> {
    let grant = grants
        .find_grant_by_token(bearer_token)
        .await?
        .ok_or_else(|| GateError::InvalidCredential("unknown bearer token".into()))?;
    let now = ledger.now().await?;
    if status_at(&grant, now) != GrantStatus::Active {
        tracing::warn!(grant = %grant.id, "bearer token presented for expired grant");
        return Err(GateError::InvalidCredential(format!("grant {} has expired", grant.id)));
    }
    if derive_address(&wallet.public_key()) != grant.owner_address {
        return Err(GateError::InvalidCredential(format!(
            "wallet does not control grant recipient {}",
            grant.owner_address
        )));
    }
    SessionCredential::new(grant.owner_address.clone(), domain, ttl_min, now)?.sign(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "vaultgate/test";
    const T0: u64 = 1_768_478_400_000;

    fn wallet() -> (Ed25519KeyPair, Address) {
        let kp = Ed25519KeyPair::from_seed(&[3u8; 32]);
        let addr = derive_address(&kp.public_key());
        (kp, addr)
    }

    fn signed(ttl: u64) -> SessionCredential<Signed> {
        let (kp, addr) = wallet();
        SessionCredential::new(addr, DOMAIN, ttl, EpochMillis::new(T0))
            .unwrap()
            .sign(&kp)
            .unwrap()
    }

    #[test]
    fn signed_credential_validates_within_ttl() {
        let cred = signed(10);
        assert_eq!(cred.state_name(), "SIGNED");
        cred.validate(DOMAIN, EpochMillis::new(T0)).unwrap();
        cred.validate(DOMAIN, EpochMillis::new(T0 + 10 * 60_000 - 1)).unwrap();
    }

    #[test]
    fn credential_expires_at_ttl_boundary() {
        let cred = signed(10);
        let err = cred.validate(DOMAIN, EpochMillis::new(T0 + 10 * 60_000)).unwrap_err();
        assert!(matches!(err, GateError::InvalidCredential(_)));
    }

    #[test]
    fn future_dated_credential_rejected_beyond_skew() {
        let cred = signed(30);
        let a_year_early = EpochMillis::new(T0 - 365 * 24 * 60 * 60_000);
        let err = cred.validate(DOMAIN, a_year_early).unwrap_err();
        assert!(matches!(err, GateError::InvalidCredential(_)));

        let within_skew = EpochMillis::new(T0 - 30_000);
        cred.validate(DOMAIN, within_skew).unwrap();
        assert!(cred.validate_with_skew(DOMAIN, within_skew, Duration::ZERO).is_err());
        cred.validate_with_skew(DOMAIN, EpochMillis::new(T0), Duration::ZERO).unwrap();
    }

    #[test]
    fn wrong_domain_rejected() {
        let cred = signed(10);
        assert!(cred.validate("other/v1", EpochMillis::new(T0)).is_err());
    }

    #[test]
    fn signing_with_foreign_wallet_rejected() {
        let (_, addr) = wallet();
        let stranger = Ed25519KeyPair::from_seed(&[4u8; 32]);
        let err = SessionCredential::new(addr, DOMAIN, 5, EpochMillis::new(T0))
            .unwrap()
            .sign(&stranger)
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidCredential(_)));
    }

    #[test]
    fn ttl_bounds_enforced() {
        let (_, addr) = wallet();
        assert!(SessionCredential::new(addr.clone(), DOMAIN, 0, EpochMillis::new(T0)).is_err());
        assert!(SessionCredential::new(addr.clone(), DOMAIN, 31, EpochMillis::new(T0)).is_err());
        assert!(SessionCredential::new(addr, "  ", 5, EpochMillis::new(T0)).is_err());
    }

    #[test]
    fn access_token_roundtrip_preserves_binding() {
        let cred = signed(15);
        let token = cred.to_access_token().unwrap();
        let back = SessionCredential::<Signed>::from_access_token(&token).unwrap();
        assert_eq!(back.address(), cred.address());
        assert_eq!(back.session_public_key(), cred.session_public_key());
        assert_eq!(back.expires_at(), cred.expires_at());
        back.validate(DOMAIN, EpochMillis::new(T0 + 1)).unwrap();
    }

    #[test]
    fn tampered_access_token_rejected() {
        let cred = signed(15);
        let token = cred.to_access_token().unwrap();
        let mut json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        json["ttlMin"] = serde_json::json!(30);
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json).unwrap());
        assert!(SessionCredential::<Signed>::from_access_token(&forged).is_err());
        assert!(SessionCredential::<Signed>::from_access_token("!!!").is_err());
    }

    #[test]
    fn debug_redacts_session_key() {
        let cred = signed(5);
        let debug = format!("{cred:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(cred.session_key.seed_hex().as_str()));
    }
}
