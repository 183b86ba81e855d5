//! RSA key material
//!
//! Private keys are stored as PKCS8 PEM. Parsing also accepts the older
//! PKCS1 `RSA PRIVATE KEY` form.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::der::pem;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding, PrivateKeyInfo};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::AppError;

/// Default modulus size for account keys
pub const DEFAULT_KEY_BITS: usize = 2048;

const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";

/// Generate a new RSA private key as PKCS8 PEM.
///
/// CPU heavy; call from `spawn_blocking` in async contexts.
pub fn generate_private_key_pem(bits: usize) -> Result<String, AppError> {
    let mut rng = rand::thread_rng();
    let private_key =
        RsaPrivateKey::new(&mut rng, bits).map_err(|e| AppError::Internal(e.into()))?;
    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode private key: {}", e)))?;
    Ok(pem.to_string())
}

/// Decode an RSA private key from PKCS8 or PKCS1 PEM.
pub fn parse_private_key(private_key_pem: &str) -> Result<RsaPrivateKey, AppError> {
    let (label, der) = pem::decode_vec(private_key_pem.as_bytes())
        .map_err(|e| AppError::KeyParse(format!("failed to decode PEM: {}", e)))?;

    match label {
        PKCS8_LABEL => {
            let info = PrivateKeyInfo::try_from(der.as_slice())
                .map_err(|e| AppError::KeyParse(format!("failed to parse PKCS8: {}", e)))?;
            if info.algorithm.oid != rsa::pkcs1::ALGORITHM_OID {
                return Err(AppError::UnsupportedKeyType(format!(
                    "PKCS8 algorithm {}",
                    info.algorithm.oid
                )));
            }
            RsaPrivateKey::from_pkcs8_der(&der)
                .map_err(|e| AppError::KeyParse(format!("failed to parse RSA key: {}", e)))
        }
        PKCS1_LABEL => RsaPrivateKey::from_pkcs1_der(&der)
            .map_err(|e| AppError::KeyParse(format!("failed to parse PKCS1: {}", e))),
        other => Err(AppError::UnsupportedKeyType(format!("PEM label {}", other))),
    }
}

/// SPKI `PUBLIC KEY` PEM for the given private key PEM.
pub fn public_key_pem(private_key_pem: &str) -> Result<String, AppError> {
    let private_key = parse_private_key(private_key_pem)?;
    RsaPublicKey::from(&private_key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode public key: {}", e)))
}
