//! HTTP Signatures for ActivityPub
//!
//! Implements signing and verification per:
//! https://docs.joinmastodon.org/spec/security/
//!
//! Outbound requests sign `(request-target) host date user-agent`, plus
//! `digest` when a body is present.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, Utc};
use rsa::pkcs1v15::{Signature as Pkcs1v15Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use super::keys::parse_private_key;
use crate::config::FederationConfig;
use crate::error::AppError;

/// Maximum clock skew accepted on the Date header when verifying
const MAX_DATE_SKEW_SECONDS: i64 = 300;

/// Upper bound on the `expires` window of outbound signatures
pub const MAX_SIGNATURE_EXPIRY_SECONDS: u64 = 86_400;

/// HTTP-date with a literal GMT suffix
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Supported signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "rsa-sha256")]
    RsaSha256,
    #[serde(rename = "rsa-sha512")]
    RsaSha512,
}

impl SignatureAlgorithm {
    /// Name used in the `algorithm` parameter
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::RsaSha256 => "rsa-sha256",
            SignatureAlgorithm::RsaSha512 => "rsa-sha512",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "rsa-sha256" => Some(SignatureAlgorithm::RsaSha256),
            "rsa-sha512" => Some(SignatureAlgorithm::RsaSha512),
            _ => None,
        }
    }

    fn sign(&self, key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, rsa::signature::Error> {
        let signature = match self {
            SignatureAlgorithm::RsaSha256 => {
                SigningKey::<Sha256>::new(key.clone()).try_sign(message)?
            }
            SignatureAlgorithm::RsaSha512 => {
                SigningKey::<Sha512>::new(key.clone()).try_sign(message)?
            }
        };
        Ok(signature.to_vec())
    }

    fn verify(
        &self,
        key: RsaPublicKey,
        message: &[u8],
        signature: &Pkcs1v15Signature,
    ) -> Result<(), rsa::signature::Error> {
        match self {
            SignatureAlgorithm::RsaSha256 => {
                VerifyingKey::<Sha256>::new(key).verify(message, signature)
            }
            SignatureAlgorithm::RsaSha512 => {
                VerifyingKey::<Sha512>::new(key).verify(message, signature)
            }
        }
    }
}

/// Headers to add for signed request
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// Date header value
    pub date: String,
    /// Host header value (authority, with port when explicit)
    pub host: String,
    pub user_agent: String,
    /// Digest header value (if body present)
    pub digest: Option<String>,
    /// Signature header value
    pub signature: String,
    /// Algorithm that produced the signature
    pub algorithm: SignatureAlgorithm,
}

impl SignedHeaders {
    /// Render as an `http::HeaderMap` ready to attach to a request.
    pub fn to_header_map(&self) -> Result<http::HeaderMap, AppError> {
        use http::header::{DATE, HOST, HeaderName, HeaderValue, USER_AGENT};

        fn value(v: &str) -> Result<HeaderValue, AppError> {
            HeaderValue::from_str(v)
                .map_err(|e| AppError::Signature(format!("invalid header value: {}", e)))
        }

        let mut headers = http::HeaderMap::new();
        headers.insert(DATE, value(&self.date)?);
        headers.insert(HOST, value(&self.host)?);
        headers.insert(USER_AGENT, value(&self.user_agent)?);
        if let Some(digest) = &self.digest {
            headers.insert(HeaderName::from_static("digest"), value(digest)?);
        }
        headers.insert(
            HeaderName::from_static("signature"),
            value(&self.signature)?,
        );
        Ok(headers)
    }
}

/// Signs outbound requests on behalf of local actors.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    software_name: String,
    algorithms: Vec<SignatureAlgorithm>,
    expiry: Duration,
}

impl RequestSigner {
    pub fn new(
        software_name: impl Into<String>,
        algorithms: Vec<SignatureAlgorithm>,
        expiry_seconds: u64,
    ) -> Self {
        Self {
            software_name: software_name.into(),
            algorithms,
            expiry: Duration::seconds(expiry_seconds.min(MAX_SIGNATURE_EXPIRY_SECONDS) as i64),
        }
    }

    pub fn from_config(config: &FederationConfig) -> Self {
        Self::new(
            config.software_name.clone(),
            config.signature_algorithms.clone(),
            config.signature_expiry_seconds,
        )
    }

    /// Sign an HTTP request
    ///
    /// # Arguments
    /// * `method` - HTTP method (e.g., "POST")
    /// * `url` - Full URL being requested
    /// * `body` - Request body (for digest)
    /// * `private_key_pem` - RSA private key in PEM format
    /// * `key_id` - URL of the signing actor's main key
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        private_key_pem: &str,
        key_id: &str,
    ) -> Result<SignedHeaders, AppError> {
        self.sign_at(method, url, body, private_key_pem, key_id, Utc::now())
    }

    /// Same as [`RequestSigner::sign`] with an explicit signing time.
    pub fn sign_at(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
        private_key_pem: &str,
        key_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, AppError> {
        let parsed_url = url::Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL {}: {}", url, e)))?;

        let host = parsed_url
            .host_str()
            .ok_or_else(|| AppError::Validation(format!("Missing host in URL: {}", url)))?;
        let host = match parsed_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let path_and_query = match parsed_url.query() {
            Some(q) => format!("{}?{}", parsed_url.path(), q),
            None => parsed_url.path().to_string(),
        };

        let date = now.format(HTTP_DATE_FORMAT).to_string();
        let digest = body.map(generate_digest);

        let mut signing_parts = vec![
            format!(
                "(request-target): {} {}",
                method.to_lowercase(),
                path_and_query
            ),
            format!("host: {}", host),
            format!("date: {}", date),
            format!("user-agent: {}", self.software_name),
        ];
        let mut headers_list = vec!["(request-target)", "host", "date", "user-agent"];

        if let Some(digest_value) = &digest {
            signing_parts.push(format!("digest: {}", digest_value));
            headers_list.push("digest");
        }

        let signing_string = signing_parts.join("\n");
        let private_key = parse_private_key(private_key_pem)?;

        let created = now.timestamp();
        let expires = now
            .checked_add_signed(self.expiry)
            .ok_or_else(|| AppError::Signature("signature expiry out of range".to_string()))?
            .timestamp();

        let mut last_error = None;
        for algorithm in &self.algorithms {
            match algorithm.sign(&private_key, signing_string.as_bytes()) {
                Ok(signature) => {
                    let signature_header = format!(
                        "keyId=\"{}\",algorithm=\"{}\",created={},expires={},headers=\"{}\",signature=\"{}\"",
                        key_id,
                        algorithm.name(),
                        created,
                        expires,
                        headers_list.join(" "),
                        BASE64.encode(signature)
                    );

                    return Ok(SignedHeaders {
                        date,
                        host,
                        user_agent: self.software_name.clone(),
                        digest,
                        signature: signature_header,
                        algorithm: *algorithm,
                    });
                }
                Err(error) => {
                    tracing::debug!(algorithm = algorithm.name(), %error, "Signing attempt failed");
                    last_error = Some(error.to_string());
                }
            }
        }

        Err(AppError::Signature(format!(
            "no signature algorithm succeeded: {}",
            last_error.unwrap_or_else(|| "no algorithms configured".to_string())
        )))
    }
}

/// Verify an HTTP request signature
///
/// # Arguments
/// * `method` - HTTP method
/// * `path` - Request path (with query)
/// * `headers` - All request headers
/// * `body` - Request body (for digest verification)
/// * `public_key_pem` - RSA public key in PEM format
/// * `now` - Reference time for expiry and Date skew checks
pub fn verify_signature(
    method: &str,
    path: &str,
    headers: &http::HeaderMap,
    body: Option<&[u8]>,
    public_key_pem: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let signature_header = header_str(headers, "signature")?;
    let parsed = parse_signature_header(signature_header)?;

    let algorithm = SignatureAlgorithm::from_name(&parsed.algorithm).ok_or_else(|| {
        AppError::Validation(format!(
            "Unsupported signature algorithm: {}",
            parsed.algorithm
        ))
    })?;

    for required in ["(request-target)", "host", "date"] {
        if !parsed.headers.iter().any(|h| h == required) {
            return Err(AppError::Validation(format!(
                "Signed headers must include: {}",
                required
            )));
        }
    }

    if body.is_some() && !parsed.headers.iter().any(|h| h == "digest") {
        return Err(AppError::Validation(
            "Signed headers must include: digest".to_string(),
        ));
    }

    if let Some(expires) = parsed.expires {
        if now.timestamp() > expires {
            return Err(AppError::Validation("Signature expired".to_string()));
        }
    }

    let date = DateTime::parse_from_rfc2822(header_str(headers, "date")?)
        .map_err(|_| AppError::Validation("Invalid Date format".to_string()))?;
    if (now.timestamp() - date.timestamp()).abs() > MAX_DATE_SKEW_SECONDS {
        return Err(AppError::Validation(
            "Date header too old or in future".to_string(),
        ));
    }

    if let Some(body_data) = body {
        if header_str(headers, "digest")? != generate_digest(body_data) {
            return Err(AppError::Validation("Digest mismatch".to_string()));
        }
    }

    let mut signing_parts = Vec::with_capacity(parsed.headers.len());
    for header_name in &parsed.headers {
        let value = match header_name.as_str() {
            "(request-target)" => format!("{} {}", method.to_lowercase(), path),
            name => header_str(headers, name)?.to_string(),
        };
        signing_parts.push(format!("{}: {}", header_name, value));
    }
    let signing_string = signing_parts.join("\n");

    let signature_bytes = BASE64
        .decode(&parsed.signature)
        .map_err(|_| AppError::Validation("Invalid signature encoding".to_string()))?;
    let signature = Pkcs1v15Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| AppError::Validation(format!("Invalid signature format: {}", e)))?;
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| AppError::KeyParse(format!("Invalid public key: {}", e)))?;

    algorithm
        .verify(public_key, signing_string.as_bytes(), &signature)
        .map_err(|_| AppError::Validation("Signature verification failed".to_string()))
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::Validation(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Validation(format!("Invalid {} header", name)))
}

/// Parsed Signature header
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    /// Key ID (URL to public key)
    pub key_id: String,
    pub algorithm: String,
    pub created: Option<i64>,
    pub expires: Option<i64>,
    /// Signed header names
    pub headers: Vec<String>,
    /// Base64-encoded signature
    pub signature: String,
}

/// Parse Signature header value
///
/// # Format
/// ```text
/// keyId="...",algorithm="...",created=...,expires=...,headers="...",signature="..."
/// ```
pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, AppError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut created = None;
    let mut expires = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');

        let timestamp = || {
            value
                .parse::<i64>()
                .map_err(|_| AppError::Validation(format!("Invalid {} value", key.trim())))
        };

        match key.trim() {
            "keyId" => key_id = Some(value.to_string()),
            "algorithm" => algorithm = Some(value.to_string()),
            "created" => created = Some(timestamp()?),
            "expires" => expires = Some(timestamp()?),
            "headers" => {
                headers = Some(
                    value
                        .split_whitespace()
                        .map(|s| s.to_ascii_lowercase())
                        .collect(),
                )
            }
            "signature" => signature = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or_else(|| AppError::Validation("Missing keyId".to_string()))?,
        algorithm: algorithm
            .ok_or_else(|| AppError::Validation("Missing algorithm".to_string()))?,
        created,
        expires,
        headers: headers.ok_or_else(|| AppError::Validation("Missing headers".to_string()))?,
        signature: signature
            .ok_or_else(|| AppError::Validation("Missing signature".to_string()))?,
    })
}

/// Generate SHA-256 digest for body
///
/// # Returns
/// `SHA-256=base64(hash)`
pub fn generate_digest(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("SHA-256={}", BASE64.encode(hash))
}
