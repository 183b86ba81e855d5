//! Signed HTTP client for talking to remote servers
//!
//! One shared `reqwest::Client` (connection pool, user agent, deadline) plus
//! the request signer. Every call is recorded in the federation metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::activity::{ACTIVITY_JSON, ActorDocument, MainKeyDocument, PublicKeyDocument};
use super::signature::RequestSigner;
use super::urls::UrlResolver;
use super::webfinger::WebFingerResponse;
use crate::config::FederationConfig;
use crate::data::Account;
use crate::error::AppError;
use crate::metrics::{FEDERATION_REQUEST_DURATION_SECONDS, FEDERATION_REQUESTS_TOTAL};

pub struct FederationClient {
    http: reqwest::Client,
    signer: RequestSigner,
    urls: UrlResolver,
    remote_scheme: String,
    requests: AtomicU64,
}

impl FederationClient {
    pub fn new(config: &FederationConfig, urls: UrlResolver) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(config.software_name.as_str())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            signer: RequestSigner::from_config(config),
            urls,
            remote_scheme: config.remote_scheme.clone(),
            requests: AtomicU64::new(0),
        })
    }

    /// Number of outbound requests attempted so far
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Look up `resource` on `host`'s WebFinger endpoint.
    pub async fn get_webfinger(
        &self,
        host: &str,
        resource: &str,
    ) -> Result<WebFingerResponse, AppError> {
        let endpoint = format!("{}://{}/.well-known/webfinger", self.remote_scheme, host);
        let url = url::Url::parse_with_params(&endpoint, &[("resource", resource)])
            .map_err(|e| AppError::InvalidAddress(format!("invalid host {}: {}", host, e)))?;

        let request = self.http.get(url);
        self.fetch_json("webfinger", "failed to get webfinger", request)
            .await
    }

    /// Fetch an actor document with a request signed by `account`.
    pub async fn get_actor(
        &self,
        account: &Account,
        actor_url: &str,
    ) -> Result<ActorDocument, AppError> {
        let signed = self.signer.sign(
            "GET",
            actor_url,
            None,
            &account.private_key_pem,
            &self.urls.main_key_url(&account.id),
        )?;

        let request = self
            .http
            .get(actor_url)
            .headers(signed.to_header_map()?)
            .header(ACCEPT, ACTIVITY_JSON);
        self.fetch_json("get_actor", "failed to get actor", request)
            .await
    }

    /// Fetch the public key published at `key_url`. Unsigned.
    pub async fn get_main_key(&self, key_url: &str) -> Result<PublicKeyDocument, AppError> {
        let request = self.http.get(key_url).header(ACCEPT, ACTIVITY_JSON);
        let document: MainKeyDocument = self
            .fetch_json("get_main_key", "failed to get main key", request)
            .await?;
        Ok(document.public_key)
    }

    /// Deliver `activity` to a remote inbox as `account`.
    pub async fn post_inbox<T: Serialize + ?Sized>(
        &self,
        account: &Account,
        inbox_url: &str,
        activity: &T,
    ) -> Result<(), AppError> {
        let body = serde_json::to_vec(activity)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to marshal body: {}", e)))?;

        let signed = self.signer.sign(
            "POST",
            inbox_url,
            Some(&body),
            &account.private_key_pem,
            &self.urls.main_key_url(&account.id),
        )?;

        let request = self
            .http
            .post(inbox_url)
            .headers(signed.to_header_map()?)
            .header(CONTENT_TYPE, ACTIVITY_JSON)
            .body(body);

        let response = self
            .send("post_inbox", "failed to post inbox", request)
            .await?;
        tracing::info!(inbox = inbox_url, status = %response.status(), "Delivered activity");
        Ok(())
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AppError> {
        let response = self.send(operation, context, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::transport(&format!("{}: failed to decode", context), e))
    }

    async fn send(
        &self,
        operation: &'static str,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AppError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let result = request.send().await;
        FEDERATION_REQUEST_DURATION_SECONDS
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                FEDERATION_REQUESTS_TOTAL
                    .with_label_values(&[operation, "error"])
                    .inc();
                tracing::warn!(operation, %error, "Federation request failed");
                return Err(AppError::transport(context, error));
            }
        };

        let status = response.status();
        FEDERATION_REQUESTS_TOTAL
            .with_label_values(&[operation, status.as_str()])
            .inc();

        if !status.is_success() {
            tracing::warn!(operation, url = %response.url(), %status, "Remote rejected request");
            return Err(AppError::status(context, status));
        }

        Ok(response)
    }
}
