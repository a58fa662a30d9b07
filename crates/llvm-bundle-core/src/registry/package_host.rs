//! Generic package-hosting API for install-tree bundles.
//!
//! Files live under `<subject>/<repo>/<package>/<version>`. Uploading with
//! `override=1` replaces a same-named file, so re-runs never duplicate.

use std::path::Path;

use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::info;

use super::{Credentials, RegistryError, expect_status};
use crate::bundle::BundleResult;
use crate::retry::{RetryPolicy, with_retries};

pub const PACKAGE_HOST_API_URL: &str = "https://api.bintray.com";

/// One package on the host. `subject` is the account name.
#[derive(Debug, Clone)]
pub struct PackageHost {
    client: Client,
    api_url: String,
    subject: String,
    repo: String,
    package: String,
    credentials: Credentials,
}

impl PackageHost {
    /// Package `package` in `repo`, owned by the credentials' user.
    pub fn new(
        client: Client,
        repo: impl Into<String>,
        package: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            client,
            api_url: PACKAGE_HOST_API_URL.to_string(),
            subject: credentials.username.clone(),
            repo: repo.into(),
            package: package.into(),
            credentials,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn version_url(&self, version: &str) -> String {
        format!(
            "{}/content/{}/{}/{}/{version}",
            self.api_url, self.subject, self.repo, self.package
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.credentials.username, Some(&self.credentials.token))
    }

    /// Stream the file at `path` as `file_name` under `version`, replacing
    /// any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] if `path` cannot be opened and
    /// [`RegistryError::Rejected`] unless the host answers 201.
    pub async fn upload_content(
        &self,
        version: &str,
        file_name: &str,
        path: &Path,
    ) -> Result<(), RegistryError> {
        const OP: &str = "upload content";
        info!("uploading {file_name} to package host");
        let (body, len) = crate::io::file_body(path).await?;

        let response = self
            .authed(
                self.client
                    .put(format!("{}/{file_name}", self.version_url(version))),
            )
            .query(&[("publish", 1), ("override", 1)])
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
        expect_status(OP, response, StatusCode::CREATED).await?;
        Ok(())
    }

    /// Make every uploaded file of `version` public.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Rejected`] unless the host answers 200.
    pub async fn publish_version(&self, version: &str) -> Result<(), RegistryError> {
        const OP: &str = "publish version";
        info!("publishing version {version} on package host");

        let response = self
            .authed(
                self.client
                    .post(format!("{}/publish", self.version_url(version))),
            )
            .json(&json!({ "discard": false, "publish_wait_for_secs": -1 }))
            .send()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
        expect_status(OP, response, StatusCode::OK).await?;
        Ok(())
    }

    /// Show `file_name` on the package's download page.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Rejected`] unless the host answers 200.
    pub async fn list_in_downloads(&self, file_name: &str) -> Result<(), RegistryError> {
        const OP: &str = "list in downloads";
        info!("listing {file_name} in downloads");

        let url = format!(
            "{}/file_metadata/{}/{}/{file_name}",
            self.api_url, self.subject, self.repo
        );
        let response = self
            .authed(self.client.put(url))
            .json(&json!({ "list_in_downloads": true }))
            .send()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
        expect_status(OP, response, StatusCode::OK).await?;
        Ok(())
    }

    /// Upload, publish and list `bundle` under `version`.
    ///
    /// The upload is attempted once; publishing and listing are retried
    /// under `policy`.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn release(
        &self,
        policy: &RetryPolicy,
        version: &str,
        bundle: &BundleResult,
    ) -> Result<(), RegistryError> {
        self.upload_content(version, &bundle.name, &bundle.path)
            .await?;
        with_retries(policy, "publish version", || self.publish_version(version)).await?;
        with_retries(policy, "list in downloads", || {
            self.list_in_downloads(&bundle.name)
        })
        .await
    }
}
