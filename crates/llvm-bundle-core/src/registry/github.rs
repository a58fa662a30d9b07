//! GitHub Releases as a [`ReleaseRegistry`].

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, info};

use super::{
    Credentials, NewRelease, RegistryError, ReleaseRegistry, RemoteAsset, RemoteRelease,
    expect_status,
};

pub const GITHUB_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Releases of one `owner/repo` on GitHub.
#[derive(Debug, Clone)]
pub struct GitHubRegistry {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    credentials: Credentials,
}

impl GitHubRegistry {
    pub fn new(
        client: Client,
        owner: impl Into<String>,
        repo: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            credentials,
        }
    }

    /// Point at a different API root (GitHub Enterprise, test servers).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/{}/releases", self.api_url, self.owner, self.repo)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .header(ACCEPT, "application/vnd.github+json")
    }
}

/// Drop the RFC 6570 suffix GitHub appends to upload URLs.
fn upload_endpoint(upload_url: &str) -> &str {
    upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base)
}

#[async_trait]
impl ReleaseRegistry for GitHubRegistry {
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, RegistryError> {
        const OP: &str = "list releases";
        let url = self.releases_url();

        for page in 1.. {
            let response = self
                .authed(self.client.get(&url))
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await
                .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
            let releases: Vec<RemoteRelease> = expect_status(OP, response, StatusCode::OK)
                .await?
                .json()
                .await
                .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
            debug!(page, count = releases.len(), "listed releases");

            let last_page = releases.len() < PER_PAGE;
            if let Some(release) = releases.into_iter().find(|r| r.tag == tag) {
                return Ok(Some(release));
            }
            if last_page {
                break;
            }
        }
        Ok(None)
    }

    async fn create_release(&self, release: &NewRelease) -> Result<RemoteRelease, RegistryError> {
        const OP: &str = "create release";
        info!("creating release {}", release.tag);

        let response = self
            .authed(self.client.post(self.releases_url()))
            .json(release)
            .send()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
        expect_status(OP, response, StatusCode::CREATED)
            .await?
            .json()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))
    }

    async fn delete_asset(&self, asset: &RemoteAsset) -> Result<(), RegistryError> {
        const OP: &str = "delete asset";
        info!("deleting existing asset {}", asset.name);

        let url = format!(
            "{}/repos/{}/{}/releases/assets/{}",
            self.api_url, self.owner, self.repo, asset.id
        );
        let response = self
            .authed(self.client.delete(url))
            .send()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
        // A retried delete whose first attempt went through sees 404.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = asset.id, "asset already gone");
            return Ok(());
        }
        expect_status(OP, response, StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    async fn upload_asset(
        &self,
        release: &RemoteRelease,
        name: &str,
        content_type: &str,
        path: &Path,
    ) -> Result<RemoteAsset, RegistryError> {
        const OP: &str = "upload asset";
        info!("uploading {name} to release {}", release.tag);
        let (body, len) = crate::io::file_body(path).await?;
        debug!(bytes = len, content_type, "upload body");

        let response = self
            .authed(self.client.post(upload_endpoint(&release.upload_url)))
            .query(&[("name", name)])
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))?;
        expect_status(OP, response, StatusCode::CREATED)
            .await?
            .json()
            .await
            .map_err(|e| RegistryError::from_reqwest(OP, &e))
    }
}
