//! Idempotent publication of bundles to a [`ReleaseRegistry`].
//!
//! Per tag: query, create if absent, then for every bundle delete any
//! same-named asset before uploading. Re-running after a partial failure
//! finds the release by tag and carries on; it never creates a second
//! release or a second asset with the same name.

use tracing::{debug, info};

use crate::bundle::BundleResult;
use crate::paths::content_type_for;
use crate::registry::{NewRelease, RegistryError, ReleaseRegistry, RemoteRelease};
use crate::retry::{RetryPolicy, with_retries};

/// Drives a [`ReleaseRegistry`] through the publish state machine.
#[derive(Debug)]
pub struct ReleasePublisher<R> {
    registry: R,
    policy: RetryPolicy,
}

impl<R: ReleaseRegistry> ReleasePublisher<R> {
    pub fn new(registry: R, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Return the release tagged `metadata.tag`, creating it if needed.
    ///
    /// Query and create are retried together, so every attempt looks the
    /// tag up again before creating anything.
    ///
    /// # Errors
    ///
    /// Returns the registry error once retries are exhausted, or at once if
    /// it is not transient.
    pub async fn ensure_release(&self, metadata: &NewRelease) -> Result<RemoteRelease, RegistryError> {
        with_retries(&self.policy, "ensure release", || async move {
            if let Some(release) = self.registry.find_release(&metadata.tag).await? {
                debug!(tag = %release.tag, assets = release.assets.len(), "release exists");
                return Ok(release);
            }
            self.registry.create_release(metadata).await
        })
        .await
    }

    /// Publish `assets` under the release described by `metadata`.
    ///
    /// Uploads are attempted once; a failure is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the first registry or I/O error encountered.
    pub async fn publish(
        &self,
        metadata: &NewRelease,
        assets: &[BundleResult],
    ) -> Result<(), RegistryError> {
        let mut release = self.ensure_release(metadata).await?;

        for bundle in assets {
            if let Some(existing) = release.asset(&bundle.name).cloned() {
                with_retries(&self.policy, "delete asset", || {
                    self.registry.delete_asset(&existing)
                })
                .await?;
                release.assets.retain(|a| a.id != existing.id);
            }

            let uploaded = self
                .registry
                .upload_asset(
                    &release,
                    &bundle.name,
                    content_type_for(&bundle.name),
                    &bundle.path,
                )
                .await?;
            info!("uploaded {} to release {}", uploaded.name, release.tag);
            release.assets.push(uploaded);
        }
        Ok(())
    }
}
