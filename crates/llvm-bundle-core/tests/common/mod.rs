//! In-memory fetcher and registry used by the pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use llvm_bundle_core::{
    FetchError, Fetcher, NewRelease, RegistryError, ReleaseRegistry, RemoteAsset, RemoteRelease,
};
use llvm_bundle_schema::PlatformTable;
use xz2::write::XzEncoder;

pub const LINUX: &str = "x86_64-unknown-linux-gnu";
pub const ARM: &str = "aarch64-linux-gnu";

pub const TABLE: &str = r#"
license_url = "mem://license/{base}/LICENSE.TXT"

[[platforms]]
name = "x86_64-unknown-linux-gnu"
url = "mem://llvm/{archive}"
format = "tar.xz"
archive = "clang+llvm-{version}-{platform}.tar.xz"

[[platforms.packages]]
name = "libclang"
output = "libclang-{version}-{platform}.tar.bz2"
files = ["lib/libclang.so", "lib/libclang.so.{major}"]

[[platforms.packages]]
name = "clangd"
output = "clangd-{version}-{platform}.tar.bz2"
files = ["bin/clangd"]

[[platforms]]
name = "aarch64-linux-gnu"
url = "mem://llvm/{archive}"
format = "tar.xz"
archive = "clang+llvm-{version}-{platform}.tar.xz"

[[platforms.packages]]
name = "libclang"
output = "libclang-{version}-{platform}.tar.bz2"
files = ["lib/libclang.so", "lib/libclang.so.{major}"]

[[platforms.packages]]
name = "clangd"
output = "clangd-{version}-{platform}.tar.bz2"
files = ["bin/clangd"]
"#;

pub fn table() -> PlatformTable {
    PlatformTable::from_toml_str(TABLE).unwrap()
}

pub fn archive_url(platform: &str) -> String {
    format!("mem://llvm/clang+llvm-10.0.0-{platform}.tar.xz")
}

pub const LICENSE_URL: &str = "mem://license/10.0.0/LICENSE.TXT";

/// An upstream-style `.tar.xz` with the given files under a root directory.
pub fn upstream_archive(platform: &str, files: &[&str]) -> Vec<u8> {
    let root = format!("clang+llvm-10.0.0-{platform}");
    let mut builder = tar::Builder::new(Vec::new());
    for file in files {
        let body = format!("{platform}:{file}");
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{file}"), body.as_bytes())
            .unwrap();
    }
    let tar = builder.into_inner().unwrap();

    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

pub const FULL_LAYOUT: &[&str] = &["lib/libclang.so", "lib/libclang.so.10", "bin/clangd"];

/// Serves bytes by URL and records every request. Unknown URLs are 404.
#[derive(Clone, Default)]
pub struct MemoryFetcher {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MemoryFetcher {
    /// A fetcher serving the license and a full archive for each platform.
    pub fn serving(platforms: &[&str]) -> Self {
        let fetcher = Self::default();
        fetcher.insert(LICENSE_URL, b"Apache-2.0 WITH LLVM-exception".to_vec());
        for platform in platforms {
            fetcher.insert(&archive_url(platform), upstream_archive(platform, FULL_LAYOUT));
        }
        fetcher
    }

    pub fn insert(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }
}

#[derive(Default)]
pub struct RegistryState {
    pub releases: Vec<RemoteRelease>,
    pub calls: Vec<String>,
    next_id: u64,
}

/// A release registry held in memory. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MemoryRegistry {
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn releases(&self) -> Vec<RemoteRelease> {
        self.state.lock().unwrap().releases.clone()
    }
}

#[async_trait]
impl ReleaseRegistry for MemoryRegistry {
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("find {tag}"));
        Ok(state.releases.iter().find(|r| r.tag == tag).cloned())
    }

    async fn create_release(&self, release: &NewRelease) -> Result<RemoteRelease, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", release.tag));
        state.next_id += 1;
        let created = RemoteRelease {
            id: state.next_id,
            tag: release.tag.clone(),
            upload_url: format!("mem://uploads/{}", state.next_id),
            assets: Vec::new(),
        };
        state.releases.push(created.clone());
        Ok(created)
    }

    async fn delete_asset(&self, asset: &RemoteAsset) -> Result<(), RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {}", asset.name));
        for release in &mut state.releases {
            release.assets.retain(|a| a.id != asset.id);
        }
        Ok(())
    }

    async fn upload_asset(
        &self,
        release: &RemoteRelease,
        name: &str,
        _content_type: &str,
        _path: &Path,
    ) -> Result<RemoteAsset, RegistryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("upload {name}"));
        state.next_id += 1;
        let asset = RemoteAsset {
            id: state.next_id,
            name: name.to_string(),
        };
        state
            .releases
            .iter_mut()
            .find(|r| r.id == release.id)
            .unwrap()
            .assets
            .push(asset.clone());
        Ok(asset)
    }
}
