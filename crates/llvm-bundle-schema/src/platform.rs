//! Per-platform download and packaging metadata.
//!
//! The table is an immutable configuration document loaded once at start
//! (see [`PlatformTable::from_toml_str`]) and passed by reference to the
//! pipeline. Names, URLs and file lists are templates rendered against a
//! [`TemplateVars`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::ReleaseVersion;

/// The platform table shipped with the tool.
pub const BUILTIN_PLATFORMS: &str = include_str!("../platforms.toml");

/// Placeholders accepted inside templates.
const PLACEHOLDERS: &[&str] = &["version", "upstream", "base", "major", "platform", "archive"];

/// Errors produced while loading a platform table.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid TOML or does not match the schema.
    #[error("Failed to parse platform table: {0}")]
    Parse(#[from] toml::de::Error),

    /// The document parsed but is semantically inconsistent.
    #[error("Invalid platform table: {0}")]
    Invalid(String),

    /// A requested platform is not present in the table.
    #[error("Unknown platform '{0}'")]
    UnknownPlatform(String),
}

/// Archive format of an upstream prebuilt package.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Xz-compressed tar archive (`.tar.xz`).
    #[serde(rename = "tar.xz")]
    TarXz,
    /// Legacy LZMA-alone (or xz) compressed tar, decompressed in memory.
    #[serde(rename = "lzma")]
    TarLzma,
    /// NSIS self-extracting Windows installer (`.exe`), unpacked with 7-Zip.
    #[serde(rename = "nsis")]
    Installer,
    /// 7-Zip archive (`.7z`).
    #[serde(rename = "7z")]
    SevenZip,
}

/// Values substituted into templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// The release being bundled.
    pub version: &'a ReleaseVersion,
    /// Platform identifier, e.g. `x86_64-unknown-linux-gnu`.
    pub platform: &'a str,
    /// Upstream archive file name, when known.
    pub archive: Option<&'a str>,
}

impl<'a> TemplateVars<'a> {
    /// Variables for a platform, without an archive name.
    pub fn new(version: &'a ReleaseVersion, platform: &'a str) -> Self {
        Self {
            version,
            platform,
            archive: None,
        }
    }

    /// Attach the upstream archive name.
    pub fn with_archive(mut self, archive: &'a str) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Render a template.
    ///
    /// `{version}` is the full tag (including any release candidate),
    /// `{upstream}` the llvm-project release name (`10.0.0-rc2`), `{base}`
    /// the bare `major.minor.patch` and `{major}` the leading component.
    pub fn render(&self, template: &str) -> String {
        let mut out = template
            .replace("{version}", &self.version.tag())
            .replace("{upstream}", &self.version.upstream_name())
            .replace("{base}", &self.version.base().to_string())
            .replace("{major}", &self.version.major().to_string())
            .replace("{platform}", self.platform);
        if let Some(archive) = self.archive {
            out = out.replace("{archive}", archive);
        }
        out
    }
}

/// One distributable archive produced from an extracted platform payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactPackageSpec {
    /// Logical name, e.g. `libclang`.
    pub name: String,
    /// Output archive name template, e.g. `libclang-{version}-{platform}.tar.bz2`.
    pub output: String,
    /// Ordered relative paths (templates) copied into the archive.
    pub files: Vec<String>,
}

impl ArtifactPackageSpec {
    /// Rendered output archive name.
    pub fn output_name(&self, vars: &TemplateVars<'_>) -> String {
        vars.render(&self.output)
    }

    /// Rendered relative file paths, in declaration order.
    pub fn file_paths(&self, vars: &TemplateVars<'_>) -> Vec<String> {
        self.files.iter().map(|f| vars.render(f)).collect()
    }
}

/// Download and packaging metadata for one supported OS/architecture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformTarget {
    /// Platform identifier, e.g. `x86_64-unknown-linux-gnu`.
    pub name: String,
    /// Download URL template; may reference `{archive}`.
    pub url: String,
    /// Format of the upstream archive.
    pub format: ArchiveFormat,
    /// Upstream archive file name template.
    pub archive: String,
    /// Packages cut from the extracted payload.
    pub packages: Vec<ArtifactPackageSpec>,
}

impl PlatformTarget {
    /// Rendered upstream archive file name; also the cache key.
    pub fn archive_name(&self, version: &ReleaseVersion) -> String {
        TemplateVars::new(version, &self.name).render(&self.archive)
    }

    /// Rendered download URL.
    pub fn download_url(&self, version: &ReleaseVersion) -> String {
        let archive = self.archive_name(version);
        TemplateVars::new(version, &self.name)
            .with_archive(&archive)
            .render(&self.url)
    }
}

/// The full set of supported platforms plus run-wide templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformTable {
    /// License download URL template.
    pub license_url: String,
    /// Platforms, processed in declaration order.
    pub platforms: Vec<PlatformTarget>,
}

impl PlatformTable {
    /// Parse and validate a TOML platform table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when names collide, lists are empty or a
    /// template uses an unknown placeholder.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: Self = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// The table embedded in the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded document is broken.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_PLATFORMS)
    }

    /// Look up a platform by name.
    pub fn get(&self, name: &str) -> Option<&PlatformTarget> {
        self.platforms.iter().find(|p| p.name == name)
    }

    /// Platforms to process: all of them when `only` is empty, otherwise the
    /// named subset in table order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPlatform`] for a name not in the table.
    pub fn select(&self, only: &[String]) -> Result<Vec<&PlatformTarget>, ConfigError> {
        if let Some(missing) = only.iter().find(|name| self.get(name).is_none()) {
            return Err(ConfigError::UnknownPlatform(missing.clone()));
        }
        Ok(self
            .platforms
            .iter()
            .filter(|p| only.is_empty() || only.contains(&p.name))
            .collect())
    }

    /// Rendered license URL for a version.
    pub fn license_url(&self, version: &ReleaseVersion) -> String {
        TemplateVars::new(version, "").render(&self.license_url)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_placeholders(&self.license_url)?;
        if self.platforms.is_empty() {
            return Err(ConfigError::Invalid("no platforms defined".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for platform in &self.platforms {
            if !seen.insert(platform.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate platform '{}'",
                    platform.name
                )));
            }
            check_placeholders(&platform.url)?;
            check_placeholders(&platform.archive)?;

            let mut outputs = std::collections::HashSet::new();
            for package in &platform.packages {
                if package.files.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "package '{}' of '{}' lists no files",
                        package.name, platform.name
                    )));
                }
                if !outputs.insert(package.output.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate output '{}' in '{}'",
                        package.output, platform.name
                    )));
                }
                check_placeholders(&package.output)?;
                for file in &package.files {
                    check_placeholders(file)?;
                }
            }
        }
        Ok(())
    }
}

fn check_placeholders(template: &str) -> Result<(), ConfigError> {
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::Invalid(format!(
                "unterminated placeholder in '{template}'"
            )));
        };
        let name = &after[..end];
        if !PLACEHOLDERS.contains(&name) {
            return Err(ConfigError::Invalid(format!(
                "unknown placeholder '{{{name}}}' in '{template}'"
            )));
        }
        rest = &after[end + 1..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> ReleaseVersion {
        ReleaseVersion::parse("10.0.0").unwrap()
    }

    #[test]
    fn test_builtin_table_loads() {
        let table = PlatformTable::builtin().unwrap();
        assert_eq!(table.platforms.len(), 8);
        assert_eq!(
            table.license_url(&version()),
            "https://releases.llvm.org/10.0.0/LICENSE.TXT"
        );

        let win = table.get("win64").unwrap();
        assert_eq!(win.format, ArchiveFormat::Installer);
    }

    #[test]
    fn test_linux_rendering() {
        let table = PlatformTable::builtin().unwrap();
        let linux = table.get("x86_64-unknown-linux-gnu").unwrap();
        let v = version();

        assert_eq!(
            linux.archive_name(&v),
            "clang+llvm-10.0.0-x86_64-unknown-linux-gnu.tar.xz"
        );
        assert_eq!(
            linux.download_url(&v),
            "https://github.com/ycm-core/llvm/releases/download/10.0.0/\
             clang+llvm-10.0.0-x86_64-unknown-linux-gnu.tar.xz"
        );

        let vars = TemplateVars::new(&v, &linux.name);
        let libclang = &linux.packages[0];
        assert_eq!(libclang.name, "libclang");
        assert_eq!(
            libclang.output_name(&vars),
            "libclang-10.0.0-x86_64-unknown-linux-gnu.tar.bz2"
        );
        assert_eq!(
            libclang.file_paths(&vars),
            vec!["lib/libclang.so", "lib/libclang.so.10"]
        );
    }

    #[test]
    fn test_select() {
        let table = PlatformTable::builtin().unwrap();
        assert_eq!(table.select(&[]).unwrap().len(), 8);

        let only = vec!["win64".to_string(), "win32".to_string()];
        let names: Vec<_> = table
            .select(&only)
            .unwrap()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["win32", "win64"]);

        let err = table.select(&["solaris".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlatform(name) if name == "solaris"));
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let doc = r#"
license_url = "https://example.com/{base}/LICENSE.TXT"

[[platforms]]
name = "linux"
url = "https://example.com/{archive}"
format = "tar.xz"
archive = "llvm-{llvm_version}.tar.xz"

[[platforms.packages]]
name = "libclang"
output = "libclang-{version}-{platform}.tar.bz2"
files = ["lib/libclang.so"]
"#;
        let err = PlatformTable::from_toml_str(doc).unwrap_err();
        assert!(err.to_string().contains("llvm_version"));
    }

    #[test]
    fn test_rejects_duplicate_platforms() {
        let platform = r#"
[[platforms]]
name = "linux"
url = "https://example.com/{archive}"
format = "lzma"
archive = "llvm.tar.xz"
packages = []
"#;
        let doc = format!("license_url = \"https://example.com\"\n{platform}{platform}");
        let err = PlatformTable::from_toml_str(&doc).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_release_candidate_rendering() {
        let v = version().with_release_candidate(Some(1));
        let vars = TemplateVars::new(&v, "win64");
        assert_eq!(
            vars.render("{version}/{upstream}/{base}/{major}"),
            "10.0.0rc1/10.0.0-rc1/10.0.0/10"
        );
    }

    #[test]
    fn test_release_candidate_download_urls() {
        let table = PlatformTable::builtin().unwrap();
        let v = version().with_release_candidate(Some(2));

        let win = table.get("win64").unwrap();
        assert_eq!(win.archive_name(&v), "LLVM-10.0.0-rc2-win64.exe");
        assert_eq!(
            win.download_url(&v),
            "https://github.com/llvm/llvm-project/releases/download/llvmorg-10.0.0-rc2/\
             LLVM-10.0.0-rc2-win64.exe"
        );

        let darwin = table.get("x86_64-apple-darwin").unwrap();
        assert_eq!(
            darwin.download_url(&v),
            "https://github.com/llvm/llvm-project/releases/download/llvmorg-10.0.0-rc2/\
             clang+llvm-10.0.0-rc2-x86_64-apple-darwin.tar.xz"
        );

        // Our own Linux build is tagged the ycm-core way.
        let linux = table.get("x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(
            linux.download_url(&v),
            "https://github.com/ycm-core/llvm/releases/download/10.0.0rc2/\
             clang+llvm-10.0.0rc2-x86_64-unknown-linux-gnu.tar.xz"
        );

        let vars = TemplateVars::new(&v, &win.name);
        assert_eq!(
            win.packages[0].output_name(&vars),
            "libclang-10.0.0rc2-win64.tar.bz2"
        );
    }
}
