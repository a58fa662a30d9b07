use dirs::cache_dir;
use std::path::PathBuf;

/// Default archive cache location (`~/.cache/llvm-bundle` on Linux), or
/// None if the platform cache directory cannot be resolved.
pub fn default_cache_dir() -> Option<PathBuf> {
    cache_dir().map(|c| c.join("llvm-bundle"))
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/').next_back().unwrap_or("")
}

/// MIME type used when uploading a bundle.
pub fn content_type_for(file_name: &str) -> &'static str {
    if file_name.ends_with(".tar.bz2") {
        "application/x-bzip2"
    } else if file_name.ends_with(".tar.xz") {
        "application/x-xz"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/download/llvmorg-10.0.0/LLVM-10.0.0-win64.exe"),
            "LLVM-10.0.0-win64.exe"
        );
        assert_eq!(filename_from_url("https://example.com/a.tar.xz?x=1"), "a.tar.xz");
        assert_eq!(filename_from_url("plain"), "plain");
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("libclang-10.0.0-x.tar.bz2"), "application/x-bzip2");
        assert_eq!(content_type_for("clang+llvm-10.0.0-x.tar.xz"), "application/x-xz");
        assert_eq!(content_type_for("notes.txt"), "application/octet-stream");
    }
}
