use std::path::{Path, PathBuf};

/// Platform-specific filesystem operations behind a common interface.
/// Each OS provides its own `NativePlatform` so call sites stay free of
/// `#[cfg]` blocks.
pub trait Platform {
    /// Set restrictive *directory* permissions (0o700 on Unix, no-op on Windows).
    fn restrict_dir_permissions(path: &Path);

    /// Set restrictive *file* permissions (0o600 on Unix, no-op on Windows).
    fn restrict_file_permissions(path: &Path);

    /// Binary filename for this platform (`"fhirbuilders"` / `"fhirbuilders.exe"`).
    fn binary_name() -> &'static str;

    /// Default data directory.
    /// Unix: `~/.fhirbuilders`, Windows: `%APPDATA%\fhirbuilders`.
    /// `None` when no home directory can be determined.
    fn default_data_dir() -> Option<PathBuf>;
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::NativePlatform;
