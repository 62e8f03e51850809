use std::path::{Path, PathBuf};

use super::Platform;

pub struct NativePlatform;

impl Platform for NativePlatform {
    fn restrict_dir_permissions(_path: &Path) {}

    fn restrict_file_permissions(_path: &Path) {}

    fn binary_name() -> &'static str {
        "fhirbuilders.exe"
    }

    fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("fhirbuilders"))
    }
}
