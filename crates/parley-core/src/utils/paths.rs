use std::path::PathBuf;

/// Standard application directories for Parley.
pub struct AppPaths;

impl AppPaths {
    /// User-level data directory (platform-specific)
    pub fn user_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "parley").map(|d| d.data_dir().to_path_buf())
    }

    /// Where the terminal client writes its log files
    pub fn log_dir() -> PathBuf {
        Self::user_data_dir()
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| PathBuf::from(".parley").join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_dir_ends_in_logs() {
        assert!(AppPaths::log_dir().ends_with("logs"));
    }
}
