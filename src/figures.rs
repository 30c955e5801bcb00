//! Figure staging and harvesting.
//!
//! Generated figures only exist as transient engine-side state, so every
//! `execute` call wraps the caller's code in a capture script that saves all
//! open figure handles into a per-call staging directory. After the call the
//! bridge reads those files back, base64-encodes them for transport, and
//! cleans up behind itself.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::protocol::FigureArtifact;

/// Filename prefix for staged figure directories.
const STAGING_PREFIX: &str = "mlx_fig_";

/// Uniquely named temporary directory owned by a single `execute` call.
///
/// Cleanup is deliberately not recursive: harvested files are deleted one by
/// one, and `remove` only succeeds when the directory is empty afterward.
/// A directory that still holds unexpected files stays on disk.
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create a fresh staging directory under the system temp location.
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir()?;
        // Detach from TempDir's recursive drop; lifecycle is manual from here.
        Ok(Self { path: dir.keep() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory if it is empty by now. Failure is tolerated.
    pub fn remove(self) {
        if let Err(err) = fs::remove_dir(&self.path) {
            tracing::debug!(
                "staging directory {} left in place: {}",
                self.path.display(),
                err
            );
        }
    }
}

/// Build the MATLAB script that runs `code` and captures its figures.
///
/// The script disables interactive figure visibility (this is a headless
/// subprocess), inlines the caller's code verbatim, saves every open figure
/// handle as a sequentially numbered PNG in `staging`, and closes all
/// figures so handles never leak into the next request.
pub fn capture_script(code: &str, staging: &Path) -> String {
    // MATLAB string literals escape embedded quotes by doubling them.
    let dir = staging.display().to_string().replace('\'', "''");
    format!(
        "set(0,'DefaultFigureVisible','off');\n\
         {code}\n\
         figs = findall(0,'Type','figure');\n\
         for i = 1:length(figs)\n\
             saveas(figs(i), fullfile('{dir}', sprintf('fig_%d.png', i)));\n\
         end\n\
         close all;\n"
    )
}

/// Harvest staged figure files into transport artifacts.
///
/// Entries are visited in ascending filename order, which matches the
/// engine-side figure-handle enumeration order (`fig_1.png`, `fig_2.png`,
/// ...). Each PNG is read, encoded, and deleted. A file that cannot be read
/// (or deleted) gets a descriptive line appended to `stderr` and is skipped;
/// one bad artifact never aborts the rest. Non-PNG entries are ignored.
pub fn collect(staging: &Path, stderr: &mut String) -> Vec<FigureArtifact> {
    let entries = match fs::read_dir(staging) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!("staging directory unreadable: {}", err);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut artifacts = Vec::new();
    for name in names {
        if !name.ends_with(".png") {
            continue;
        }
        let path = staging.join(&name);
        match fs::read(&path) {
            Ok(bytes) => {
                artifacts.push(FigureArtifact {
                    data: STANDARD.encode(&bytes),
                });
                if let Err(err) = fs::remove_file(&path) {
                    let _ = writeln!(stderr, "Error reading figure {name}: {err}");
                }
            }
            Err(err) => {
                let _ = writeln!(stderr, "Error reading figure {name}: {err}");
            }
        }
    }
    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn staging_dir_is_unique_and_removable() {
        let a = StagingDir::create().unwrap();
        let b = StagingDir::create().unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());

        let path = a.path().to_path_buf();
        a.remove();
        b.remove();
        assert!(!path.exists());
    }

    #[test]
    fn remove_tolerates_leftover_files() {
        let staging = StagingDir::create().unwrap();
        let path = staging.path().to_path_buf();
        fs::write(path.join("leftover.txt"), b"x").unwrap();

        staging.remove();

        // Non-empty directory stays on disk.
        assert!(path.exists());
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn capture_script_wraps_code() {
        let script = capture_script("plot([1,2,3]);", Path::new("/tmp/mlx_fig_abc"));
        assert!(script.starts_with("set(0,'DefaultFigureVisible','off');\n"));
        assert!(script.contains("plot([1,2,3]);\n"));
        assert!(script.contains("figs = findall(0,'Type','figure');"));
        assert!(script.contains("fullfile('/tmp/mlx_fig_abc', sprintf('fig_%d.png', i))"));
        assert!(script.trim_end().ends_with("close all;"));
    }

    #[test]
    fn capture_script_escapes_quotes_in_path() {
        let script = capture_script("", Path::new("/tmp/it's here"));
        assert!(script.contains("fullfile('/tmp/it''s here'"));
    }

    #[test]
    fn collect_orders_by_filename() {
        let staging = StagingDir::create().unwrap();
        // Written out of order on purpose.
        fs::write(staging.path().join("fig_2.png"), b"second").unwrap();
        fs::write(staging.path().join("fig_1.png"), b"first").unwrap();

        let mut stderr = String::new();
        let artifacts = collect(staging.path(), &mut stderr);

        assert_eq!(stderr, "");
        assert_eq!(artifacts.len(), 2);
        assert_eq!(STANDARD.decode(&artifacts[0].data).unwrap(), b"first");
        assert_eq!(STANDARD.decode(&artifacts[1].data).unwrap(), b"second");

        // Harvested files are gone and the directory is removable.
        let path = staging.path().to_path_buf();
        staging.remove();
        assert!(!path.exists());
    }

    #[test]
    fn collect_ignores_non_png_entries() {
        let staging = StagingDir::create().unwrap();
        fs::write(staging.path().join("notes.txt"), b"not a figure").unwrap();

        let mut stderr = String::new();
        let artifacts = collect(staging.path(), &mut stderr);

        assert_eq!(artifacts.len(), 0);
        assert_eq!(stderr, "");
        assert!(staging.path().join("notes.txt").exists());
        fs::remove_dir_all(staging.path()).unwrap();
    }

    #[test]
    fn collect_isolates_unreadable_entries() {
        let staging = StagingDir::create().unwrap();
        // A directory with a figure-like name makes fs::read fail.
        fs::create_dir(staging.path().join("fig_1.png")).unwrap();
        fs::write(staging.path().join("fig_2.png"), b"ok").unwrap();

        let mut stderr = String::new();
        let artifacts = collect(staging.path(), &mut stderr);

        assert_eq!(artifacts.len(), 1);
        assert_eq!(STANDARD.decode(&artifacts[0].data).unwrap(), b"ok");
        assert!(stderr.contains("Error reading figure fig_1.png"));
        fs::remove_dir_all(staging.path()).unwrap();
    }
}
