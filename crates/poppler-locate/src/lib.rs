//! # poppler-locate
//!
//! Find poppler's `pdftoppm` rasteriser on the host before any PDF work
//! starts, so that a missing toolchain surfaces as an instructive message
//! instead of a half-finished conversion.
//!
//! ## How it works
//!
//! On first call to [`locate_pdftoppm`]:
//!
//! 1. Checks `POPPLER_PATH` (either the `pdftoppm` binary itself or the
//!    directory containing it, the usual layout of the Windows zip).
//! 2. Otherwise walks every entry of `PATH` looking for the executable.
//! 3. Probes the candidate with `pdftoppm -v` to make sure it actually runs.
//!
//! A successful resolution is cached for the lifetime of the process. Failed
//! lookups are not cached: installing poppler while an interactive session is
//! open makes the next PDF upload work without a restart.
//!
//! ## Usage
//!
//! ```rust,no_run
//! match poppler_locate::locate_pdftoppm() {
//!     Ok(path) => println!("using {}", path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! - `POPPLER_PATH` — path to `pdftoppm` or to the directory holding it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variable that overrides the `PATH` search.
pub const POPPLER_PATH_ENV: &str = "POPPLER_PATH";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned when `pdftoppm` cannot be used.
#[derive(Error, Debug)]
pub enum PopplerError {
    /// No `pdftoppm` executable on `POPPLER_PATH` or `PATH`.
    #[error("Poppler is not installed (pdftoppm was not found). Please install it:\n{hint}")]
    NotFound { hint: String },

    /// An executable was found but could not be started.
    #[error("Found pdftoppm at '{path}' but it failed to run: {reason}\n{hint}")]
    ProbeFailed {
        path: PathBuf,
        reason: String,
        hint: String,
    },
}

impl PopplerError {
    /// The per-platform installation instructions carried by every variant.
    pub fn hint(&self) -> &str {
        match self {
            PopplerError::NotFound { hint } | PopplerError::ProbeFailed { hint, .. } => hint,
        }
    }
}

// ── Platform metadata ────────────────────────────────────────────────────────

/// File name of the rasteriser binary on the current platform.
pub fn executable_name() -> &'static str {
    if cfg!(windows) {
        "pdftoppm.exe"
    } else {
        "pdftoppm"
    }
}

/// Installation instructions for poppler, tailored to the running OS.
///
/// Unknown platforms get the full list so the user can pick.
pub fn install_hint() -> String {
    hint_for_os(std::env::consts::OS)
}

fn hint_for_os(os: &str) -> String {
    const MACOS: &str = "  - macOS: brew install poppler";
    const DEBIAN: &str = "  - Ubuntu/Debian: sudo apt-get install poppler-utils";
    const FEDORA: &str = "  - Fedora/RHEL: sudo dnf install poppler-utils";
    const WINDOWS: &str = "  - Windows: download the poppler binaries from \
https://github.com/oschwartz10612/poppler-windows/releases and add the bin/ folder to PATH \
(or set POPPLER_PATH)";

    match os {
        "macos" => MACOS.to_string(),
        "linux" => format!("{DEBIAN}\n{FEDORA}"),
        "windows" => WINDOWS.to_string(),
        _ => format!("{MACOS}\n{DEBIAN}\n{FEDORA}\n{WINDOWS}"),
    }
}

// ── Thread-safe singleton path cache ─────────────────────────────────────────

static RESOLVED_PATH: OnceLock<PathBuf> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve and probe `pdftoppm`, caching the first success.
///
/// # Thread safety
///
/// Safe to call concurrently; racing callers may both probe, and both agree
/// on the result.
pub fn locate_pdftoppm() -> Result<PathBuf, PopplerError> {
    if let Some(path) = RESOLVED_PATH.get() {
        return Ok(path.clone());
    }

    let path = find_pdftoppm().ok_or_else(|| PopplerError::NotFound {
        hint: install_hint(),
    })?;
    probe(&path)?;

    let _ = RESOLVED_PATH.set(path.clone());
    Ok(path)
}

/// `true` when [`locate_pdftoppm`] would succeed.
pub fn is_pdftoppm_available() -> bool {
    locate_pdftoppm().is_ok()
}

/// Search `POPPLER_PATH`, then `PATH`, without running anything.
pub fn find_pdftoppm() -> Option<PathBuf> {
    let name = executable_name();

    if let Some(override_path) = std::env::var_os(POPPLER_PATH_ENV) {
        let p = PathBuf::from(override_path);
        if p.is_file() {
            return Some(p);
        }
        if let Some(found) = search_dirs(std::iter::once(p), name) {
            return Some(found);
        }
        // Fall through: a stale override should not hide a PATH install.
    }

    let path_var = std::env::var_os("PATH")?;
    search_dirs(std::env::split_paths(&path_var), name)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn search_dirs<I>(dirs: I, name: impl AsRef<OsStr>) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter()
        .map(|dir| dir.join(name.as_ref()))
        .find(|candidate| candidate.is_file())
}

/// Run `pdftoppm -v`. Older poppler releases exit non-zero on `-v`, so only a
/// failure to spawn counts as broken.
fn probe(path: &Path) -> Result<(), PopplerError> {
    Command::new(path)
        .arg("-v")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|e| PopplerError::ProbeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
            hint: install_hint(),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
