//! MATLAB bridge - line-delimited JSON subprocess around the MATLAB engine.
//!
//! This is the main entry point for the bridge binary. It configures the
//! embedded Python environment, starts the MATLAB engine via PyO3, signals
//! readiness, and runs the blocking command loop over stdin/stdout until the
//! parent sends `quit` or closes the pipe.
//!
//! stdout is reserved for protocol lines; all diagnostics go to stderr.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matlab_bridge::engine::MatlabEngine;
use matlab_bridge::session;

fn main() -> Result<()> {
    // Initialize logging. The fmt layer writes to stderr because stdout
    // carries the wire protocol.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "matlab_bridge=info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    tracing::info!("Starting MATLAB bridge v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the Python interpreter that hosts the engine binding.
    configure_python_env();
    pyo3::Python::initialize();

    let stdout = io::stdout();
    let mut output = stdout.lock();

    // Session bootstrap: either the engine comes up, or the parent gets a
    // single terminal error line and the process exits without a loop.
    let mut engine = match MatlabEngine::start() {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!("Engine startup failed: {}", err);
            session::announce_failure(&mut output, &err)?;
            return Ok(());
        }
    };

    session::announce_ready(&mut output)?;

    let stdin = io::stdin();
    session::run(&mut engine, stdin.lock(), &mut output)?;

    tracing::info!("MATLAB bridge exited cleanly");
    Ok(())
}

/// Configure Python home/path before initializing PyO3.
///
/// Queries the Python executable directly to get sys.prefix and sys.path,
/// avoiding fragile manual parsing of pyvenv.cfg and .pth files. The
/// `matlab.engine` package is typically installed into a venv, so the venv's
/// site-packages must be visible to the embedded interpreter.
fn configure_python_env() {
    if std::env::var_os("PYTHONHOME").is_some() {
        tracing::info!("PYTHONHOME already set; using existing value");
        return;
    }

    for python_exe in find_python_candidates() {
        if let Some(env_info) = query_python_env(&python_exe) {
            // PYTHONHOME points at the actual installation, not the venv.
            std::env::set_var("PYTHONHOME", &env_info.base_prefix);
            tracing::info!("Using PYTHONHOME={}", env_info.base_prefix);

            if env_info.is_venv() {
                tracing::info!(
                    "Detected venv: prefix={}, base_prefix={}",
                    env_info.prefix,
                    env_info.base_prefix
                );
            }

            if std::env::var_os("PYTHONPATH").is_none() && !env_info.path.is_empty() {
                let mut paths = env_info.path.clone();

                // PYTHONHOME is the base installation, so the venv's
                // site-packages (where matlab.engine lives) must be added
                // explicitly and take priority.
                if let Some(site_packages) = env_info.venv_site_packages() {
                    let site_packages = site_packages.display().to_string();
                    if !paths.contains(&site_packages) {
                        paths.insert(0, site_packages);
                    }
                }

                if let Ok(joined) = std::env::join_paths(&paths) {
                    std::env::set_var("PYTHONPATH", &joined);
                    tracing::info!("Using PYTHONPATH from Python query (venv-aware)");
                }
            }
            return;
        }
    }

    tracing::warn!("Python stdlib not configured; set PYTHONHOME or VIRTUAL_ENV");
}

/// Python environment info queried from the interpreter.
struct PythonEnvInfo {
    prefix: String,
    base_prefix: String,
    path: Vec<String>,
}

impl PythonEnvInfo {
    /// Returns true if this is a virtual environment (prefix != base_prefix).
    fn is_venv(&self) -> bool {
        self.prefix != self.base_prefix
    }

    /// Get the venv site-packages path if this is a venv.
    fn venv_site_packages(&self) -> Option<PathBuf> {
        if !self.is_venv() {
            return None;
        }
        // Standard venv layout: {prefix}/lib/pythonX.Y/site-packages
        let lib_dir = Path::new(&self.prefix).join("lib");
        if let Ok(entries) = std::fs::read_dir(&lib_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with("python") {
                    let site_packages = entry.path().join("site-packages");
                    if site_packages.is_dir() {
                        return Some(site_packages);
                    }
                }
            }
        }
        None
    }
}

/// Query a Python executable for sys.prefix, sys.base_prefix, and sys.path.
fn query_python_env(python_exe: &Path) -> Option<PythonEnvInfo> {
    use std::process::Command;

    let script = r#"
import sys, json
print(json.dumps({
    "prefix": sys.prefix,
    "base_prefix": sys.base_prefix,
    "path": [p for p in sys.path if p]
}))
"#;

    let output = Command::new(python_exe).args(["-c", script]).output().ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim()).ok()?;

    Some(PythonEnvInfo {
        prefix: parsed["prefix"].as_str()?.to_string(),
        base_prefix: parsed["base_prefix"].as_str()?.to_string(),
        path: parsed["path"]
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
    })
}

/// Find Python executable candidates in order of preference.
fn find_python_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // 1. Explicit environment variables
    for var in ["MATLAB_BRIDGE_PYTHON", "PYTHON_SYS_EXECUTABLE"] {
        if let Ok(value) = std::env::var(var) {
            let path = PathBuf::from(&value);
            if path.is_file() {
                candidates.push(path);
            }
        }
    }

    // 2. VIRTUAL_ENV/bin/python
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let venv_python = venv_python_path(Path::new(&venv));
        if venv_python.is_file() {
            candidates.push(venv_python);
        }
    }

    // 3. CWD .venv/bin/python
    if let Ok(cwd) = std::env::current_dir() {
        let venv_python = venv_python_path(&cwd.join(".venv"));
        if venv_python.is_file() {
            candidates.push(venv_python);
        }
    }

    // 4. System python3 as last resort
    candidates.push(PathBuf::from(if cfg!(windows) {
        "python.exe"
    } else {
        "python3"
    }));

    candidates
}

/// Interpreter path inside a venv directory.
fn venv_python_path(venv: &Path) -> PathBuf {
    venv.join(if cfg!(windows) { "Scripts" } else { "bin" })
        .join(if cfg!(windows) {
            "python.exe"
        } else {
            "python"
        })
}
