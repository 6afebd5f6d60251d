//! Environment probing for script runtimes
//!
//! Before a tool script can run, the host must have the matching runtime
//! installed. The prober resolves which concrete executable to invoke
//! (python may be `python3` or `python`) and caches the answer per kind
//! until a forced reprobe clears the cache.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// How long a version probe may take before it counts as a failure
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Supported script runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Bash,
    Python,
}

impl ScriptKind {
    /// Parse a manifest `script_type` string
    ///
    /// Returns `None` for kinds this runtime does not support.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bash" => Some(ScriptKind::Bash),
            "python" => Some(ScriptKind::Python),
            _ => None,
        }
    }

    /// All kinds built into the runtime
    pub fn builtin() -> [ScriptKind; 2] {
        [ScriptKind::Bash, ScriptKind::Python]
    }

    /// Script file extension used by the local-folder naming convention
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptKind::Bash => "sh",
            ScriptKind::Python => "py",
        }
    }

    /// Executable candidates, tried in preference order
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            ScriptKind::Bash => &["bash"],
            ScriptKind::Python => &["python3", "python"],
        }
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptKind::Bash => write!(f, "bash"),
            ScriptKind::Python => write!(f, "python"),
        }
    }
}

/// Result of probing one script kind
#[derive(Debug, Clone)]
pub struct EnvironmentCheck {
    /// Whether the runtime is usable on this host
    pub valid: bool,

    /// Concrete command to invoke (e.g. `python3`)
    pub executor: String,

    /// Why the probe failed, if it did
    pub error: Option<String>,
}

impl EnvironmentCheck {
    fn ok(executor: impl Into<String>) -> Self {
        Self {
            valid: true,
            executor: executor.into(),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            executor: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Probes and caches script runtime availability
///
/// Probe results are cached per kind until [`EnvironmentProber::force_reprobe`]
/// clears the whole cache. Unsupported kind strings are answered immediately
/// and never cached, so a later release that adds the kind is not shadowed by
/// a stale failure.
pub struct EnvironmentProber {
    cache: Mutex<HashMap<ScriptKind, EnvironmentCheck>>,
    skip_check: bool,
}

impl EnvironmentProber {
    /// Create a prober
    ///
    /// With `skip_check` set, every supported kind reports valid with its
    /// preferred executor and no subprocess is spawned.
    pub fn new(skip_check: bool) -> Self {
        debug!(skip_check, "EnvironmentProber::new: called");
        Self {
            cache: Mutex::new(HashMap::new()),
            skip_check,
        }
    }

    /// Probe a script kind by its manifest string
    pub async fn probe(&self, kind: &str) -> EnvironmentCheck {
        debug!(%kind, "probe: called");
        match ScriptKind::parse(kind) {
            Some(k) => self.probe_kind(k).await,
            None => {
                debug!(%kind, "probe: unsupported kind, not cached");
                EnvironmentCheck::failed(format!("Unsupported script type: {}", kind))
            }
        }
    }

    /// Probe a supported kind, using the cache when possible
    pub async fn probe_kind(&self, kind: ScriptKind) -> EnvironmentCheck {
        debug!(%kind, "probe_kind: called");
        if self.skip_check {
            debug!(%kind, "probe_kind: environment check skipped by config");
            return EnvironmentCheck::ok(kind.candidates()[0]);
        }

        let mut cache = self.cache.lock().await;
        if let Some(check) = cache.get(&kind) {
            debug!(%kind, valid = check.valid, "probe_kind: cache hit");
            return check.clone();
        }

        let check = run_probe(kind).await;
        debug!(%kind, valid = check.valid, executor = %check.executor, "probe_kind: probed");
        cache.insert(kind, check.clone());
        check
    }

    /// Probe the two built-in kinds
    pub async fn probe_all(&self) -> HashMap<ScriptKind, EnvironmentCheck> {
        debug!("probe_all: called");
        let mut results = HashMap::new();
        for kind in ScriptKind::builtin() {
            results.insert(kind, self.probe_kind(kind).await);
        }
        results
    }

    /// Clear the cache and reprobe every kind
    ///
    /// `referenced_kinds` carries the kind strings of currently loaded tools;
    /// unparseable kinds in it are ignored. The built-in kinds are always
    /// reprobed.
    pub async fn force_reprobe(&self, referenced_kinds: &[String]) -> HashMap<ScriptKind, EnvironmentCheck> {
        debug!(referenced = referenced_kinds.len(), "force_reprobe: called");
        self.cache.lock().await.clear();

        let mut kinds: Vec<ScriptKind> = ScriptKind::builtin().to_vec();
        for raw in referenced_kinds {
            match ScriptKind::parse(raw) {
                Some(k) if !kinds.contains(&k) => kinds.push(k),
                Some(_) => {}
                None => warn!(kind = %raw, "force_reprobe: skipping unsupported kind"),
            }
        }

        let mut results = HashMap::new();
        for kind in kinds {
            results.insert(kind, self.probe_kind(kind).await);
        }
        results
    }

    /// Seed the cache directly (tests exercise invalid-environment paths
    /// without depending on what the host has installed)
    #[cfg(test)]
    pub(crate) async fn seed(&self, kind: ScriptKind, check: EnvironmentCheck) {
        self.cache.lock().await.insert(kind, check);
    }
}

/// Spawn `<candidate> --version` for each candidate until one succeeds
async fn run_probe(kind: ScriptKind) -> EnvironmentCheck {
    debug!(%kind, "run_probe: called");
    let mut last_error = format!("no executable found for {}", kind);

    for candidate in kind.candidates() {
        debug!(%kind, %candidate, "run_probe: trying candidate");
        let result = tokio::time::timeout(
            PROBE_TIMEOUT,
            tokio::process::Command::new(candidate).arg("--version").output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                debug!(%kind, %candidate, "run_probe: candidate valid");
                return EnvironmentCheck::ok(*candidate);
            }
            Ok(Ok(output)) => {
                last_error = format!(
                    "{} --version exited with {}",
                    candidate,
                    output.status.code().unwrap_or(-1)
                );
                debug!(%kind, %candidate, %last_error, "run_probe: candidate failed");
            }
            Ok(Err(e)) => {
                last_error = format!("{} not found: {}", candidate, e);
                debug!(%kind, %candidate, %last_error, "run_probe: spawn failed");
            }
            Err(_) => {
                last_error = format!("{} --version timed out", candidate);
                debug!(%kind, %candidate, "run_probe: probe timed out");
            }
        }
    }

    warn!(%kind, %last_error, "run_probe: runtime unavailable");
    EnvironmentCheck::failed(format!("{} runtime unavailable: {}", kind, last_error))
}
