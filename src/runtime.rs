//! Framework detection and one-time library initialization.
//!
//! Nothing else in this crate is constructible before [`Library::init`]
//! succeeds: the [`Library`] handle it returns is a required argument of
//! every other entry point, so either the full API becomes available or
//! initialization fails with a diagnostic and no partial state.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{GanError, Result};

/// Minimum framework version this crate is known to work with.
pub const REQUIRED_FRAMEWORK_VERSION: &str = "0.17.0";

// burn exposes no runtime version symbol, so the linked version is pinned
// here and kept in step with Cargo.toml.
const LINKED_FRAMEWORK_VERSION: &str = "0.17.1";

const FRAMEWORK_NAME: &str = "burn";
const INSTALL_URL: &str = "https://burn.dev/getting-started";

/// Dotted-integer version, e.g. `"1.11.0"`.
///
/// Ordering is component-wise numeric, never lexicographic; missing trailing
/// components compare as zero, so `1.2` equals `1.2.0`.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl FromStr for Version {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self> {
        let components = s
            .trim()
            .split('.')
            .map(|c| c.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| GanError::InvalidVersion(s.to_string()))?;
        if components.is_empty() {
            return Err(GanError::InvalidVersion(s.to_string()));
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Capability to report the host framework's presence and version string.
///
/// The default probe describes the burn build this crate links against;
/// tests inject fakes to exercise the failure paths.
pub trait FrameworkProbe {
    fn name(&self) -> &str;

    /// The framework's version string, or `None` when it is absent.
    fn version(&self) -> Option<String>;
}

/// Probe describing the burn build this crate links against.
#[derive(Debug, Default)]
pub struct LinkedFramework;

impl FrameworkProbe for LinkedFramework {
    fn name(&self) -> &str {
        FRAMEWORK_NAME
    }

    fn version(&self) -> Option<String> {
        Some(LINKED_FRAMEWORK_VERSION.to_string())
    }
}

/// Handle proving the framework check passed.
#[derive(Debug)]
pub struct Library {
    framework_version: Version,
}

static LIBRARY: OnceLock<Result<Library>> = OnceLock::new();

impl Library {
    /// Runs the framework check exactly once and returns the shared handle.
    ///
    /// Repeated calls return the memoized outcome without re-probing.
    pub fn init() -> Result<&'static Library> {
        match LIBRARY.get_or_init(|| Self::check(&LinkedFramework)) {
            Ok(lib) => Ok(lib),
            Err(err) => Err(err.clone()),
        }
    }

    /// Runs the framework check against an injected probe.
    ///
    /// Unlike [`init`](Self::init) the outcome is not memoized; each call
    /// yields an independent handle.
    pub fn init_with(probe: &dyn FrameworkProbe) -> Result<Library> {
        Self::check(probe)
    }

    fn check(probe: &dyn FrameworkProbe) -> Result<Library> {
        let name = probe.name().to_string();
        let Some(raw) = probe.version() else {
            return Err(GanError::FrameworkMissing {
                name,
                install_url: INSTALL_URL.to_string(),
            });
        };
        let detected: Version = raw.parse()?;
        let required: Version = REQUIRED_FRAMEWORK_VERSION.parse()?;
        if detected < required {
            return Err(GanError::FrameworkTooOld {
                name,
                required: REQUIRED_FRAMEWORK_VERSION.to_string(),
                detected: raw,
            });
        }
        debug!(framework = %name, version = %detected, "framework check passed");
        Ok(Library {
            framework_version: detected,
        })
    }

    /// Version of the framework the check detected.
    pub fn framework_version(&self) -> &Version {
        &self.framework_version
    }
}
