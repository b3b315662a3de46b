use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for a [`WorkloadID`].
const WORKLOAD_ID_MAX_LEN: usize = 255;

/// Length of the shortened identifier shown in tables and used for discovered workloads.
pub const SHORT_ID_LEN: usize = 12;

/// A validated workload identifier.
///
/// This is either a full or short container id, or a name the user asked for
/// explicitly. Clones are cheap.
///
/// # Examples
///
/// ```
/// # use creo_stats::workload::WorkloadID;
/// let raw_id = "b95a83497c9161c9b444e3d70e1a9dfba0c1840d41720e146a95a08ebf938afc";
/// let id = WorkloadID::new(raw_id).unwrap();
/// assert_eq!(id.short().as_ref(), "b95a83497c91");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadID(Arc<str>);

impl WorkloadID {
    /// Creates a new `WorkloadID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkloadID`] if the input is empty or its length exceeds
    /// [`WORKLOAD_ID_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > WORKLOAD_ID_MAX_LEN {
            return Err(Error::InvalidWorkloadID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// Returns the identifier shortened to [`SHORT_ID_LEN`] characters.
    pub fn short(&self) -> Self {
        let short = truncate_id(&self.0);
        if short.len() == self.0.len() {
            self.clone()
        } else {
            Self(short.into())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for WorkloadID {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for WorkloadID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for WorkloadID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shortens an identifier for display, after dropping a digest algorithm prefix
/// such as `sha256:`.
///
/// ```
/// # use creo_stats::workload::truncate_id;
/// assert_eq!(truncate_id("sha256:0123456789abcdef0123"), "0123456789ab");
/// assert_eq!(truncate_id("short"), "short");
/// ```
pub fn truncate_id(id: &str) -> &str {
    let id = id.split_once(':').map_or(id, |(_, rest)| rest);
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// The platform family reported by the daemon.
///
/// It selects the calculation path for raw counters and the column set used when
/// rendering, and is decided once per engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsFamily {
    #[default]
    Linux,
    Windows,
}

impl OsFamily {
    pub fn is_windows(self) -> bool {
        matches!(self, OsFamily::Windows)
    }
}

impl FromStr for OsFamily {
    type Err = Error;

    /// Parses the daemon's `Os`/`Ostype` value.
    ///
    /// Every non-Windows family is accounted through cgroups, so anything other than
    /// `windows` maps to [`OsFamily::Linux`]. Only an empty value is rejected.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(Error::UnknownOsFamily(s.to_owned())),
            os if os.eq_ignore_ascii_case("windows") => Ok(OsFamily::Windows),
            _ => Ok(OsFamily::Linux),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Linux => f.write_str("linux"),
            OsFamily::Windows => f.write_str("windows"),
        }
    }
}
