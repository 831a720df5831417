use std::fmt;

/// Recommended maximum guest call depth if not otherwise specified.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Maximum nesting depth for container marshaling (lists inside lists, etc.).
///
/// Separate from the call depth limit. This protects against stack overflow when
/// converting deeply nested or self-referencing structures such as `a = []; a.append(a)`.
///
/// Lower in debug mode to avoid stack overflow (debug builds use more stack space
/// per call frame).
#[cfg(debug_assertions)]
pub const MAX_DATA_RECURSION_DEPTH: usize = 100;

/// Maximum nesting depth for container marshaling (lists inside lists, etc.).
///
/// Separate from the call depth limit. This protects against stack overflow
/// when converting deeply nested structures.
#[cfg(not(debug_assertions))]
pub const MAX_DATA_RECURSION_DEPTH: usize = 500;

/// Error returned when a resource limit is exceeded inside the guest runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of live heap objects exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum guest call depth exceeded.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Recursion { .. } => {
                write!(f, "maximum recursion depth exceeded")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Configurable limits for a guest runtime.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use `ResourceLimits::default()` for no limits at all, or `ResourceLimits::new()`
/// for the recommended defaults, then customise with the builder methods.
///
/// Limits can be loaded from any serde format:
///
/// ```
/// # use pyembed::ResourceLimits;
/// let limits: ResourceLimits = serde_json::from_str(r#"{"max_allocations": 64}"#).unwrap();
/// assert_eq!(limits.max_allocations, Some(64));
/// assert_eq!(limits.max_recursion_depth, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of live heap objects.
    pub max_allocations: Option<usize>,
    /// Maximum guest call depth.
    pub max_recursion_depth: Option<usize>,
    /// Maximum container nesting depth followed while marshaling values.
    pub max_data_depth: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with no allocation cap, a call depth of
    /// [`DEFAULT_MAX_RECURSION_DEPTH`] and a data depth of [`MAX_DATA_RECURSION_DEPTH`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_allocations: None,
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            max_data_depth: Some(MAX_DATA_RECURSION_DEPTH),
        }
    }

    /// Sets the maximum number of live heap objects.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum guest call depth.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = Some(limit);
        self
    }

    /// Sets the maximum container nesting depth followed while marshaling.
    #[must_use]
    pub fn max_data_depth(mut self, limit: usize) -> Self {
        self.max_data_depth = Some(limit);
        self
    }

    /// Effective data depth, falling back to [`MAX_DATA_RECURSION_DEPTH`].
    #[must_use]
    pub(crate) fn data_depth(&self) -> usize {
        self.max_data_depth.unwrap_or(MAX_DATA_RECURSION_DEPTH)
    }

    /// Checks a prospective allocation against `max_allocations`.
    pub(crate) fn check_allocation(&self, live: usize) -> Result<(), ResourceError> {
        match self.max_allocations {
            Some(limit) if live >= limit => Err(ResourceError::Allocation {
                limit,
                count: live + 1,
            }),
            _ => Ok(()),
        }
    }

    /// Checks a prospective call depth against `max_recursion_depth`.
    pub(crate) fn check_recursion(&self, depth: usize) -> Result<(), ResourceError> {
        match self.max_recursion_depth {
            Some(limit) if depth > limit => Err(ResourceError::Recursion { limit, depth }),
            _ => Ok(()),
        }
    }
}
