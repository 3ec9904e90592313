//! Pool configuration options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{CallbackError, PoolError, PoolResult};

/// Creates a fresh resource for the pool
pub type Factory<T> = Arc<dyn Fn() -> Result<T, CallbackError> + Send + Sync>;

/// Restores a resource to a clean state; also invoked (best effort) on destruction
pub type ResetFn<T> = Arc<dyn Fn(&mut T) -> Result<(), CallbackError> + Send + Sync>;

/// Checks a resource without changing it (validation and health checks)
pub type CheckFn<T> = Arc<dyn Fn(&T) -> Result<(), CallbackError> + Send + Sync>;

/// Configuration for object pool behavior
///
/// Cloning is cheap: the callbacks are reference counted.
///
/// # Examples
///
/// ```
/// use lifecycle_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new(|| Ok(Vec::<u8>::with_capacity(4096)))
///     .with_initial_size(2)
///     .with_max_size(16)
///     .with_min_size(1)
///     .with_max_idle_time(Duration::from_secs(60))
///     .with_reset(|buf| {
///         buf.clear();
///         Ok(())
///     });
///
/// assert_eq!(config.max_size, 16);
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfiguration<T> {
    /// Number of objects created when the pool is built
    pub initial_size: usize,

    /// Upper bound on objects in existence (available + checked out)
    pub max_size: usize,

    /// Idle cleanup never shrinks the pool below this many objects
    pub min_size: usize,

    /// Objects idle for longer than this are reset on checkout and evicted by cleanup
    pub max_idle_time: Duration,

    /// Creates new objects
    pub factory: Factory<T>,

    /// Optional reset hook
    pub reset: Option<ResetFn<T>>,

    /// Optional validation run on every checkout
    pub validate: Option<CheckFn<T>>,

    /// Optional periodic health check for idle objects
    pub health_check: Option<CheckFn<T>>,

    /// Period of the health check; required whenever `health_check` is set
    pub health_check_interval: Option<Duration>,
}

impl<T> Clone for PoolConfiguration<T> {
    fn clone(&self) -> Self {
        Self {
            initial_size: self.initial_size,
            max_size: self.max_size,
            min_size: self.min_size,
            max_idle_time: self.max_idle_time,
            factory: Arc::clone(&self.factory),
            reset: self.reset.clone(),
            validate: self.validate.clone(),
            health_check: self.health_check.clone(),
            health_check_interval: self.health_check_interval,
        }
    }
}

impl<T> fmt::Debug for PoolConfiguration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("initial_size", &self.initial_size)
            .field("max_size", &self.max_size)
            .field("min_size", &self.min_size)
            .field("max_idle_time", &self.max_idle_time)
            .field("reset", &self.reset.is_some())
            .field("validate", &self.validate.is_some())
            .field("health_check", &self.health_check.is_some())
            .field("health_check_interval", &self.health_check_interval)
            .finish_non_exhaustive()
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration around a factory, with default sizing
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<T, CallbackError> + Send + Sync + 'static,
    {
        Self {
            initial_size: 0,
            max_size: 100,
            min_size: 0,
            max_idle_time: Duration::from_secs(300),
            factory: Arc::new(factory),
            reset: None,
            validate: None,
            health_check: None,
            health_check_interval: None,
        }
    }

    /// Set the number of objects created up front
    pub fn with_initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    /// Set the maximum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use lifecycle_pool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new(|| Ok(0u32)).with_max_size(50);
    ///
    /// assert_eq!(config.max_size, 50);
    /// ```
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set the minimum size kept by idle cleanup
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the idle threshold
    pub fn with_max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time = idle;
        self
    }

    /// Set the reset hook
    pub fn with_reset<F>(mut self, reset: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.reset = Some(Arc::new(reset));
        self
    }

    /// Validate objects on checkout
    pub fn with_validation<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Enable periodic health checks of idle objects
    ///
    /// # Examples
    ///
    /// ```
    /// use lifecycle_pool::PoolConfiguration;
    /// use std::time::Duration;
    ///
    /// let config = PoolConfiguration::new(|| Ok(String::new()))
    ///     .with_health_check(Duration::from_secs(10), |s: &String| {
    ///         if s.len() < 1024 { Ok(()) } else { Err("too large".into()) }
    ///     });
    ///
    /// assert_eq!(config.health_check_interval, Some(Duration::from_secs(10)));
    /// ```
    pub fn with_health_check<F>(mut self, interval: Duration, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.health_check = Some(Arc::new(check));
        self.health_check_interval = Some(interval);
        self
    }

    /// Disable health checks
    pub fn without_health_check(mut self) -> Self {
        self.health_check = None;
        self.health_check_interval = None;
        self
    }

    /// Interval the health check runs at, `None` if disabled
    pub fn effective_health_check_interval(&self) -> Option<Duration> {
        self.health_check.as_ref().and(self.health_check_interval)
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_size == 0 {
            return Err(PoolError::InvalidConfig("max_size must be at least 1".into()));
        }
        if self.initial_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "initial_size {} exceeds max_size {}",
                self.initial_size, self.max_size
            )));
        }
        if self.min_size > self.max_size {
            return Err(PoolError::InvalidConfig(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        if self.max_idle_time.is_zero() {
            return Err(PoolError::InvalidConfig("max_idle_time must be positive".into()));
        }
        match (&self.health_check, self.health_check_interval) {
            (Some(_), Some(interval)) if interval.is_zero() => Err(PoolError::InvalidConfig(
                "health_check_interval must be positive".into(),
            )),
            (Some(_), None) => Err(PoolError::InvalidConfig(
                "health_check requires a health_check_interval".into(),
            )),
            (None, Some(_)) => Err(PoolError::InvalidConfig(
                "health_check_interval set without a health check".into(),
            )),
            _ => Ok(()),
        }
    }
}
