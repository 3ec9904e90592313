//! Core object pool implementation

use crate::config::{PoolConfiguration, ResetFn};
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::instance::PooledInstance;
use crate::maintenance::{self, Cadence, MAINTENANCE_BATCH};
use crate::metrics::{MetricsTracker, PoolStats};

use crossbeam::queue::ArrayQueue;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// What may cut an acquisition short
#[derive(Clone, Copy)]
enum Interrupt<'a> {
    Never,
    Token(&'a CancellationToken),
    Deadline(Instant),
}

impl Interrupt<'_> {
    fn check(&self) -> PoolResult<()> {
        match self {
            Interrupt::Never => Ok(()),
            Interrupt::Token(token) if token.is_cancelled() => Err(PoolError::Cancelled),
            Interrupt::Deadline(deadline) if Instant::now() >= *deadline => {
                Err(PoolError::DeadlineExceeded)
            }
            _ => Ok(()),
        }
    }
}

/// A pooled object that returns to its pool when dropped
pub struct PooledObject<T: Send + 'static> {
    instance: Option<PooledInstance<T>>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> PooledObject<T> {
    fn instance(&self) -> &PooledInstance<T> {
        self.instance.as_ref().expect("Value already taken")
    }

    /// When the underlying resource was created
    pub fn created_at(&self) -> Instant {
        self.instance().created_at()
    }

    /// When this object was checked out
    pub fn last_used_at(&self) -> Instant {
        self.instance().last_used_at()
    }

    /// How many times the underlying resource has been checked out
    pub fn use_count(&self) -> usize {
        self.instance().use_count()
    }

    /// Take the resource out of the pool for good
    ///
    /// The pool forgets the object: it counts as destroyed, but the reset
    /// hook is not run.
    pub fn detach(mut self) -> T {
        let instance = self.instance.take().expect("Value already taken");
        self.pool.metrics.in_use.fetch_sub(1, Ordering::AcqRel);
        self.pool.metrics.record_destroyed();
        trace!("pooled object detached");
        instance.into_resource()
    }
}

impl<T: Send + 'static> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.instance().resource
    }
}

impl<T: Send + 'static> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.instance.as_mut().expect("Value already taken").resource
    }
}

impl<T: Send + 'static> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => f
                .debug_struct("PooledObject")
                .field("resource", &instance.resource)
                .field("use_count", &instance.use_count())
                .finish(),
            None => f.write_str("PooledObject(<detached>)"),
        }
    }
}

/// State shared by the pool handle, its checked-out objects and the
/// maintenance task
pub(crate) struct PoolInner<T> {
    config: RwLock<PoolConfiguration<T>>,
    /// Only pushed to and popped from under the read lock; the write lock is
    /// taken solely to swap in a queue of a different capacity.
    store: RwLock<ArrayQueue<PooledInstance<T>>>,
    pub(crate) metrics: MetricsTracker,
    closed: AtomicBool,
    /// Serializes resizes and configuration application
    resize_lock: Mutex<()>,
    updates: mpsc::UnboundedSender<PoolConfiguration<T>>,
    shutdown: CancellationToken,
}

impl<T: Send + 'static> PoolInner<T> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn config_snapshot(&self) -> PoolConfiguration<T> {
        self.config.read().clone()
    }

    fn reset_fn(&self) -> Option<ResetFn<T>> {
        self.config.read().reset.clone()
    }

    fn max_size(&self) -> usize {
        self.config.read().max_size
    }

    fn take(&self) -> Option<PooledInstance<T>> {
        let instance = self.store.read().pop()?;
        self.metrics.available.fetch_sub(1, Ordering::AcqRel);
        Some(instance)
    }

    fn put(&self, instance: PooledInstance<T>) -> Result<(), PooledInstance<T>> {
        // Count first so `available` never dips below the real store length.
        self.metrics.available.fetch_add(1, Ordering::AcqRel);
        self.store.read().push(instance).inspect_err(|_| {
            self.metrics.available.fetch_sub(1, Ordering::AcqRel);
        })
    }

    fn take_batch(&self) -> Vec<PooledInstance<T>> {
        let mut batch = Vec::new();
        while batch.len() < MAINTENANCE_BATCH {
            match self.take() {
                Some(instance) => batch.push(instance),
                None => break,
            }
        }
        batch
    }

    /// Run the factory for a slot already claimed with `try_reserve`.
    fn create(&self, config: &PoolConfiguration<T>) -> PoolResult<PooledInstance<T>> {
        match (config.factory)() {
            Ok(resource) => {
                self.metrics.record_created();
                Ok(PooledInstance::new(resource))
            }
            Err(err) => {
                self.metrics.cancel_reservation();
                warn!(error = %err, "factory failed to create pooled object");
                Err(PoolError::create_failed(err))
            }
        }
    }

    /// Tear an object down without touching the size counters.
    fn dispose(&self, mut instance: PooledInstance<T>, reset: Option<&ResetFn<T>>, reason: &str) {
        if let Some(reset) = reset
            && let Err(err) = reset(&mut instance.resource)
        {
            warn!(error = %err, reason, "reset failed while destroying pooled object");
        }
        debug!(reason, uses = instance.use_count(), "destroyed pooled object");
    }

    fn destroy(&self, instance: PooledInstance<T>, reset: Option<&ResetFn<T>>, reason: &str) {
        self.dispose(instance, reset, reason);
        self.metrics.record_destroyed();
    }

    fn drain_all(&self) -> usize {
        let reset = self.reset_fn();
        let mut destroyed = 0;
        while let Some(instance) = self.take() {
            self.destroy(instance, reset.as_ref(), "pool closed");
            destroyed += 1;
        }
        destroyed
    }

    /// Create one object into the store while the pool stays below `limit`.
    ///
    /// Returns `Ok(false)` once no more objects fit. Stops with `Closed` as
    /// soon as the pool is closed; an object created meanwhile is destroyed.
    fn grow(&self, config: &PoolConfiguration<T>, limit: usize) -> PoolResult<bool> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        if !self.metrics.try_reserve(limit) {
            return Ok(false);
        }
        let instance = self.create(config)?;
        if self.is_closed() {
            self.destroy(instance, config.reset.as_ref(), "pool closed");
            return Err(PoolError::Closed);
        }
        if let Err(instance) = self.put(instance) {
            self.destroy(instance, config.reset.as_ref(), "store full");
            return Ok(false);
        }
        // Close may have drained the store between our check and the push.
        if self.is_closed() {
            self.drain_all();
            return Err(PoolError::Closed);
        }
        Ok(true)
    }

    fn populate(&self, config: &PoolConfiguration<T>) -> PoolResult<()> {
        for _ in 0..config.initial_size {
            if !self.grow(config, config.max_size)? {
                break;
            }
        }
        Ok(())
    }

    /// Put back objects a maintenance pass kept, unless the pool closed
    /// while the pass was running.
    fn requeue(&self, instance: PooledInstance<T>, reset: Option<&ResetFn<T>>) {
        if self.is_closed() {
            self.destroy(instance, reset, "pool closed");
            return;
        }
        if let Err(instance) = self.put(instance) {
            self.destroy(instance, reset, "store full");
        }
    }

    fn acquire(self: &Arc<Self>, interrupt: Interrupt<'_>) -> PoolResult<PooledObject<T>> {
        let config = self.config_snapshot();
        loop {
            if self.is_closed() {
                return Err(PoolError::Closed);
            }
            interrupt.check()?;

            let Some(instance) = self.take() else {
                if !self.metrics.try_reserve(config.max_size) {
                    trace!(max_size = config.max_size, "pool exhausted");
                    return Err(PoolError::Exhausted);
                }
                let instance = self.create(&config)?;
                return Ok(self.check_out(instance));
            };

            // A rejected object is destroyed; the store shrinks, so this loop
            // ends in the create-or-exhaust branch at the latest.
            if let Some(instance) = self.prepare(instance, &config) {
                return Ok(self.check_out(instance));
            }
        }
    }

    fn prepare(
        &self,
        mut instance: PooledInstance<T>,
        config: &PoolConfiguration<T>,
    ) -> Option<PooledInstance<T>> {
        if instance.is_idle(Instant::now(), config.max_idle_time)
            && let Some(reset) = &config.reset
        {
            if let Err(err) = reset(&mut instance.resource) {
                debug!(error = %err, "reset of idle object failed");
                self.destroy(instance, None, "reset failed");
                return None;
            }
            self.metrics.record_reset();
        }

        if let Some(validate) = &config.validate
            && let Err(err) = validate(&instance.resource)
        {
            debug!(error = %err, "object failed validation");
            self.destroy(instance, config.reset.as_ref(), "validation failed");
            return None;
        }

        Some(instance)
    }

    fn check_out(self: &Arc<Self>, instance: PooledInstance<T>) -> PooledObject<T> {
        let uses = instance.mark_checked_out(Instant::now());
        self.metrics.in_use.fetch_add(1, Ordering::AcqRel);
        self.metrics.record_usage(uses);
        trace!(uses, "pooled object checked out");
        PooledObject {
            instance: Some(instance),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, instance: PooledInstance<T>) {
        let (max_idle, max_size, reset) = {
            let config = self.config.read();
            (config.max_idle_time, config.max_size, config.reset.clone())
        };

        let now = Instant::now();
        let checked_out_at = instance.mark_returned(now);
        self.metrics.in_use.fetch_sub(1, Ordering::AcqRel);

        if self.is_closed() {
            self.destroy(instance, reset.as_ref(), "pool closed");
            return;
        }
        // Measured against the checkout stamp, not the one just written.
        if now.saturating_duration_since(checked_out_at) > max_idle {
            self.destroy(instance, reset.as_ref(), "held past idle threshold");
            return;
        }
        if self.metrics.current_size.load(Ordering::Acquire) > max_size {
            self.destroy(instance, reset.as_ref(), "pool above max size");
            return;
        }

        match self.put(instance) {
            Ok(()) => {
                trace!("pooled object returned");
                // Close may have drained the store between our check and the push.
                if self.is_closed() {
                    self.drain_all();
                }
            }
            Err(instance) => self.destroy(instance, reset.as_ref(), "store full"),
        }
    }

    fn resize(&self, target: usize) -> PoolResult<()> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        let _guard = self.resize_lock.lock();
        let config = self.config_snapshot();
        if target < config.min_size || target > config.max_size {
            return Err(PoolError::InvalidRange {
                requested: target,
                min: config.min_size,
                max: config.max_size,
            });
        }

        let mut created = 0usize;
        while self.grow(&config, target)? {
            created += 1;
        }

        let mut destroyed = 0usize;
        while self.metrics.current_size.load(Ordering::Acquire) > target {
            // Checked-out objects are never reclaimed; stop at what is idle.
            let Some(instance) = self.take() else { break };
            self.destroy(instance, config.reset.as_ref(), "resize");
            destroyed += 1;
        }

        debug!(
            target,
            created,
            destroyed,
            size = self.metrics.current_size.load(Ordering::Acquire),
            "pool resized"
        );
        Ok(())
    }

    /// Replace the active configuration. Called by the maintenance task only.
    pub(crate) fn apply_config(&self, config: PoolConfiguration<T>) {
        let _guard = self.resize_lock.lock();
        let reset = config.reset.clone();
        let max_size = config.max_size;
        let previous = std::mem::replace(&mut *self.config.write(), config);

        let mut excess = Vec::new();
        if previous.max_size != max_size {
            let mut store = self.store.write();
            let resized = ArrayQueue::new(max_size);
            while let Some(instance) = store.pop() {
                if let Err(instance) = resized.push(instance) {
                    excess.push(instance);
                }
            }
            *store = resized;
        }

        self.metrics.available.fetch_sub(excess.len(), Ordering::AcqRel);
        let shrunk = excess.len();
        for instance in excess {
            self.destroy(instance, reset.as_ref(), "above new max size");
        }
        debug!(
            max_size,
            previous_max_size = previous.max_size,
            destroyed = shrunk,
            "pool configuration applied"
        );
    }

    /// Evict objects idle past the threshold, never going below `min_size`.
    pub(crate) fn evict_idle(&self) {
        let (max_idle, min_size, reset) = {
            let config = self.config.read();
            (config.max_idle_time, config.min_size, config.reset.clone())
        };

        let now = Instant::now();
        let mut evicted = 0usize;
        for instance in self.take_batch() {
            if instance.is_idle(now, max_idle) && self.metrics.try_retire(min_size) {
                self.dispose(instance, reset.as_ref(), "idle");
                evicted += 1;
            } else {
                self.requeue(instance, reset.as_ref());
            }
        }
        if self.is_closed() {
            self.drain_all();
        }
        if evicted > 0 {
            debug!(evicted, "idle cleanup finished");
        }
    }

    /// Destroy idle objects that fail the configured health check.
    pub(crate) fn run_health_check(&self) {
        let (check, reset) = {
            let config = self.config.read();
            (config.health_check.clone(), config.reset.clone())
        };
        let Some(check) = check else { return };

        let mut failed = 0usize;
        for instance in self.take_batch() {
            if let Err(err) = check(&instance.resource) {
                debug!(error = %err, "object failed health check");
                self.destroy(instance, reset.as_ref(), "health check failed");
                failed += 1;
            } else {
                self.requeue(instance, reset.as_ref());
            }
        }
        if self.is_closed() {
            self.drain_all();
        }
        if failed > 0 {
            debug!(failed, "health check finished");
        }
    }
}

impl<T> Drop for PoolInner<T> {
    fn drop(&mut self) {
        let reset = self.config.get_mut().reset.clone();
        while let Some(mut instance) = self.store.get_mut().pop() {
            if let Some(reset) = &reset {
                let _ = reset(&mut instance.resource);
            }
        }
    }
}

/// Thread-safe object pool with bounded size and background maintenance
///
/// Objects are created on demand up to `max_size`. When the pool is at its
/// maximum and every object is checked out, acquisition fails fast with
/// [`PoolError::Exhausted`] instead of waiting.
///
/// # Examples
///
/// ```
/// use lifecycle_pool::{ObjectPool, PoolConfiguration, PoolError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = PoolConfiguration::new(|| Ok(String::with_capacity(64)))
///     .with_max_size(1)
///     .with_reset(|s| {
///         s.clear();
///         Ok(())
///     });
/// let pool = ObjectPool::new(config).unwrap();
///
/// let mut buffer = pool.acquire().unwrap();
/// buffer.push_str("hello");
/// assert!(matches!(pool.acquire(), Err(PoolError::Exhausted)));
///
/// pool.release(buffer);
/// assert_eq!(pool.stats().available, 1);
/// # }
/// ```
pub struct ObjectPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> ObjectPool<T> {
    /// Create a pool, pre-populate `initial_size` objects and start maintenance
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: PoolConfiguration<T>) -> PoolResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let (updates, inbox) = mpsc::unbounded_channel();
        let cadence = Cadence::of(&config);
        let inner = Arc::new(PoolInner {
            store: RwLock::new(ArrayQueue::new(config.max_size)),
            config: RwLock::new(config.clone()),
            metrics: MetricsTracker::new(),
            closed: AtomicBool::new(false),
            resize_lock: Mutex::new(()),
            updates,
            shutdown: CancellationToken::new(),
        });

        if let Err(err) = inner.populate(&config) {
            inner.closed.store(true, Ordering::Release);
            inner.drain_all();
            return Err(err);
        }

        let maintenance = maintenance::spawn(
            &runtime,
            Arc::downgrade(&inner),
            inbox,
            inner.shutdown.clone(),
            cadence,
        );
        debug!(
            initial_size = config.initial_size,
            max_size = config.max_size,
            "object pool created"
        );
        Ok(Self {
            inner,
            maintenance: Mutex::new(Some(maintenance)),
        })
    }

    /// Get an object, creating one if the store is empty and there is room
    pub fn acquire(&self) -> PoolResult<PooledObject<T>> {
        self.inner.acquire(Interrupt::Never)
    }

    /// Get an object unless `cancel` has fired
    ///
    /// Cancellation is observed between attempts; a factory call already in
    /// progress runs to completion.
    pub fn acquire_with(&self, cancel: &CancellationToken) -> PoolResult<PooledObject<T>> {
        self.inner.acquire(Interrupt::Token(cancel))
    }

    /// Get an object unless `deadline` has passed
    pub fn acquire_before(&self, deadline: Instant) -> PoolResult<PooledObject<T>> {
        self.inner.acquire(Interrupt::Deadline(deadline))
    }

    /// Get an object, giving up once `timeout` has elapsed
    pub fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledObject<T>> {
        self.acquire_before(Instant::now() + timeout)
    }

    /// Return an object to the pool
    ///
    /// Equivalent to dropping it. Objects that can not be re-admitted are
    /// destroyed; no error is reported.
    pub fn release(&self, object: PooledObject<T>) {
        drop(object);
    }

    /// Grow or shrink the pool to `target` objects
    ///
    /// Shrinking only destroys idle objects, so the pool may stay above
    /// `target` while objects are checked out.
    pub fn resize(&self, target: usize) -> PoolResult<()> {
        self.inner.resize(target)
    }

    /// Validate and queue a new configuration
    ///
    /// Returns once the update is queued; the maintenance task applies it.
    pub fn update_config(&self, config: PoolConfiguration<T>) -> PoolResult<()> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        config.validate()?;
        self.inner
            .updates
            .send(config)
            .map_err(|_| PoolError::Closed)
    }

    /// Close the pool and destroy all idle objects
    ///
    /// Waits for a running maintenance pass to finish before draining.
    /// Closing twice is a no-op. If this takes longer than `timeout`,
    /// [`PoolError::DeadlineExceeded`] is returned and draining continues in
    /// the background. Objects still checked out are destroyed when released.
    pub async fn close(&self, timeout: Duration) -> PoolResult<()> {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        self.inner.shutdown.cancel();

        let maintenance = self.maintenance.lock().take();
        let inner = Arc::clone(&self.inner);
        let drain = tokio::spawn(async move {
            if let Some(maintenance) = maintenance
                && let Err(err) = maintenance.await
            {
                warn!(error = %err, "maintenance task failed");
            }
            tokio::task::spawn_blocking(move || inner.drain_all()).await
        });
        match tokio::time::timeout(timeout, drain).await {
            Ok(Ok(Ok(destroyed))) => {
                debug!(destroyed, "object pool closed");
                Ok(())
            }
            Ok(Ok(Err(err)) | Err(err)) => {
                warn!(error = %err, "drain task failed while closing pool");
                Ok(())
            }
            Err(_) => {
                warn!(?timeout, "closing pool exceeded deadline, draining in background");
                Err(PoolError::DeadlineExceeded)
            }
        }
    }

    /// Number of objects in existence
    pub fn len(&self) -> usize {
        self.inner.metrics.current_size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.inner.metrics.available.load(Ordering::Acquire)
    }

    /// Get checked-out count
    pub fn in_use_count(&self) -> usize {
        self.inner.metrics.in_use.load(Ordering::Acquire)
    }

    /// Snapshot of the pool metrics
    pub fn stats(&self) -> PoolStats {
        self.inner.metrics.snapshot(self.inner.max_size())
    }

    /// Current configuration
    pub fn config(&self) -> PoolConfiguration<T> {
        self.inner.config_snapshot()
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::new(&self.stats(), self.is_closed())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.stats().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "prometheus")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> prometheus::Result<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.stats(), pool_name, tags)
    }
}

impl<T: Send + 'static> Drop for ObjectPool<T> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl<T: Send + 'static> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CallbackError;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn counting_config(max_size: usize) -> (PoolConfiguration<usize>, Arc<AtomicUsize>) {
        let next = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&next);
        let config = PoolConfiguration::new(move || Ok(counter.fetch_add(1, Ordering::SeqCst)))
            .with_max_size(max_size)
            .with_max_idle_time(Duration::from_secs(60));
        (config, next)
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let (config, _) = counting_config(2);
        assert!(matches!(ObjectPool::new(config), Err(PoolError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_object_pool_basic() {
        let (config, _) = counting_config(3);
        let pool = ObjectPool::new(config.with_initial_size(3)).unwrap();

        {
            let obj = pool.acquire().unwrap();
            assert!([0, 1, 2].contains(&*obj));
            assert_eq!(obj.use_count(), 1);
        }

        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.in_use_count(), 0);
    }

    #[tokio::test]
    async fn test_grows_until_exhausted() {
        let (config, created) = counting_config(2);
        let pool = ObjectPool::new(config).unwrap();

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(matches!(pool.acquire(), Err(PoolError::Exhausted)));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.len(), 2);

        drop(a);
        let c = pool.acquire().unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
        drop((b, c));
    }

    #[tokio::test]
    async fn test_initial_population_failure_cleans_up() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&made);
        let config = PoolConfiguration::new(move || -> Result<u8, CallbackError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 2 {
                Err("boom".into())
            } else {
                Ok(1)
            }
        })
        .with_max_size(5)
        .with_initial_size(4);

        let err = ObjectPool::new(config).unwrap_err();
        assert!(matches!(err, PoolError::CreateFailed(_)));
    }

    #[tokio::test]
    async fn test_factory_failure_surfaces() {
        let config = PoolConfiguration::<u8>::new(|| Err("no backend".into())).with_max_size(2);
        let pool = ObjectPool::new(config).unwrap();

        match pool.acquire() {
            Err(PoolError::CreateFailed(cause)) => assert_eq!(cause.to_string(), "no backend"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.stats().total_created, 0);
    }

    #[tokio::test]
    async fn test_validation_failure_destroys_and_retries() {
        let (config, created) = counting_config(4);
        // Only objects with an even id pass.
        let config = config
            .with_initial_size(1)
            .with_validation(|id| if id % 2 == 0 { Ok(()) } else { Err("odd".into()) });
        let pool = ObjectPool::new(config).unwrap();

        let a = pool.acquire().unwrap();
        assert_eq!(*a, 0);
        let b = pool.acquire().unwrap();
        assert_eq!(*b, 1, "fresh objects skip validation");
        drop(b);

        let c = pool.acquire().unwrap();
        assert_eq!(*c, 2);
        let stats = pool.stats();
        assert_eq!(stats.total_destroyed, 1);
        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(stats.total_created - stats.total_destroyed, stats.current_size);
    }

    #[tokio::test]
    async fn test_cancelled_and_deadline() {
        let (config, _) = counting_config(2);
        let pool = ObjectPool::new(config).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(pool.acquire_with(&token), Err(PoolError::Cancelled)));

        let past = Instant::now() - Duration::from_millis(1);
        assert!(matches!(pool.acquire_before(past), Err(PoolError::DeadlineExceeded)));

        assert!(pool.acquire_timeout(Duration::from_secs(5)).is_ok());
        assert!(pool.acquire_with(&CancellationToken::new()).is_ok());
    }

    #[tokio::test]
    async fn test_resize_round_trip() {
        let (config, _) = counting_config(10);
        let pool = ObjectPool::new(config.with_initial_size(2).with_min_size(1)).unwrap();

        pool.resize(6).unwrap();
        assert_eq!(pool.len(), 6);
        assert_eq!(pool.available_count(), 6);

        pool.resize(2).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.current_size, 2);
        assert_eq!(stats.total_created, 6);
        assert_eq!(stats.total_destroyed, 4);
    }

    #[tokio::test]
    async fn test_resize_rejects_out_of_range() {
        let (config, _) = counting_config(4);
        let pool = ObjectPool::new(config.with_min_size(1)).unwrap();

        assert!(matches!(
            pool.resize(5),
            Err(PoolError::InvalidRange { requested: 5, min: 1, max: 4 })
        ));
        assert!(matches!(pool.resize(0), Err(PoolError::InvalidRange { .. })));
        assert_eq!(pool.len(), 0);
    }

    #[tokio::test]
    async fn test_resize_keeps_checked_out_objects() {
        let (config, _) = counting_config(4);
        let pool = ObjectPool::new(config.with_initial_size(4)).unwrap();
        let held: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();

        pool.resize(1).unwrap();

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.available_count(), 0);
        drop(held);
        assert_eq!(pool.available_count(), 3);
    }

    #[tokio::test]
    async fn test_resize_growth_failure_surfaces() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&made);
        let config = PoolConfiguration::new(move || -> Result<u8, CallbackError> {
            if counter.fetch_add(1, Ordering::SeqCst) >= 2 {
                Err("quota".into())
            } else {
                Ok(0)
            }
        })
        .with_max_size(5);
        let pool = ObjectPool::new(config).unwrap();

        assert!(matches!(pool.resize(4), Err(PoolError::CreateFailed(_))));
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_release_after_close_destroys() {
        let resets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resets);
        let (config, _) = counting_config(3);
        let pool = ObjectPool::new(config.with_initial_size(2).with_reset(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();

        let held = pool.acquire().unwrap();
        pool.close(Duration::from_secs(5)).await.unwrap();
        assert_eq!(pool.stats().total_destroyed, 1);
        assert!(matches!(pool.acquire(), Err(PoolError::Closed)));

        pool.release(held);
        let stats = pool.stats();
        assert_eq!(stats.total_destroyed, 2);
        assert_eq!(stats.available, 0);
        assert_eq!(stats.current_size, 0);
        assert_eq!(resets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_twice_is_noop() {
        let (config, _) = counting_config(3);
        let pool = ObjectPool::new(config.with_initial_size(3)).unwrap();

        assert!(pool.close(Duration::from_secs(5)).await.is_ok());
        assert!(pool.close(Duration::from_secs(5)).await.is_ok());
        assert_eq!(pool.stats().total_destroyed, 3);
        assert!(matches!(pool.resize(1), Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn test_close_deadline_exceeded() {
        let config = PoolConfiguration::new(|| Ok(0u8))
            .with_initial_size(2)
            .with_max_size(2)
            .with_reset(|_| {
                std::thread::sleep(std::time::Duration::from_millis(200));
                Ok(())
            });
        let pool = ObjectPool::new(config).unwrap();

        assert!(matches!(
            pool.close(Duration::from_millis(10)).await,
            Err(PoolError::DeadlineExceeded)
        ));
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_detach_leaves_pool_accounting_balanced() {
        let (config, _) = counting_config(2);
        let pool = ObjectPool::new(config.with_initial_size(1)).unwrap();

        let value = pool.acquire().unwrap().detach();
        assert_eq!(value, 0);

        let stats = pool.stats();
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.total_created - stats.total_destroyed, stats.current_size);
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid() {
        let (config, _) = counting_config(2);
        let pool = ObjectPool::new(config.clone()).unwrap();

        assert!(matches!(
            pool.update_config(config.with_max_size(0)),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_update_config_after_close_rejected() {
        let (config, _) = counting_config(2);
        let pool = ObjectPool::new(config.clone()).unwrap();

        pool.close(Duration::from_secs(5)).await.unwrap();
        assert!(matches!(pool.update_config(config), Err(PoolError::Closed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_waits_for_running_health_check() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let (config, _) = counting_config(3);
        let pool = ObjectPool::new(config.with_initial_size(3).with_health_check(
            Duration::from_millis(20),
            move |_| {
                flag.store(true, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(100));
                Ok(())
            },
        ))
        .unwrap();

        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        pool.close(Duration::from_secs(5)).await.unwrap();

        let stats = pool.stats();
        assert_eq!(stats.available, 0);
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.total_destroyed, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_stops_growing_resize() {
        let config = PoolConfiguration::new(|| {
            std::thread::sleep(std::time::Duration::from_millis(100));
            Ok(0u8)
        })
        .with_max_size(8);
        let pool = Arc::new(ObjectPool::new(config).unwrap());

        let grower = Arc::clone(&pool);
        let resize = tokio::task::spawn_blocking(move || grower.resize(4));
        tokio::time::sleep(Duration::from_millis(150)).await;
        pool.close(Duration::from_secs(5)).await.unwrap();

        assert!(matches!(resize.await.unwrap(), Err(PoolError::Closed)));
        let stats = pool.stats();
        assert_eq!(stats.current_size, 0);
        assert_eq!(stats.available, 0);
        assert_eq!(stats.total_created, stats.total_destroyed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exclusive_ownership() {
        let (config, _) = counting_config(6);
        let pool = Arc::new(ObjectPool::new(config).unwrap());
        let holders = Arc::new(Mutex::new(HashSet::new()));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let pool = Arc::clone(&pool);
                let holders = Arc::clone(&holders);
                scope.spawn(move || {
                    for _ in 0..2_000 {
                        match pool.acquire() {
                            Ok(obj) => {
                                assert!(holders.lock().insert(*obj), "object handed out twice");
                                std::hint::spin_loop();
                                assert!(holders.lock().remove(&*obj));
                                pool.release(obj);
                            }
                            Err(PoolError::Exhausted) => std::thread::yield_now(),
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                });
            }
        });

        let stats = pool.stats();
        assert!(stats.current_size <= 6);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.available, stats.current_size);
        assert_eq!(stats.total_created - stats.total_destroyed, stats.current_size);
    }
}
