use std::sync::{Mutex, OnceLock, PoisonError};

/// A per-instance "compute once, cache forever" slot.
///
/// The value is computed by the closure handed to the first successful
/// `get_or_*` call. Concurrent callers serialize on the cell's own mutex, so
/// the closure runs at most once per cell even under contention. Unrelated
/// cells never share a lock.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use spdm_util::CachedProperty;
///
/// let calls = AtomicUsize::new(0);
/// let cell = CachedProperty::new();
///
/// let v = cell.get_or_init(|| {
///     calls.fetch_add(1, Ordering::SeqCst);
///     "profile"
/// });
/// assert_eq!(*v, "profile");
/// cell.get_or_init(|| unreachable!());
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
#[derive(Debug)]
pub struct CachedProperty<T> {
    value: OnceLock<T>,
    lock: Mutex<()>,
}

impl<T> Default for CachedProperty<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CachedProperty<T> {
    pub const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// The cached value, if it has been computed.
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn is_computed(&self) -> bool {
        self.value.get().is_some()
    }

    pub fn get_or_init<F>(&self, f: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(f())) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_init`](Self::get_or_init) but only successes are cached;
    /// an error is returned to the caller and the next call retries.
    pub fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        let v = f()?;
        Ok(self.value.get_or_init(|| v))
    }

    /// Drop the cached value so the next access recomputes it.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T: Clone> Clone for CachedProperty<T> {
    fn clone(&self) -> Self {
        let out = Self::new();
        if let Some(v) = self.value.get() {
            let _ = out.value.set(v.clone());
        }
        out
    }
}

/// A lazily initialized value.
pub struct Lazy<T, F = fn() -> T>
where
    F: Fn() -> T,
{
    cell: CachedProperty<T>,
    init: F,
}

impl<T, F> Lazy<T, F>
where
    F: Fn() -> T,
{
    pub fn new(init: F) -> Self {
        Self {
            cell: CachedProperty::new(),
            init,
        }
    }

    /// Get the value, initializing it if necessary.
    pub fn get(&self) -> &T {
        self.cell.get_or_init(&self.init)
    }

    pub fn is_computed(&self) -> bool {
        self.cell.is_computed()
    }
}

/// Shorthand for [`Lazy::new`].
///
/// ```
/// use spdm_util::lazy;
///
/// let shape = lazy(|| vec![129usize, 129]);
/// assert_eq!(shape.get().len(), 2);
/// ```
pub fn lazy<T, F>(f: F) -> Lazy<T, F>
where
    F: Fn() -> T,
{
    Lazy::new(f)
}
