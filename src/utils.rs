use failure::Fail;
use std::{sync::atomic::{AtomicUsize, Ordering}, marker::PhantomData};

/// Structure holding possibly uninitialized data.
///
/// This differs from other similar types found on crates.io in that it doesn't
/// lock or synchronise access in any way, instead assuming it is safe to
/// initialize the value multiple times, and only keep one result.
#[derive(Debug)]
pub struct SingleInit<T> {
    cell: AtomicUsize,
    _type: PhantomData<T>,
}

impl<T> SingleInit<T> {
    /// Create a new uninitialized atomic cell.
    pub const fn uninit() -> Self {
        SingleInit {
            cell: AtomicUsize::new(0),
            _type: PhantomData,
        }
    }
}

impl<T> SingleInit<T>
where
    T: Sync,
    Self: 'static,
{
    /// Get stored value, or `None` if it hasn't been initialized yet.
    pub fn get(&self) -> Option<&'static T> {
        let ptr = self.cell.load(Ordering::Acquire);

        if ptr != 0 {
            Some(unsafe { &*(ptr as *const T) })
        } else {
            None
        }
    }

    /// Get stored value, initializing it if necessary.
    ///
    /// If initialisation function fails, the value will be unchanged and
    /// another attempt can be made later.
    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<&'static T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let value = Box::leak(Box::new(init()?)) as *mut T;

        match self.cell.compare_exchange(
            0, value as usize, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(unsafe { &*value }),
            Err(old) => {
                // Another thread was faster, keep its value.
                std::mem::drop(unsafe { Box::from_raw(value) });
                Ok(unsafe { &*(old as *const T) })
            }
        }
    }
}

/// Error returned when parsing a name of a fieldless enum fails.
#[derive(Debug, Fail)]
#[fail(display = "Unknown value: {}", _0)]
pub struct ParseNameError(pub String);
