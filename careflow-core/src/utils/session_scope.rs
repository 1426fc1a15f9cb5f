use careflow_common::prelude::*;

/// A downstream session (HTTP client with credentials, database connection, ...) owned by one
/// handler invocation.
pub trait ScopedResource {
    /// Called exactly once when the owning scope ends.
    fn release(&mut self) {}
}

impl<R: ScopedResource + ?Sized> ScopedResource for Box<R> {
    fn release(&mut self) {
        (**self).release()
    }
}

/// Acquire-on-use, release-on-drop holder for one downstream session.
///
/// Nothing is opened until the first `get`, and whatever was opened is released when the scope
/// goes out of scope, whichever outcome path the handler took.
pub struct SessionScope<'a, R: ScopedResource> {
    name: &'static str,
    factory: Box<dyn FnMut() -> CareResult<R> + 'a>,
    resource: Option<R>,
}

impl<'a, R: ScopedResource> SessionScope<'a, R> {
    pub fn new(name: &'static str, factory: impl FnMut() -> CareResult<R> + 'a) -> Self {
        Self {
            name,
            factory: Box::new(factory),
            resource: None,
        }
    }

    pub fn get(&mut self) -> CareResult<&mut R> {
        if self.resource.is_none() {
            let resource = (self.factory)()?;
            debug!("{} session acquired", self.name);
            self.resource = Some(resource);
        }
        match self.resource.as_mut() {
            Some(resource) => Ok(resource),
            None => fmt_err!(UnknownException, "{} session vanished", self.name),
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.resource.is_some()
    }
}

impl<'a, R: ScopedResource> Drop for SessionScope<'a, R> {
    fn drop(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            resource.release();
            debug!("{} session released", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Counting<'c> {
        released: &'c Cell<u32>,
    }

    impl<'c> ScopedResource for Counting<'c> {
        fn release(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    #[test]
    fn never_acquired_never_released() {
        let acquired = Cell::new(0);
        let released = Cell::new(0);
        {
            let scope = SessionScope::new("test", || {
                acquired.set(acquired.get() + 1);
                Ok(Counting {
                    released: &released,
                })
            });
            assert!(!scope.is_acquired());
        }
        assert_eq!(acquired.get(), 0);
        assert_eq!(released.get(), 0);
    }

    #[test]
    fn released_once_on_error_path() {
        let acquired = Cell::new(0);
        let released = Cell::new(0);
        let run = || -> CareResult<()> {
            let mut scope = SessionScope::new("test", || {
                acquired.set(acquired.get() + 1);
                Ok(Counting {
                    released: &released,
                })
            });
            scope.get()?;
            scope.get()?;
            str_err!(TransientException, "downstream refused the request")
        };
        assert!(run().is_err());
        assert_eq!(acquired.get(), 1);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn boxed_session_is_released_through_the_box() {
        let released = Cell::new(0);
        {
            let mut scope = SessionScope::new("test", || {
                Ok(Box::new(Counting {
                    released: &released,
                }) as Box<dyn ScopedResource + '_>)
            });
            scope.get().unwrap();
        }
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn failed_acquisition_propagates() {
        let mut scope: SessionScope<'_, Counting<'_>> =
            SessionScope::new("test", || str_err!(BrokerUnavailable, "connection refused"));
        let e = scope.get().err().unwrap();
        assert!(e.is_transient());
        assert!(!scope.is_acquired());
    }
}
