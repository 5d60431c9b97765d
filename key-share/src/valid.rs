//! A thin "validated" wrapper, so a value that passed its `validate()` check
//! can be passed around without re-checking it at every call site.

use core::ops::Deref;

/// Wraps a `T: Validate` that has passed [`Validate::validate`].
///
/// The only way to construct a `Valid<T>` is via `TryFrom<T>`, which runs the
/// validation; there's no way to smuggle an unvalidated value in.
#[derive(Debug, Clone)]
pub struct Valid<T>(T);

pub trait Validate: Sized {
    type Error;
    fn validate(&self) -> Result<(), Self::Error>;
}

impl<T: Validate> TryFrom<T> for Valid<T> {
    type Error = T::Error;
    fn try_from(value: T) -> Result<Self, Self::Error> {
        value.validate()?;
        Ok(Self(value))
    }
}

impl<T> Deref for Valid<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Valid<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}
