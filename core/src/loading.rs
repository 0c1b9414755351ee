//! Caller-side view of an in-flight or finished request.
//!
//! The pipeline does not track loading state itself; callers that drive a
//! usecase keep one of these next to it.

/// Loading phase of a value, optionally carrying the last known value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadingState<T, E> {
    /// Nothing requested yet
    Standby(Option<T>),
    /// A request is in flight
    Loading(Option<T>),
    /// The last request failed
    Failed(E),
    /// The first page (or the only value) arrived
    Done(T),
    /// A further page arrived
    AdditionalDone(T),
}

impl<T, E> Default for LoadingState<T, E> {
    fn default() -> Self {
        Self::Standby(None)
    }
}

impl<T, E> LoadingState<T, E> {
    /// Current value, if this state carries one.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Standby(value) | Self::Loading(value) => value.as_ref(),
            Self::Done(value) | Self::AdditionalDone(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Whether a request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Move to [`LoadingState::Loading`], keeping the current value.
    #[must_use]
    pub fn into_loading(self) -> Self {
        match self {
            Self::Standby(value) | Self::Loading(value) => Self::Loading(value),
            Self::Done(value) | Self::AdditionalDone(value) => Self::Loading(Some(value)),
            Self::Failed(_) => Self::Loading(None),
        }
    }

    /// Settle a request: `Done` for a first page, `AdditionalDone` otherwise,
    /// `Failed` on error.
    #[must_use]
    pub fn settle(result: Result<T, E>, additional: bool) -> Self {
        match result {
            Ok(value) if additional => Self::AdditionalDone(value),
            Ok(value) => Self::Done(value),
            Err(error) => Self::Failed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_per_state() {
        let standby: LoadingState<i32, String> = LoadingState::default();
        assert_eq!(standby.value(), None);
        assert_eq!(LoadingState::<i32, String>::Loading(Some(1)).value(), Some(&1));
        assert_eq!(LoadingState::<i32, String>::Done(2).value(), Some(&2));
        assert_eq!(LoadingState::<i32, String>::AdditionalDone(3).value(), Some(&3));
        assert_eq!(LoadingState::<i32, String>::Failed("x".into()).value(), None);
    }

    #[test]
    fn test_transitions() {
        let state: LoadingState<i32, String> = LoadingState::Done(1);
        let loading = state.into_loading();
        assert!(loading.is_loading());
        assert_eq!(loading.value(), Some(&1));

        assert_eq!(
            LoadingState::<i32, String>::settle(Ok(2), true),
            LoadingState::AdditionalDone(2)
        );
        assert_eq!(LoadingState::<i32, String>::settle(Ok(2), false), LoadingState::Done(2));
        assert_eq!(
            LoadingState::<i32, String>::settle(Err("boom".into()), false),
            LoadingState::Failed("boom".to_string())
        );
    }
}
