//! Outcome of an acquisition request.

/// Not-ready and rejected are ordinary outcomes, not errors; callers show a
/// neutral "no weight" state and try again later.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition<T> {
    Ready(T),
    /// Too few samples buffered (or collected before the deadline).
    NotReady,
    /// Another request was still pending.
    Rejected,
}

impl<T> Acquisition<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Acquisition<U> {
        match self {
            Self::Ready(v) => Acquisition::Ready(f(v)),
            Self::NotReady => Acquisition::NotReady,
            Self::Rejected => Acquisition::Rejected,
        }
    }
}
