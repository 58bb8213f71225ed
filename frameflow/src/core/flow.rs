//! What a stage returns to its caller.

/// The outcome of running a stage and whatever it chose to run after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<R> {
    /// A final response, produced by the terminal handler or by a stage that
    /// short-circuited the rest of the pipeline.
    Done(R),
    /// The continuation only recorded a partial context.
    ///
    /// This is what a concurrent group member's continuation returns. The
    /// group discards member results, so the value never reaches the driver
    /// in a well-formed pipeline.
    Recorded,
}

impl<R> Flow<R> {
    /// Returns true if this carries a final response.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Returns the response, if any.
    #[must_use]
    pub fn into_response(self) -> Option<R> {
        match self {
            Self::Done(response) => Some(response),
            Self::Recorded => None,
        }
    }

    /// Maps the response value.
    pub fn map<U, F: FnOnce(R) -> U>(self, f: F) -> Flow<U> {
        match self {
            Self::Done(response) => Flow::Done(f(response)),
            Self::Recorded => Flow::Recorded,
        }
    }
}

impl<R> From<R> for Flow<R> {
    fn from(response: R) -> Self {
        Self::Done(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_accessors() {
        let done: Flow<u32> = Flow::Done(3);
        assert!(done.is_done());
        assert_eq!(done.map(|n| n * 2).into_response(), Some(6));

        let recorded: Flow<u32> = Flow::Recorded;
        assert!(!recorded.is_done());
        assert_eq!(recorded.into_response(), None);
    }
}
