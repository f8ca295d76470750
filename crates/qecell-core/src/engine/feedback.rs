use crate::core::models::atom::Axis;
use crate::core::utils::expr::ExprError;

/// Signals about card input sent to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    /// A coordinate field of card entry `index` does not evaluate to a number.
    InvalidInput {
        index: usize,
        axis: Axis,
        text: String,
        error: ExprError,
    },
    /// Card entry `index` evaluates again after having been reported invalid.
    InputAccepted { index: usize },
}

pub type FeedbackCallback = Box<dyn Fn(Feedback)>;

#[derive(Default)]
pub struct FeedbackReporter {
    callback: Option<FeedbackCallback>,
}

impl FeedbackReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: FeedbackCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, feedback: Feedback) {
        if let Some(cb) = &self.callback {
            cb(feedback);
        }
    }
}

impl std::fmt::Debug for FeedbackReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
