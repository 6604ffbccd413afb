use std::future::Future;

/// A number of attempts that can be spent across several retries.
#[derive(Debug)]
pub struct AttemptBudget {
    total: usize,
    used: usize,
}

impl AttemptBudget {
    pub const fn new(total: usize) -> Self {
        Self { total, used: 0 }
    }

    pub const fn used(&self) -> usize {
        self.used
    }

    pub const fn remaining(&self) -> usize {
        self.total - self.used
    }

    const fn take(&mut self) -> bool {
        if self.used < self.total {
            self.used += 1;
            true
        } else {
            false
        }
    }
}

/// runs `action` until `accept` approves its output or the budget runs out.
pub fn retry<T>(
    budget: &mut AttemptBudget,
    mut accept: impl FnMut(&T) -> bool,
    mut action: impl FnMut() -> T,
) -> Option<T> {
    while budget.take() {
        let value = action();
        if accept(&value) {
            return Some(value);
        }
    }

    None
}

/// async version of [`retry`].
///
/// `Ok(None)` from `action` is a failed attempt, `Err` aborts the whole retry.
pub async fn retry_async<T, E, F, Fut>(
    budget: &mut AttemptBudget,
    mut accept: impl FnMut(&T) -> bool,
    mut action: F,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    while budget.take() {
        if let Some(value) = action().await? {
            if accept(&value) {
                return Ok(Some(value));
            }
        }
    }

    Ok(None)
}
