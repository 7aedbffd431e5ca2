use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::AsyncCommand;

/// Drive `fut` to completion unless `token` fires first
///
/// Returns `None` on cancellation. `fut` has been dropped by then, so any
/// borrow it held is free again.
pub(crate) async fn run_cancellable<F: Future>(
    token: Option<&CancellationToken>,
    fut: F,
) -> Option<F::Output> {
    let Some(token) = token else {
        return Some(fut.await);
    };
    tokio::select! {
        biased;
        () = token.cancelled() => None,
        out = fut => Some(out),
    }
}

pub(crate) fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

/// Native command whose execution future may be abandoned
///
/// Dropped while armed, it calls [`AsyncCommand::cancel`]. The driver disarms
/// it once the native future has produced an outcome.
pub(crate) struct CancelOnDrop<'n, N: AsyncCommand> {
    native: &'n mut N,
    armed: bool,
}

impl<'n, N: AsyncCommand> CancelOnDrop<'n, N> {
    pub fn new(native: &'n mut N) -> Self {
        Self {
            native,
            armed: true,
        }
    }

    pub fn command(&mut self) -> &mut N {
        self.native
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl<N: AsyncCommand> Drop for CancelOnDrop<'_, N> {
    fn drop(&mut self) {
        if self.armed {
            self.native.cancel();
        }
    }
}
