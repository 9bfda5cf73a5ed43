//! Memoized one-time initialization.

use crate::error::{BoxError, BridgeError, BridgeResult};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

type InitFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

struct GateInner {
    init: InitFn,
    outcome: OnceCell<Result<(), String>>,
    runs: AtomicUsize,
}

/// Runs an initialization step exactly once and shares its outcome.
///
/// Every caller of [`StartupGate::open`] waits for the same run. Callers that
/// arrive while it is in flight wait for it; later callers get the stored
/// outcome immediately. A failure is stored too: the step is not retried.
#[derive(Clone)]
pub struct StartupGate {
    inner: Arc<GateInner>,
}

impl StartupGate {
    /// Creates a gate around `init`. Nothing runs until the first `open`.
    pub fn new<F, Fut>(init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let init: InitFn = Arc::new(move || Box::pin(init()));
        Self {
            inner: Arc::new(GateInner {
                init,
                outcome: OnceCell::new(),
                runs: AtomicUsize::new(0),
            }),
        }
    }

    /// Runs the step if it has not run yet and waits for its outcome.
    pub async fn open(&self) -> BridgeResult<()> {
        let outcome = self
            .inner
            .outcome
            .get_or_init(|| async {
                self.inner.runs.fetch_add(1, Ordering::SeqCst);
                tracing::debug!("running startup");
                match (self.inner.init)().await {
                    Ok(()) => {
                        tracing::info!("startup complete");
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "startup failed");
                        Err(e.to_string())
                    }
                }
            })
            .await;
        outcome.clone().map_err(BridgeError::Startup)
    }

    /// Returns true once the step finished successfully.
    pub fn is_open(&self) -> bool {
        matches!(self.inner.outcome.get(), Some(Ok(())))
    }

    /// Returns how many times the step has been started.
    pub fn runs(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StartupGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupGate")
            .field("outcome", &self.inner.outcome.get())
            .field("runs", &self.runs())
            .finish()
    }
}
