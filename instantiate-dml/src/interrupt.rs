use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// A token observed by the engine to detect host interrupts.
#[derive(Debug, Clone)]
pub struct InterruptToken {
  interrupted: Arc<AtomicBool>,
}

impl InterruptToken {
  /// Create a new interrupt token + handle pair.
  pub fn new() -> (Self, InterruptHandle) {
    Self::from_shared_flag(Arc::new(AtomicBool::new(false)))
  }

  /// Create a token + handle pair observing an existing shared flag.
  pub fn from_shared_flag(interrupted: Arc<AtomicBool>) -> (Self, InterruptHandle) {
    (
      Self {
        interrupted: interrupted.clone(),
      },
      InterruptHandle { interrupted },
    )
  }

  pub fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::Acquire)
  }
}

/// A host handle used to request that an incubation yields.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
  interrupted: Arc<AtomicBool>,
}

impl InterruptHandle {
  /// Request that incubation cooperatively yields at the next check point.
  pub fn interrupt(&self) {
    self.interrupted.store(true, Ordering::Release);
  }
}

/// The interrupt predicate consulted between bounded units of construction
/// work.
///
/// Suspension points are only between whole objects during creation and
/// between items of each finalize drain; a single object's property
/// application always runs to completion once started.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
  deadline: Option<Instant>,
  /// Incubation continues while this flag reads `true`.
  run_while: Option<Arc<AtomicBool>>,
}

impl Interrupt {
  /// Never interrupts. Used by synchronous creation and force-completion.
  pub fn none() -> Self {
    Self::default()
  }

  /// Interrupts once `duration` has elapsed.
  pub fn deadline(duration: Duration) -> Self {
    Self {
      deadline: Instant::now().checked_add(duration),
      run_while: None,
    }
  }

  /// Interrupts once `flag` reads `false`, and additionally once `duration`
  /// (if any) has elapsed.
  pub fn while_true(flag: Arc<AtomicBool>, duration: Option<Duration>) -> Self {
    Self {
      deadline: duration.and_then(|d| Instant::now().checked_add(d)),
      run_while: Some(flag),
    }
  }

  pub fn should_interrupt(&self) -> bool {
    if let Some(flag) = &self.run_while {
      if !flag.load(Ordering::Acquire) {
        return true;
      }
    }
    if let Some(deadline) = self.deadline {
      if Instant::now() >= deadline {
        return true;
      }
    }
    false
  }
}
