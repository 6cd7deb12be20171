//! The frame loop state machine.

use std::sync::Arc;

use winit::window::Window;

/// Asks the host for another frame.
pub trait FrameScheduler {
    fn schedule_frame(&self);
}

impl FrameScheduler for Window {
    fn schedule_frame(&self) {
        self.request_redraw();
    }
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for Arc<S> {
    fn schedule_frame(&self) {
        (**self).schedule_frame();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running { frames: u64 },
    /// Stopped after a fatal frame error. Terminal.
    Halted,
}

/// What a call to [`FrameDriver::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The body ran and the next frame was scheduled.
    Rendered { frame: u64 },
    /// The driver was not running; the body was not called.
    Skipped,
}

/// Drives one tick per scheduled frame, from `start` until a tick fails.
pub struct FrameDriver<S: FrameScheduler> {
    scheduler: S,
    state: DriverState,
}

impl<S: FrameScheduler> FrameDriver<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, DriverState::Running { .. })
    }

    /// Starts the loop and schedules the first frame. Only the first call has
    /// any effect.
    pub fn start(&mut self) -> bool {
        if self.state != DriverState::Idle {
            return false;
        }
        self.state = DriverState::Running { frames: 0 };
        self.scheduler.schedule_frame();
        log::debug!("frame driver started");
        true
    }

    /// Runs `body` for one frame.
    ///
    /// On success the next frame is scheduled. An error halts the driver for
    /// good and is returned to the caller.
    pub fn tick<E>(&mut self, body: impl FnOnce() -> Result<(), E>) -> Result<TickOutcome, E> {
        let DriverState::Running { frames } = self.state else {
            return Ok(TickOutcome::Skipped);
        };

        match body() {
            Ok(()) => {
                self.state = DriverState::Running { frames: frames + 1 };
                self.scheduler.schedule_frame();
                Ok(TickOutcome::Rendered { frame: frames })
            }
            Err(err) => {
                self.state = DriverState::Halted;
                log::debug!("frame driver halted after {frames} frames");
                Err(err)
            }
        }
    }

    /// Stops scheduling without an error, e.g. on window close.
    pub fn halt(&mut self) {
        self.state = DriverState::Halted;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct CountingScheduler(Rc<Cell<u32>>);

    impl FrameScheduler for CountingScheduler {
        fn schedule_frame(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn ticks_before_start_are_ignored() {
        let scheduler = CountingScheduler::default();
        let mut driver = FrameDriver::new(scheduler.clone());

        let mut ran = false;
        let outcome = driver.tick(|| -> Result<(), ()> {
            ran = true;
            Ok(())
        });

        assert_eq!(outcome, Ok(TickOutcome::Skipped));
        assert!(!ran);
        assert_eq!(scheduler.0.get(), 0);
    }

    #[test]
    fn each_successful_tick_schedules_the_next() {
        let scheduler = CountingScheduler::default();
        let mut driver = FrameDriver::new(scheduler.clone());

        assert!(!driver.is_running());
        assert!(driver.start());
        assert!(!driver.start());
        assert!(driver.is_running());
        for expected in 0..3 {
            assert_eq!(
                driver.tick(|| Ok::<_, ()>(())),
                Ok(TickOutcome::Rendered { frame: expected })
            );
        }

        assert_eq!(driver.state(), DriverState::Running { frames: 3 });
        assert_eq!(scheduler.0.get(), 4);
    }

    #[test]
    fn error_halts_and_later_ticks_are_skipped() {
        let scheduler = CountingScheduler::default();
        let mut driver = FrameDriver::new(scheduler.clone());
        driver.start();

        assert_eq!(driver.tick(|| Err("surface lost")), Err("surface lost"));
        assert_eq!(driver.state(), DriverState::Halted);
        assert!(!driver.is_running());

        let mut ran = false;
        let outcome = driver.tick(|| -> Result<(), &str> {
            ran = true;
            Ok(())
        });
        assert_eq!(outcome, Ok(TickOutcome::Skipped));
        assert!(!ran);
        assert_eq!(scheduler.0.get(), 1);
        assert!(!driver.start(), "a halted driver cannot restart");
    }
}
