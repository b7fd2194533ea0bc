//! Background animation for hosts with threads.
//!
//! A [`Worker`] runs a task in a loop on its own thread until the task gives up or
//! [`Worker::stop`] is called. The stop flag is only looked at between iterations, so
//! a command is never cut in half on the bus.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::sync_lcd::Lcd;

/// Cancellable periodic task on a dedicated thread. Dropping it stops it.
pub struct Worker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Runs `task` with the iteration count until it returns `false` or the worker is
    /// stopped.
    pub fn spawn<F>(name: &str, mut task: F) -> io::Result<Self>
    where
        F: FnMut(u64) -> bool + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let mut iteration = 0;
                while !flag.load(Ordering::Acquire) {
                    if !task(iteration) {
                        break;
                    }
                    iteration += 1;
                }
                debug!("worker done after {} iterations", iteration);
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Whether the task has ended, by itself or by [`Worker::stop`].
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Asks the task to stop and blocks until it did.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("worker panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps the animations of `lcd` running, updating them every `period`.
///
/// The display is locked for each update only, other threads can write text in
/// between. A failed update ends the worker, the display has to be initialized again.
pub fn animate<S, RS, RST, D>(
    lcd: Arc<Mutex<Lcd<S, RS, RST, D>>>,
    period: Duration,
) -> io::Result<Worker>
where
    S: SpiDevice + Send + 'static,
    RS: OutputPin + Send + 'static,
    RST: OutputPin<Error = RS::Error> + Send + 'static,
    D: DelayNs + Send + 'static,
{
    Worker::spawn("st7036-animate", move |_| {
        let result = match lcd.lock() {
            Ok(mut lcd) => lcd.update_animations_now(),
            Err(_) => {
                warn!("display lock poisoned");
                return false;
            }
        };
        if result.is_err() {
            warn!("animation update failed");
            return false;
        }
        thread::sleep(period);
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::sync::atomic::{AtomicU64, AtomicUsize};
    use std::time::Instant;

    use embedded_hal::spi::{ErrorKind, Operation};

    use crate::Glyph;

    #[derive(Debug)]
    struct Gone;

    impl embedded_hal::spi::Error for Gone {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Thread safe SPI device recording bytes until `limit` is reached.
    #[derive(Clone)]
    struct SharedSpi {
        bytes: Arc<Mutex<Vec<u8>>>,
        limit: Arc<AtomicUsize>,
    }

    impl SharedSpi {
        fn new() -> Self {
            Self {
                bytes: Arc::new(Mutex::new(Vec::new())),
                limit: Arc::new(AtomicUsize::new(usize::MAX)),
            }
        }

        fn len(&self) -> usize {
            self.bytes.lock().unwrap().len()
        }
    }

    impl embedded_hal::spi::ErrorType for SharedSpi {
        type Error = Gone;
    }

    impl SpiDevice for SharedSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Gone> {
            let mut bytes = self.bytes.lock().unwrap();
            for op in operations.iter() {
                if let Operation::Write(buf) = op {
                    if bytes.len() + buf.len() > self.limit.load(Ordering::SeqCst) {
                        return Err(Gone);
                    }
                    bytes.extend_from_slice(buf);
                }
            }
            Ok(())
        }
    }

    struct Pin;

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    const BLINK: [Glyph; 2] = [[0x0A; 8], [0x15; 8]];

    fn wait_until(mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn stop_joins_the_thread() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let mut worker = Worker::spawn("count", move |i| {
            counter.store(i + 1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(1));
            true
        })
        .unwrap();
        wait_until(|| count.load(Ordering::SeqCst) > 3);
        worker.stop();
        assert!(worker.is_finished());
        let stopped_at = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }

    #[test]
    fn task_can_end_itself() {
        let worker = Worker::spawn("short", |i| i < 2).unwrap();
        wait_until(|| worker.is_finished());
    }

    #[test]
    fn animates_in_the_background() {
        let spi = SharedSpi::new();
        let mut lcd = Lcd::new(spi.clone(), Pin, NoDelay).init().unwrap();
        lcd.create_animation(0, &BLINK, 1000).unwrap();
        let written = spi.len();

        let lcd = Arc::new(Mutex::new(lcd));
        let mut worker = animate(Arc::clone(&lcd), Duration::from_millis(1)).unwrap();
        wait_until(|| spi.len() > written);
        worker.stop();

        // the display is free again and still works
        lcd.lock().unwrap().write("ok").unwrap();
        let bytes = spi.bytes.lock().unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], b"ok");
    }

    #[test]
    fn bus_failure_ends_the_worker() {
        let spi = SharedSpi::new();
        let mut lcd = Lcd::new(spi.clone(), Pin, NoDelay).init().unwrap();
        lcd.create_animation(1, &BLINK, 1000).unwrap();
        spi.limit.store(spi.len() + 3, Ordering::SeqCst);

        let worker = animate(Arc::new(Mutex::new(lcd)), Duration::from_millis(1)).unwrap();
        wait_until(|| worker.is_finished());
        assert!(spi.len() <= spi.limit.load(Ordering::SeqCst));
    }
}
