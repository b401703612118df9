// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use crate::os::thread_yield;
use core::hint::spin_loop;

// Wastes some CPU time for the given number or iterations, using a hint to indicate to the CPU that we are spinning
#[inline]
fn cpu_relax(iterations: u32) {
    for _ in 0..iterations {
        spin_loop()
    }
}

/// A counter used to perform exponential backoff in spin loops
#[derive(Default)]
pub struct SpinWait {
    counter: u32,
}

impl SpinWait {
    /// Number of iterations after which `spin` reports that the thread should block instead
    const SLEEP_THRESHOLD : u32 = 10;
    /// Number of iterations that only burn CPU cycles, iterations after this yield to the OS
    const YIELD_THRESHOLD : u32 = 3;

    /// Creates a new `SpinWait`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets a `SpinWait` to its initial state
    #[inline]
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Spins until the sleep threshold has been reached.
    /// 
    /// This function returns wether the sleep threshold has been reached, at which point further spinning has diminishing returns and the thread should be parked instead.
    /// 
    /// The spin strategy will initially use a CPU-bound loop, but will fall back to yielding the CPU to the OS after a few iterations.
    #[inline]
    pub fn spin(&mut self) -> bool {
        if self.counter >= Self::SLEEP_THRESHOLD {
            return false;
        }

        self.counter += 1;
        if self.counter <= Self::YIELD_THRESHOLD {
            cpu_relax(1 << self.counter);
        } else {
            thread_yield();
        }
        true
    }
}
