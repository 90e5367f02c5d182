use core::time::Duration;

use esp_hal::rtc_cntl::{sleep::TimerWakeupSource, Rtc};
use log::info;

/// Terminal process transitions. Both calls diverge: recovery here means
/// discarding all process state, so control never returns to the caller.
pub struct Power {
    rtc: Rtc<'static>,
}

impl Power {
    pub fn new(rtc: Rtc<'static>) -> Self {
        Self { rtc }
    }

    /// Full software reset, immediately.
    pub fn restart(&mut self) -> ! {
        info!("Restarting device");
        esp_hal::system::software_reset()
    }

    /// Timed deep sleep. The chip wakes through the reset vector, so
    /// waking *is* the restart; there is no path back into this call
    /// stack.
    pub fn deep_sleep_then_restart(&mut self, secs: u64) -> ! {
        info!("Entering deep sleep for {secs} sec");
        let timer = TimerWakeupSource::new(Duration::from_secs(secs));
        self.rtc.sleep_deep(&[&timer])
    }
}
