use embassy_time::{Duration, Timer};
use smart_leds::{brightness, SmartLedsWrite, RGB8};

/// Palette used by the recovery controller. One color per state so the
/// device can be diagnosed from across the room.
pub mod colors {
    use smart_leds::RGB8;

    pub const WHITE: RGB8 = RGB8::new(255, 255, 255);
    pub const GREEN: RGB8 = RGB8::new(0, 255, 0);
    pub const RED: RGB8 = RGB8::new(255, 0, 0);
    pub const BLUE: RGB8 = RGB8::new(0, 0, 255);
    pub const CYAN: RGB8 = RGB8::new(0, 255, 255);
    pub const MAGENTA: RGB8 = RGB8::new(255, 0, 255);
    pub const YELLOW: RGB8 = RGB8::new(255, 255, 0);
    pub const ORANGE: RGB8 = RGB8::new(255, 64, 0);
}

const LED_BRIGHTNESS: u8 = 255;
const SWEEP_STEPS: u16 = 255;
const SWEEP_STEP_MS: u64 = 25;

/// Single status LED. Rendering is fire-and-forget: the contract has no
/// failure mode the control loop should handle, so write errors are
/// dropped.
pub struct StatusLed<W: SmartLedsWrite<Color = RGB8>> {
    writer: W,
}

impl<W: SmartLedsWrite<Color = RGB8>> StatusLed<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn fill(&mut self, color: RGB8) {
        self.writer
            .write(brightness(core::iter::once(color), LED_BRIGHTNESS))
            .ok();
    }

    /// Fill and keep the color up for a fixed duration.
    pub async fn hold(&mut self, color: RGB8, duration: Duration) {
        self.fill(color);
        Timer::after(duration).await;
    }

    /// Animated transition between two colors. Doubles as the loop's
    /// visible heartbeat and its natural pacing delay.
    pub async fn sweep(&mut self, from: RGB8, to: RGB8) {
        for step in 0..=SWEEP_STEPS {
            self.fill(blend(from, to, step as u8));
            Timer::after(Duration::from_millis(SWEEP_STEP_MS)).await;
        }
    }

    /// Short repeating two-color flash, used for the sensor-failure
    /// signal.
    pub async fn flash_alternate(&mut self, a: RGB8, b: RGB8, cycles: u8) {
        for _ in 0..cycles {
            self.hold(a, Duration::from_millis(1_500)).await;
            self.hold(b, Duration::from_millis(1_500)).await;
        }
    }
}

fn blend(from: RGB8, to: RGB8, step: u8) -> RGB8 {
    let channel = |from: u8, to: u8| {
        let from = from as i32;
        let to = to as i32;
        (from + (to - from) * step as i32 / 255) as u8
    };
    RGB8::new(
        channel(from.r, to.r),
        channel(from.g, to.g),
        channel(from.b, to.b),
    )
}
