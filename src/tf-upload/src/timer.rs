use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Wall-clock timer for one pipeline stage. Logs when the stage starts and
/// how long it took.
pub struct Timer {
    stage: String,
    started: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
}

impl Timer {
    pub fn new(stage: &str) -> Self {
        Timer {
            stage: stage.to_owned(),
            started: None,
            elapsed: None,
        }
    }

    pub fn new_start(stage: &str) -> Self {
        let mut t = Timer::new(stage);
        t.start();
        t
    }

    pub fn start(&mut self) {
        debug!("{}: starting", self.stage);

        self.started = Some(Utc::now());
        self.elapsed = None;
    }

    /// Stop the timer and return the elapsed time in milliseconds.
    pub fn stop(&mut self) -> i64 {
        match self.started.take() {
            None => debug!("{}: not running!", self.stage),
            Some(started) => {
                let d = Utc::now() - started;

                self.elapsed = Some(d);
                info!("{} duration: {} msec", self.stage, d.num_milliseconds());
            }
        }

        self.elapsed_ms()
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed.map_or(0, |d| d.num_milliseconds())
    }
}
