use crate::config;
use crate::error::Result;

/// Filters EC temperature reads, keeping the last plausible value around to
/// stand in for glitched ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sampler {
    last_good_c: i32,
}

impl Sampler {
    #[cfg(test)]
    pub fn last_good(&self) -> i32 {
        self.last_good_c
    }

    /// Returns the fresh reading when plausible, otherwise the last good one.
    pub fn sample(&mut self, reading: Result<i32>) -> i32 {
        match reading {
            Ok(t) if (0..=config::MAX_PLAUSIBLE_TEMP_C).contains(&t) => {
                self.last_good_c = t;
                t
            }
            Ok(t) => {
                log::debug!("ignoring implausible reading {}C, using {}C", t, self.last_good_c);
                self.last_good_c
            }
            Err(err) => {
                log::trace!("sensor read failed ({}), using {}C", err, self.last_good_c);
                self.last_good_c
            }
        }
    }
}
