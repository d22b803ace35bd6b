use std::thread;
use std::time::Duration;

use crate::config;
use crate::error::Result;
use crate::hw::FanControl;

/// Rate limits fan speed changes: rises are applied at once, drops walk down
/// in fixed steps with a pause before each.
#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    step_pct: u8,
    step_delay: Duration,
}

impl Default for Ramp {
    fn default() -> Self {
        Self::new(config::RAMP_STEP_PCT, config::RAMP_STEP_DELAY)
    }
}

impl Ramp {
    pub fn new(step_pct: u8, step_delay: Duration) -> Self {
        Self {
            step_pct: step_pct.max(1),
            step_delay,
        }
    }

    /// Values to actuate, in order, to go from `previous` to `target`.
    ///
    /// The last value is always `target`.
    pub fn plan(&self, previous: Option<u8>, target: u8) -> Vec<u8> {
        let previous = match previous {
            Some(p) if target <= p => p,
            _ => return vec![target],
        };

        let mut steps: Vec<u8> = (0..)
            .map(|n: u32| previous as i32 - (n as i32 + 1) * self.step_pct as i32)
            .take_while(|&v| v > target as i32)
            .map(|v| v as u8)
            .collect();
        steps.push(target);
        steps
    }

    /// Actuates `fan_id` towards `target`, blocking through a downward ramp.
    ///
    /// `commanded` tracks the last value the EC accepted, so a failed step
    /// leaves it at the intermediate speed actually reached.
    pub fn drive(
        &self,
        hw: &mut dyn FanControl,
        fan_id: u8,
        commanded: &mut Option<u8>,
        target: u8,
    ) -> Result<()> {
        let rising = commanded.map_or(true, |p| target > p);
        let steps = self.plan(*commanded, target);

        if rising {
            log::debug!("fan {}: {:?} -> {}%", fan_id, commanded, target);
        } else {
            log::debug!("fan {}: ramping {:?}", fan_id, steps);
        }

        for pct in steps {
            if !rising {
                thread::sleep(self.step_delay);
            }
            hw.set_fan_speed(fan_id, pct)?;
            *commanded = Some(pct);
        }
        Ok(())
    }
}

/// Counts ticks and says when unchanged speeds are due to be re-sent
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    ticks_per_window: u32,
    ticks: u32,
}

impl Watchdog {
    pub fn new(window: Duration, tick_period: Duration) -> Self {
        let per_window = window.as_millis() / tick_period.as_millis().max(1);
        Self {
            ticks_per_window: (per_window as u32).max(1),
            ticks: 0,
        }
    }

    /// Advances one tick, true once per window
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.ticks_per_window {
            self.ticks = 0;
            true
        } else {
            false
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(config::WATCHDOG_WINDOW, config::POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hw::MockFanControl;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::time::Instant;

    fn ramp() -> Ramp {
        Ramp::new(5, Duration::ZERO)
    }

    #[test]
    fn rise_is_a_single_step() {
        assert_eq!(ramp().plan(Some(50), 60), vec![60]);
        assert_eq!(ramp().plan(None, 35), vec![35]);
    }

    #[test]
    fn drop_steps_down_to_exact_target() {
        assert_eq!(ramp().plan(Some(60), 40), vec![55, 50, 45, 40]);
        assert_eq!(ramp().plan(Some(60), 42), vec![55, 50, 45, 42]);
        assert_eq!(ramp().plan(Some(100), 88), vec![95, 90, 88]);
        assert_eq!(ramp().plan(Some(7), 0), vec![2, 0]);
    }

    #[test]
    fn drop_smaller_than_a_step_lands_directly() {
        assert_eq!(ramp().plan(Some(43), 40), vec![40]);
        assert_eq!(ramp().plan(Some(45), 40), vec![40]);
    }

    #[test]
    fn equal_target_reasserts_once() {
        assert_eq!(ramp().plan(Some(50), 50), vec![50]);
    }

    #[test]
    fn drive_rising_actuates_once() {
        let mut hw = MockFanControl::new();
        hw.expect_set_fan_speed()
            .with(eq(1), eq(60))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut commanded = Some(50);
        ramp().drive(&mut hw, 1, &mut commanded, 60).unwrap();
        assert_eq!(commanded, Some(60));
    }

    #[test]
    fn drive_falling_actuates_in_order() {
        let mut hw = MockFanControl::new();
        let mut seq = Sequence::new();
        for pct in [55, 50, 45, 40] {
            hw.expect_set_fan_speed()
                .with(eq(2), eq(pct))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(()));
        }

        let mut commanded = Some(60);
        ramp().drive(&mut hw, 2, &mut commanded, 40).unwrap();
        assert_eq!(commanded, Some(40));
    }

    #[test]
    fn drive_falling_waits_between_steps() {
        let delay = Duration::from_millis(5);
        let mut hw = MockFanControl::new();
        hw.expect_set_fan_speed().times(3).returning(|_, _| Ok(()));

        let start = Instant::now();
        let mut commanded = Some(30);
        Ramp::new(5, delay).drive(&mut hw, 1, &mut commanded, 15).unwrap();
        assert!(start.elapsed() >= delay * 3);
    }

    #[test]
    fn failed_step_keeps_last_accepted_value() {
        let mut hw = MockFanControl::new();
        hw.expect_set_fan_speed()
            .with(eq(1), eq(55))
            .returning(|_, _| Ok(()));
        hw.expect_set_fan_speed()
            .with(eq(1), eq(50))
            .returning(|_, _| Err(Error::EcTimeout("input buffer")));

        let mut commanded = Some(60);
        assert!(ramp().drive(&mut hw, 1, &mut commanded, 40).is_err());
        assert_eq!(commanded, Some(55));
    }

    #[test]
    fn watchdog_fires_once_per_window() {
        let mut wd = Watchdog::new(Duration::from_secs(60), Duration::from_secs(3));
        let fired: Vec<usize> = (1..=45).filter(|_| wd.tick()).collect();
        assert_eq!(fired, vec![20, 40]);
    }
}
