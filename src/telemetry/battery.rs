//! # Battery Monitoring
//!
//! Smoothed voltage/current readings plus a local charge integrator used
//! when the flight controller does not report consumed capacity itself.

/// Per-pack battery monitor.
///
/// Voltage and current are exponentially smoothed the same way across both
/// packs. Consumed charge is integrated from the current samples; the
/// 1.0625 factor compensates for sensor undercount observed in the field.
#[derive(Debug, Default, Clone)]
pub struct BatteryMonitor {
    avg_mv: f32,
    avg_ca: f32,
    tot_mah: f64,
    last_sample_ms: Option<u64>,
}

impl BatteryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a voltage sample (millivolts), returning the running average.
    pub fn update_voltage(&mut self, mv: u16) -> u16 {
        if self.avg_mv < 1.0 {
            self.avg_mv = f32::from(mv);
        } else {
            self.avg_mv = self.avg_mv * 0.6666 + f32::from(mv) * 0.3333;
        }
        self.avg_mv as u16
    }

    /// Fold in a current sample (centiamps) and integrate consumed charge
    /// over the elapsed interval. Returns the running average.
    pub fn update_current(&mut self, ca: i16, now_ms: u64) -> i16 {
        let ca_f = f32::from(ca);
        if self.avg_ca < 1.0 {
            self.avg_ca = ca_f;
        } else {
            self.avg_ca = self.avg_ca * 0.6666 + ca_f * 0.333;
        }

        if let Some(last) = self.last_sample_ms {
            let hours = (now_ms.saturating_sub(last)) as f64 / 3_600_000.0;
            self.tot_mah += f64::from(ca_f) * hours * 10.0 * 1.0625;
        }
        self.last_sample_ms = Some(now_ms);

        self.avg_ca as i16
    }

    /// Smoothed voltage in millivolts.
    pub fn voltage_mv(&self) -> u16 {
        self.avg_mv as u16
    }

    /// Smoothed current in centiamps.
    pub fn current_ca(&self) -> i16 {
        self.avg_ca as i16
    }

    /// Locally integrated consumption in mAh.
    pub fn consumed_mah(&self) -> u32 {
        self.tot_mah as u32
    }
}

/// Infer LiPo cell count from pack voltage, assuming 4.2V/cell maximum.
/// The count never decreases once established, so a sagging pack is not
/// re-classified downward mid-flight.
pub fn cell_count(voltage_mv: u16, previous: u8) -> u8 {
    let measured = if voltage_mv > 21000 {
        6
    } else if voltage_mv > 16800 {
        5
    } else if voltage_mv > 12600 {
        4
    } else if voltage_mv > 8400 {
        3
    } else if voltage_mv > 4200 {
        2
    } else {
        0
    };
    measured.max(previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_voltage_sample_initialises_average() {
        let mut bat = BatteryMonitor::new();
        assert_eq!(bat.update_voltage(16400), 16400);
    }

    #[test]
    fn test_voltage_average_smooths() {
        let mut bat = BatteryMonitor::new();
        bat.update_voltage(16000);
        let v = bat.update_voltage(15000);
        // 16000 * 0.6666 + 15000 * 0.3333 ~= 15665
        assert!((15600..=15700).contains(&v));
    }

    #[test]
    fn test_charge_integration() {
        let mut bat = BatteryMonitor::new();
        // 10 A (1000 cA) steady for one hour, sampled twice.
        bat.update_current(1000, 0);
        bat.update_current(1000, 3_600_000);
        // 1000 cA * 1h * 10 * 1.0625 = 10625 "mAh" per the legacy scaling
        let mah = bat.consumed_mah();
        assert!((10500..=10750).contains(&mah), "mah = {}", mah);
    }

    #[test]
    fn test_no_integration_before_second_sample() {
        let mut bat = BatteryMonitor::new();
        bat.update_current(500, 1000);
        assert_eq!(bat.consumed_mah(), 0);
    }

    #[test]
    fn test_cell_count_ladder() {
        assert_eq!(cell_count(25000, 0), 6);
        assert_eq!(cell_count(16900, 0), 5);
        assert_eq!(cell_count(12700, 0), 4);
        assert_eq!(cell_count(8500, 0), 3);
        assert_eq!(cell_count(4300, 0), 2);
        assert_eq!(cell_count(4000, 0), 0);
    }

    #[test]
    fn test_cell_count_sag_keeps_previous() {
        // A 3S pack sagging below the 2S threshold stays 3S.
        assert_eq!(cell_count(8300, 3), 3);
    }
}
