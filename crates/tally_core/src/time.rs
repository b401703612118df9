use core::fmt::Display;

use crate::os;

/// Wall clock timestamp (UTC)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimeStamp {
    pub year        : u16,
    pub month       : u8,
    pub day_of_week : u8,
    pub day         : u8,
    pub hour        : u8,
    pub minute      : u8,
    pub second      : u8,
    pub millisecond : u16,
}

impl Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}", self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond))
    }
}

/// Get the current timestamp
pub fn get_timestamp() -> TimeStamp {
    os::get_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format() {
        let stamp = TimeStamp { year: 2026, month: 3, day_of_week: 2, day: 7, hour: 9, minute: 5, second: 1, millisecond: 42 };
        assert_eq!(stamp.to_string(), "2026-03-07 09:05:01.042");
    }

    #[test]
    fn current_is_sane() {
        let stamp = get_timestamp();
        assert!(stamp.year >= 2024);
        assert!((1..=12).contains(&stamp.month));
        assert!((1..=31).contains(&stamp.day));
        assert!(stamp.day_of_week < 7);
        assert!(stamp.millisecond < 1000);
    }
}
