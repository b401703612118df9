use chrono::{Datelike, Timelike, Utc};

use crate::{error::ErrorCode, time::TimeStamp};

pub(crate) fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

pub(crate) fn decode_error_code(code: i32) -> ErrorCode {
    match code {
        libc::EBUSY     => ErrorCode::AlreadyLocked,
        libc::EPERM     => ErrorCode::NotOwner,
        libc::EINVAL    => ErrorCode::InvalidArgument,
        libc::ENOMEM    => ErrorCode::OutOfMemory,
        // pthread primitives report a lack of (non-memory) resources with EAGAIN
        libc::EAGAIN    => ErrorCode::OutOfMemory,
        libc::EDEADLK   => ErrorCode::Deadlock,
        libc::EOVERFLOW => ErrorCode::Overflow,
        _               => ErrorCode::Uncategorized,
    }
}

/// Yeild the rest of the current timeslice to the OS
#[inline]
pub(crate) fn thread_yield() {
    std::thread::yield_now();
}

pub(crate) fn get_timestamp() -> TimeStamp {
    let now = Utc::now();
    TimeStamp {
        year:        now.year() as u16,
        month:       now.month() as u8,
        day_of_week: now.weekday().num_days_from_sunday() as u8,
        day:         now.day() as u8,
        hour:        now.hour() as u8,
        minute:      now.minute() as u8,
        second:      now.second() as u8,
        // Leap seconds are reported as a nanosecond value past 1s
        millisecond: (now.timestamp_subsec_millis() % 1000) as u16,
    }
}
