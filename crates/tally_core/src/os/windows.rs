use windows::Win32::{
    Foundation::{
        GetLastError, WIN32_ERROR,
        ERROR_BUSY, ERROR_NOT_OWNER, ERROR_INVALID_PARAMETER, ERROR_NOT_ENOUGH_MEMORY, ERROR_OUTOFMEMORY,
        ERROR_POSSIBLE_DEADLOCK, ERROR_ACCESS_DENIED, ERROR_ARITHMETIC_OVERFLOW, ERROR_INVALID_STATE,
    },
    System::{
        SystemInformation::GetSystemTime,
        Threading::Sleep,
    },
};

use crate::{error::ErrorCode, time::TimeStamp};

pub(crate) fn errno() -> i32 {
    unsafe { GetLastError().0 as i32 }
}

pub(crate) fn decode_error_code(code: i32) -> ErrorCode {
    match WIN32_ERROR(code as u32) {
        ERROR_BUSY                => ErrorCode::AlreadyLocked,
        ERROR_NOT_OWNER           => ErrorCode::NotOwner,
        ERROR_ACCESS_DENIED       => ErrorCode::NotOwner,
        ERROR_INVALID_PARAMETER   => ErrorCode::InvalidArgument,
        ERROR_NOT_ENOUGH_MEMORY   => ErrorCode::OutOfMemory,
        ERROR_OUTOFMEMORY         => ErrorCode::OutOfMemory,
        ERROR_POSSIBLE_DEADLOCK   => ErrorCode::Deadlock,
        ERROR_ARITHMETIC_OVERFLOW => ErrorCode::Overflow,
        ERROR_INVALID_STATE       => ErrorCode::InvalidState,
        _                         => ErrorCode::Uncategorized,
    }
}

/// Yeild the rest of the current timeslice to the OS
#[inline]
pub(crate) fn thread_yield() {
    unsafe {
        // We don't use SwitchToThread here because it doesn't consider all
        // threads in the system and the thread we are waiting for may not get
        // selected.
        Sleep(0);
    }
}

pub(crate) fn get_timestamp() -> TimeStamp {
    unsafe {
        let sys_time = GetSystemTime();
        TimeStamp {
            year:        sys_time.wYear,
            month:       sys_time.wMonth as u8,
            day_of_week: sys_time.wDayOfWeek as u8,
            day:         sys_time.wDay as u8,
            hour:        sys_time.wHour as u8,
            minute:      sys_time.wMinute as u8,
            second:      sys_time.wSecond as u8,
            millisecond: sys_time.wMilliseconds
        }
    }
}
