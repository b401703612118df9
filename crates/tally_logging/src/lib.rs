use core::{
    fmt::{Display, Arguments},
    sync::atomic::{AtomicU8, self},
};
use std::{
    fmt::Write as _,
    io::{self, Write as _},
};
use parking_lot::RwLock;
use tally_core::{
    error,
    guard::{self, LifecycleViolation},
    sync::FairMutex,
};

pub use tally_base::func_name;
pub use tally_core::time::{get_timestamp, TimeStamp};

static DEFAULT_LOGGER : Logger = Logger::new();
static LOGGER : RwLock<Option<&'static Logger>> = RwLock::new(None);

/// Set the global logger
pub fn set_logger(logger: &'static Logger) {
    *LOGGER.write() = Some(logger);
}

/// Get the global logger, or the built-in default logger if none was set
pub fn get_logger() -> &'static Logger {
    let logger = *LOGGER.read();
    logger.unwrap_or(&DEFAULT_LOGGER)
}

/// Logging level
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LogLevel {
    /// Severe error: will probably result in a crash
    Severe,
    /// Error: may not result in a crash
    Error,
    /// Warning: While not as bad as an error, it may point at contention or misuse
    Warning,
    /// General info
    Info,
    /// Verbose info
    Verbose,
    /// Debug info (includes verbose info)
    Debug,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Severe  => f.write_str("\x1B[1m\x1B[41m\x1B[30m[SEVERE ]\x1B[0m"),
            LogLevel::Error   => f.write_str(               "\x1B[91m[ERROR  ]\x1B[0m"),
            LogLevel::Warning => f.write_str(               "\x1B[93m[WARNING]\x1B[0m"),
            LogLevel::Info    => f.write_str(               "\x1B[37m[INFO   ]\x1B[0m"),
            LogLevel::Verbose => f.write_str(               "\x1B[90m[VERBOSE]\x1B[0m"),
            LogLevel::Debug   => f.write_str(               "\x1B[94m[DEBUG  ]\x1B[0m"),
        }
    }
}

/// Log category
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LogCategory {
    category     : &'static str,
    sub_category : Option<&'static str>
}

impl LogCategory {
    pub const fn new(name: &'static str) -> Self {
        Self { category: name, sub_category: None }
    }

    pub const fn new_with_sub(name: &'static str, sub_name: &'static str) -> Self {
        Self { category: name, sub_category: Some(sub_name) }
    }
}

impl Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sub_category {
            Some(sub) => f.write_fmt(format_args!("{}({sub})", self.category)),
            None => f.write_str(self.category),
        }
    }
}

/// Additional info about where the log occured
#[derive(Clone, Copy, Debug)]
pub struct LogLocation {
    file : &'static str,
    line : u32,
    func : &'static str,
    time : TimeStamp,
}

impl LogLocation {
    /// Creates a new log location
    pub const fn new(file: &'static str, line: u32, func: &'static str, time: TimeStamp) -> Self {
        Self { file, line, func, time }
    }

    /// Get the file name where the log occured
    pub const fn file(&self) -> &str {
        self.file
    }

    /// Get the line where the log occurred
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Get the function where the log occurred
    pub const fn function(&self) -> &str {
        self.func
    }

    /// Get the timestamp when the log occurred
    pub const fn timestamp(&self) -> TimeStamp {
        self.time
    }
}

struct LogLocationFormatter<'a> {
    loc   : &'a LogLocation,
    level : LogLevel
}

impl<'a> LogLocationFormatter<'a> {
    fn new(loc: &'a LogLocation, level: LogLevel) -> Self {
        Self { loc, level }
    }
}

impl<'a> Display for LogLocationFormatter<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            LogLevel::Severe |
            LogLevel::Error |
            LogLevel::Debug => f.write_fmt(format_args!("({}:{}: {})", self.loc.file(), self.loc.line(), self.loc.function())),
            LogLevel::Warning |
            LogLevel::Info |
            LogLevel::Verbose => f.write_str(self.loc.function()),
        }
    }
}

/// Create a [`LogLocation`] for the current file, line and function
#[macro_export]
macro_rules! log_location {
    () => {
        $crate::LogLocation::new(file!(), line!(), $crate::func_name!(), $crate::get_timestamp())
    };
}

struct LoggerState {
    writers:        [Option<Box<dyn io::Write + Send>>; Self::MAX_WRITERS],
    cache:          Option<String>,
    always_flush:   bool,
    log_to_console: bool,
}

impl LoggerState {
    const MAX_WRITERS: usize = 8;
    const CACHE_FLUSH_LIMIT: usize = 4 * 1024;

    const fn new() -> Self {
        // Cause the `Option` contains a `Box<T>`, the option is not Copy, so we need to manually build the array
        let writers = [
            None,
            None,
            None,
            None,
            None,
            None,
            None,
            None,
        ];

        Self {
            writers,
            cache: None,
            always_flush: false,
            log_to_console: true,
        }
    }

    fn cache(&mut self) -> &mut String {
        self.cache.get_or_insert_with(|| String::with_capacity(Self::CACHE_FLUSH_LIMIT))
    }

    fn write_message(&mut self, message: &str) {
        self.cache().push_str(message);
        self.flush_when_needed();
    }

    fn format_message(&mut self, fmt_args: Arguments) {
        _ = self.cache().write_fmt(fmt_args);
        self.flush_when_needed();
    }

    fn flush_when_needed(&mut self) {
        if self.always_flush || self.cache.as_ref().map_or(0, |cache| cache.len()) > Self::CACHE_FLUSH_LIMIT {
            self.flush();
        }
    }

    fn has_output(&self) -> bool {
        self.log_to_console || self.writers.iter().any(Option::is_some)
    }

    fn flush(&mut self) {
        if let Some(cache) = &mut self.cache {
            if self.log_to_console {
                let mut stderr = io::stderr().lock();
                _ = stderr.write_all(cache.as_bytes());
                _ = stderr.flush();
            }

            for writer in self.writers.iter_mut().flatten() {
                _ = writer.write_all(cache.as_bytes());
                _ = writer.flush();
            }
            cache.clear();
        }
    }
}

/// Logger
/// 
/// Supports up to 8 writers, e.g. file, in-game console, external tool, etc, next to the console.
/// 
/// Messages are cached, and written out once the cache is full, on an explicit `flush`, or after every message when `always_flush` is set.
pub struct Logger {
    state: FairMutex<LoggerState>,
    max_log_level: AtomicU8,
}

impl Logger {
    pub const fn new() -> Self {
        Self { 
            state: FairMutex::new(LoggerState::new()),
            max_log_level: AtomicU8::new(LogLevel::Info as u8),
        }
    }

    // Run `f` on the locked state.
    // Logging is invisible to the thread's last error, as it happens in the middle of the operations being logged.
    // If the state is already locked by this thread, e.g. when a writer logs, the message is dropped and `None` is returned.
    fn with_state<R, F: FnOnce(&mut LoggerState) -> R>(&self, f: F) -> Option<R> {
        let last_error = error::last_error();
        let res = self.state.lock().ok().map(|mut state| f(&mut state));
        error::set_last_error(last_error);
        res
    }

    /// Set the maximum log level (severe == lowest, debug == highest)
    pub fn set_max_level(&self, level: LogLevel) {
        self.max_log_level.store(level as u8, atomic::Ordering::Relaxed)
    }

    /// Check whether messages at `level` will be logged
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.max_log_level.load(atomic::Ordering::Relaxed)
    }

    /// Set whether the logger should flush after each write
    pub fn set_always_flush(&self, always_flush: bool) {
        self.with_state(|state| state.always_flush = always_flush);
    }

    /// Set whether the logger should log it's output to console
    pub fn set_log_to_console(&self, log_to_console: bool) {
        self.with_state(|state| {
            // Make sure to flush first, cause all messages before wanted/didn't want to be log to be written to console
            state.flush();
            state.log_to_console = log_to_console;
        });
    }

    /// Add a writer. 
    /// 
    /// Returns `Ok(index)` if space was available. This index can be used to remove the writer later on.
    /// 
    /// Otherwise returns an `Err` with the provided writer
    pub fn add_writer(&self, writer: Box<dyn io::Write + Send>) -> Result<usize, Box<dyn io::Write + Send>> {
        let mut writer = Some(writer);
        let mut index = None;
        self.with_state(|state| {
            if let Some((id, slot)) = state.writers.iter_mut().enumerate().find(|val| val.1.is_none()) {
                *slot = writer.take();
                index = Some(id);
            }
        });
        match (index, writer) {
            (Some(id), _) => Ok(id),
            (None, Some(writer)) => Err(writer),
            // The writer is always either stored or handed back
            (None, None) => unreachable!(),
        }
    }

    /// Remove a writer from the logger
    pub fn remove_writer(&self, index: usize) -> Option<Box<dyn io::Write + Send>> {
        let mut writer = None;
        self.with_state(|state| {
            // Flush first, so the writer gets everything that was logged while it was installed
            state.flush();
            writer = state.writers.get_mut(index).and_then(Option::take);
        });
        writer
    }

    /// Log a message
    pub fn log(&self, category: LogCategory, level: LogLevel, loc: LogLocation, text: &str) {
        self.log_fmt(category, level, loc, format_args!("{text}"))
    }

    /// Log a formatted message
    pub fn log_fmt(&self, category: LogCategory, level: LogLevel, loc: LogLocation, format: Arguments) {
        if self.is_enabled(level) {
            let loc_formatter = LogLocationFormatter::new(&loc, level);
            let timestamp = loc.timestamp();
            self.with_state(|state| {
                state.format_message(format_args!("\x1B[38m{timestamp}\x1B[0m {level} [{category}] {loc_formatter}: "));
                state.format_message(format);
                state.write_message("\n");
            });
        }
    }

    /// Log a formatted message and write it out right away, regardless of the log level.
    ///
    /// Returns whether the message reached the console or a writer.
    pub fn log_now(&self, category: LogCategory, level: LogLevel, loc: LogLocation, format: Arguments) -> bool {
        let loc_formatter = LogLocationFormatter::new(&loc, level);
        let timestamp = loc.timestamp();
        self.with_state(|state| {
            if !state.has_output() {
                return false;
            }
            state.format_message(format_args!("\x1B[38m{timestamp}\x1B[0m {level} [{category}] {loc_formatter}: "));
            state.format_message(format);
            state.write_message("\n");
            state.flush();
            true
        }).unwrap_or(false)
    }

    /// Write out all cached messages
    pub fn flush(&self) {
        self.with_state(|state| state.flush());
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.flush();
    }
}

#[macro_export]
macro_rules! log {
    ($category:expr, $level:expr, $($arg:tt)+) => {
        $crate::get_logger().log_fmt($category, $level, $crate::log_location!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_severe {
    ($category:expr, $($arg:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Severe, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($category:expr, $($arg:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_warning {
    ($category:expr, $($arg:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Warning, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $($arg:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($category:expr, $($arg:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Verbose, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $($arg:tt)+) => {
        $crate::log!($category, $crate::LogLevel::Debug, $($arg)+)
    };
}

//------------------------------------------------------------------------------------------------------------------------------

const LIFECYCLE_CATEGORY : LogCategory = LogCategory::new("lifecycle");

fn report_violation(violation: &LifecycleViolation) -> bool {
    let loc = LogLocation::new(file!(), line!(), violation.operation, get_timestamp());
    get_logger().log_now(LIFECYCLE_CATEGORY, LogLevel::Severe, loc, format_args!("{violation}"))
}

/// Route lifecycle violations through the global logger.
/// 
/// The violation is logged as a severe message, and the logger is flushed before the process aborts.
/// When the logger has no output, or is locked by the violating thread, the plain stderr line is written instead.
pub fn install_violation_reporter() {
    guard::set_violation_reporter(Some(report_violation));
}
