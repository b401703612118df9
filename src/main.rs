use std::{env, process, sync::Arc, thread, time::Instant};

use tally_core::{guard::MutexKind, Result};
use tally_logging::{get_logger, install_violation_reporter, log_error, log_info, set_logger, LogCategory, LogLevel, Logger};
use tally_records::{Item, Ledger, Rarity};

pub const LOG_CAT : LogCategory = LogCategory::new("Main");

static LOGGER : Logger = Logger::new();

const DEFAULT_ITERATIONS : usize = 10_000;

fn setup_logging() {
    set_logger(&LOGGER);
    install_violation_reporter();

    let logger = get_logger();
    if env::args().any(|arg| arg == "-v" || arg == "--verbose") {
        logger.set_max_level(LogLevel::Verbose);
    }
}

fn iterations() -> usize {
    env::args()
        .skip(1)
        .find_map(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_ITERATIONS)
}

fn create_item(name: &str, value: u64, rarity: Rarity, kind: MutexKind) -> Result<Item> {
    let mut item = Item::new();
    item.initialize_with(name, value, 0, rarity)?;
    item.enable_thread_safety_with(kind)?;
    Ok(item)
}

// Two threads assign 2 items into each other in opposite order, each assignment taking both locks
fn run_items(iterations: usize) -> Result<()> {
    let sword = Arc::new(create_item("Iron sword", 1500, Rarity::Uncommon, MutexKind::Fair)?);
    let shield = Arc::new(create_item("Oak shield", 800, Rarity::Common, MutexKind::Reentrant)?);

    let start = Instant::now();
    let handles = [(sword.clone(), shield.clone()), (shield.clone(), sword.clone())].into_iter().map(|(dest, src)| {
        thread::spawn(move || -> Result<()> {
            for _ in 0..iterations {
                dest.assign_from(&src)?;
                dest.add_quantity(1)?;
            }
            Ok(())
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        match handle.join() {
            Ok(res) => res?,
            Err(_) => log_error!(LOG_CAT, "item worker panicked"),
        }
    }

    log_info!(LOG_CAT, "{} opposing assignments finished in {:?}", iterations * 2, start.elapsed());
    for item in [&sword, &shield] {
        // Only the reentrant item can report its worth, the fair one rejects the nested lock
        let worth = item.worth().map_or_else(|err| err.to_string(), |worth| worth.to_string());
        log_info!(LOG_CAT, "{} '{}': {} x {} copper, worth {worth}", item.id(), item.name()?, item.quantity()?, item.value()?);
    }
    Ok(())
}

// Two threads append 2 ledgers to each other, the ledgers double on each append, so keep the round count small
fn run_ledgers() -> Result<()> {
    let mut income = Ledger::new();
    let mut expenses = Ledger::new();
    for (ledger, entry) in [(&mut income, 250u64), (&mut expenses, 75)] {
        ledger.initialize()?;
        ledger.enable_thread_safety()?;
        ledger.push(entry)?;
    }
    let income = Arc::new(income);
    let expenses = Arc::new(expenses);

    let handles = [(income.clone(), expenses.clone()), (expenses.clone(), income.clone())].into_iter().map(|(dest, src)| {
        thread::spawn(move || -> Result<()> {
            for _ in 0..8 {
                dest.append_from(&src)?;
            }
            Ok(())
        })
    }).collect::<Vec<_>>();

    for handle in handles {
        match handle.join() {
            Ok(res) => res?,
            Err(_) => log_error!(LOG_CAT, "ledger worker panicked"),
        }
    }

    log_info!(LOG_CAT, "ledgers hold {} and {} entries", income.len()?, expenses.len()?);
    Ok(())
}

fn main() {
    setup_logging();

    let iterations = iterations();
    log_info!(LOG_CAT, "running with {iterations} iterations per thread");

    let res = run_items(iterations).and_then(|_| run_ledgers());
    if let Err(err) = res {
        log_error!(LOG_CAT, "demo failed: {err}");
    }

    get_logger().flush();
    if res.is_err() {
        process::exit(1);
    }
}
