//! Seed-derived Vanity Address Generator CLI
//!
//! Usage:
//!   seed_vanity -b <BASE> -p pump              # Find an address ending with "pump"
//!   seed_vanity -b <BASE> -p ab -t start -i    # Starting with "ab", any case
//!   seed_vanity -b <BASE> -p moon -a lanes     # Use the CPU lane kernel

use std::process;

use clap::Parser;

use seed_vanity::{CancelToken, Config, ResultRecord, SearchOutcome, Throughput, WorkerPool};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    // Validate configuration
    let request = match config.to_request() {
        Ok(request) => request,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let pattern = request.compiled_pattern();

    // Print startup info
    log::info!("Seed-derived Vanity Address Generator");
    log::info!("Base:        {}", request.base_pubkey);
    log::info!("Program:     {}", request.program_id);
    log::info!(
        "Pattern:     {} ({}{})",
        request.pattern,
        pattern.position(),
        if pattern.case_insensitive() { ", case-insensitive" } else { "" }
    );
    log::info!("Difficulty:  {}", pattern.difficulty_description());
    log::info!("Workers:     {}", request.worker_count);
    log::info!("Accelerator: {}", request.accelerator);

    #[cfg(feature = "gpu")]
    if request.accelerator == seed_vanity::Accelerator::Gpu {
        for (index, name) in seed_vanity::worker::gpu::list_devices().iter().enumerate() {
            log::info!("GPU device {}: {}", index, name);
        }
    }

    let cancel = CancelToken::new();
    ctrlc_handler(cancel.clone());

    // Create worker pool
    let mut pool = match WorkerPool::spawn(&request, cancel) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to start search: {}", e);
            process::exit(1);
        }
    };

    log::info!("Searching... (Press Ctrl+C to stop)");

    let outcome = pool.run(config.report_interval(), print_progress);

    let code = match &outcome {
        SearchOutcome::Found(found) => {
            let record =
                ResultRecord::new(&request.base_pubkey, found, pool.elapsed(), pool.total_attempts());
            match record.to_block() {
                Ok(block) => println!("{}", block),
                Err(e) => log::error!("Failed to serialize result: {}", e),
            }

            log::info!("Found matching address!");
            log::info!("Address:     {}", found.address.encoded);
            log::info!("Seed:        {}", found.seed);
            log::info!("Worker:      {}", found.worker_id);
            0
        }
        SearchOutcome::Exhausted => {
            log::warn!("Attempt limit reached without a match.");
            2
        }
        SearchOutcome::Aborted { faulted } => {
            log::error!("Search aborted: {} worker(s) faulted.", faulted);
            2
        }
        SearchOutcome::Cancelled => {
            log::info!("Stopped by user.");
            2
        }
    };

    // Print final stats
    log::info!("--- Final Statistics ---");
    log::info!("Total attempts: {}", format_number(pool.total_attempts()));
    log::info!("Time elapsed:   {:.2}s", pool.elapsed().as_secs_f64());
    log::info!(
        "Average speed:  {}/s",
        format_number(pool.attempts_per_second() as u64)
    );

    drop(pool);
    process::exit(code);
}

fn print_progress(throughput: &Throughput) {
    log::info!(
        "[{:>4}s] Tried {} seeds ({}/s)",
        throughput.elapsed.as_secs(),
        format_number(throughput.total_attempts),
        format_number(throughput.attempts_per_second as u64)
    );
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn ctrlc_handler(cancel: CancelToken) {
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        log::warn!("Error setting Ctrl-C handler: {}", e);
    }
}
