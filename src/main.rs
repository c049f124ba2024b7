//! heapdb - inspect heap files and exercise the page-locking engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heapdb::access::{DataType, Schema, Tuple, Value};
use heapdb::config::StorageConfig;
use heapdb::database::Database;
use heapdb::storage::PageManager;
use heapdb::storage::page::PageId;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print page and tuple counts of a heap file
    Info {
        file: PathBuf,

        #[arg(short, long, default_value_t = heapdb::config::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Run concurrent inserting transactions against a fresh table
    Stress {
        /// Data directory
        #[arg(short = 'D', long, default_value = "./heapdb_data")]
        data_dir: PathBuf,

        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Transactions per thread
        #[arg(short = 'n', long, default_value = "50")]
        transactions: usize,

        /// Rows inserted by each transaction
        #[arg(short, long, default_value = "8")]
        rows: usize,

        #[arg(long, default_value_t = heapdb::config::DEFAULT_BUFFER_POOL_PAGES)]
        pool_pages: usize,

        /// Lower bound of the lock wait budget in milliseconds
        #[arg(long, default_value = "50")]
        wait_min_ms: u64,

        /// Upper bound of the lock wait budget in milliseconds
        #[arg(long, default_value = "150")]
        wait_max_ms: u64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Info { file, page_size } => info(file, page_size),
        Command::Stress {
            data_dir,
            threads,
            transactions,
            rows,
            pool_pages,
            wait_min_ms,
            wait_max_ms,
        } => {
            let config = StorageConfig::default()
                .with_buffer_pool_pages(pool_pages)
                .with_lock_wait(
                    Duration::from_millis(wait_min_ms),
                    Duration::from_millis(wait_max_ms),
                );
            stress(data_dir, config, threads, transactions, rows)
        }
    }
}

fn info(file: PathBuf, page_size: usize) -> Result<()> {
    let mut pm = PageManager::open(&file, page_size)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let num_pages = pm.num_pages()?;

    println!("{}: {} pages of {} bytes", file.display(), num_pages, page_size);

    let mut total = 0;
    for page_no in 0..num_pages {
        let page = pm.load(PageId::new(0, page_no))?;
        let heap_page = page.heap_page();
        if let Err(e) = heap_page.check() {
            println!("  page {:>5}: {}", page_no, e);
            continue;
        }
        total += heap_page.tuple_count();
        println!(
            "  page {:>5}: {:>4} tuples, {:>5} bytes free",
            page_no,
            heap_page.tuple_count(),
            heap_page.free_space()
        );
    }
    println!("{} tuples total", total);

    Ok(())
}

fn stress(
    data_dir: PathBuf,
    config: StorageConfig,
    threads: usize,
    transactions: usize,
    rows: usize,
) -> Result<()> {
    std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

    let db = Arc::new(Database::new(config)?);
    let schema = Schema::new(vec![("worker", DataType::Int32), ("seq", DataType::Int32)]);
    let table_id = db.create_table("stress", &data_dir.join("stress.dat"), schema)?;

    let committed = Arc::new(AtomicUsize::new(0));
    let aborted = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let db = Arc::clone(&db);
            let committed = Arc::clone(&committed);
            let aborted = Arc::clone(&aborted);

            thread::spawn(move || -> Result<()> {
                for _ in 0..transactions {
                    let txn = db.begin();
                    let inserted = (0..rows).try_for_each(|seq| {
                        let mut tuple = Tuple::new(vec![
                            Value::from(worker as i32),
                            Value::from(seq as i32),
                        ]);
                        txn.insert(table_id, &mut tuple)
                    });

                    match inserted {
                        Ok(()) => {
                            txn.commit()?;
                            committed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) if e.is_abort_required() => {
                            txn.abort()?;
                            aborted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
    }

    let txn = db.begin();
    let stored = txn.scan(table_id)?.count();
    txn.commit()?;

    println!(
        "{} committed, {} aborted in {:.2?}; {} rows stored ({} expected)",
        committed.load(Ordering::Relaxed),
        aborted.load(Ordering::Relaxed),
        start.elapsed(),
        stored,
        committed.load(Ordering::Relaxed) * rows
    );

    Ok(())
}
