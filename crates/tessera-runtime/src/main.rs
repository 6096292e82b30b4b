// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tessera_infra::{init_logging, ThreadedBackend};
use tessera_runtime::{bake, clear_cache, BakeOptions, Manifest};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Bake procedural textures and manage their content cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every instance declared in a manifest
    Bake {
        /// Manifest file (settings, packages, instances)
        #[arg(short, long)]
        config: PathBuf,

        /// Render synchronously instead of through the tick loop
        #[arg(long)]
        sync: bool,

        /// Give up after this many ticks
        #[arg(long, default_value_t = 10_000)]
        max_ticks: u64,

        /// Milliseconds to sleep between ticks while a batch renders
        #[arg(long, default_value_t = 1)]
        tick_ms: u64,
    },
    /// Delete every entry of the content cache
    ClearCache {
        /// Manifest file naming the cache directory
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging("info");
    let cli = Cli::parse();

    match cli.command {
        Command::Bake {
            config,
            sync,
            max_ticks,
            tick_ms,
        } => {
            let manifest = Manifest::load(&config)?;
            let backend = ThreadedBackend::with_builtins().context("failed to start backend")?;
            let options = BakeOptions {
                sync,
                max_ticks,
                tick_interval: Duration::from_millis(tick_ms),
            };
            let report = bake(&manifest, Box::new(backend), &options)?;

            for output in &report.outputs {
                match &output.upload {
                    Some(upload) => println!(
                        "{}/{}: {}x{} {:?}, {} mip(s)",
                        output.instance,
                        output.output,
                        upload.width,
                        upload.height,
                        upload.format,
                        upload.mip_count()
                    ),
                    None => println!("{}/{}: not produced", output.instance, output.output),
                }
            }
            println!(
                "{} published, {} from cache, {} not ready, {} tick(s): {}",
                report.totals.published,
                report.totals.restored_from_cache,
                report.totals.not_ready,
                report.ticks,
                report.status.message
            );

            if !report.completed {
                bail!("bake did not finish within {max_ticks} ticks");
            }
            let missing = report.missing().count();
            if missing > 0 {
                bail!("{missing} output(s) were not produced");
            }
        }
        Command::ClearCache { config } => {
            let manifest = Manifest::load(&config)?;
            let removed = clear_cache(&manifest)?;
            println!(
                "Removed {removed} cache entries from {}",
                manifest.settings.cache.directory.display()
            );
        }
    }
    Ok(())
}
