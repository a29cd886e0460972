/*
    sacdmount
    https://github.com/dbalsom/sacdfs

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

mod args;
mod fs;

use anyhow::{anyhow, Context, Result};
use fuser::MountOption;
use sacdfs::{
    index::AreaVisibility,
    overlay::{Overlay, OverlayConfig},
    util::TrackNameFormat,
};

use crate::fs::SacdMountFs;

fn run() -> Result<()> {
    let params = args::params().run();

    let filter = if params.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let options = args::parse_options(&params.options).map_err(|e| anyhow!(e))?;

    let mut visibility = AreaVisibility::all();
    if options.no_stereo {
        visibility.remove(AreaVisibility::STEREO);
    }
    if options.no_multichannel {
        visibility.remove(AreaVisibility::MULTICHANNEL);
    }

    let source_meta = std::fs::metadata(&params.source_dir)
        .with_context(|| format!("source {} is not accessible", params.source_dir.display()))?;
    if !source_meta.is_dir() {
        return Err(anyhow!("source {} is not a directory", params.source_dir.display()));
    }
    std::fs::metadata(&params.mount_point)
        .with_context(|| format!("mount point {} is not accessible", params.mount_point.display()))?;

    // -d implies foreground so debug output stays attached to the terminal. The fork
    // must happen before the overlay spawns its worker pool.
    if !params.foreground && !params.debug {
        let rc = unsafe { libc::daemon(0, 0) };
        if rc != 0 {
            return Err(anyhow!("failed to daemonize"));
        }
    }

    let overlay = Overlay::new(OverlayConfig {
        root: params.source_dir.clone(),
        threads: options.threads,
        cache_timeout: options.cache_timeout,
        max_open_isos: options.max_isos,
        visibility,
        editable_tags: options.edit_tags,
        name_format: TrackNameFormat::default(),
        decoder_factory: None,
    })
    .with_context(|| format!("cannot shadow {}", params.source_dir.display()))?;

    let mut mount_options = vec![
        MountOption::FSName("sacdfs".to_string()),
        MountOption::AutoUnmount,
        MountOption::DefaultPermissions,
    ];
    if options.allow_other {
        mount_options.push(MountOption::AllowOther);
    }
    if !options.edit_tags {
        mount_options.push(MountOption::RO);
    }

    log::info!(
        "mounting {} -> {}",
        params.source_dir.display(),
        params.mount_point.display()
    );

    fuser::mount2(SacdMountFs::new(overlay), &params.mount_point, &mount_options)
        .map_err(|e| anyhow!("mount failed: {}", e))
}

fn main() {
    match run() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("sacdmount: {:#}", e);
            std::process::exit(1);
        }
    }
}
