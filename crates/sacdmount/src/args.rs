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

use std::{path::PathBuf, time::Duration};

use bpaf::*;

#[derive(Debug, Clone)]
pub struct Params {
    pub foreground: bool,
    pub debug: bool,
    pub options: Vec<String>,
    pub source_dir: PathBuf,
    pub mount_point: PathBuf,
}

/// Set up bpaf argument parsing.
pub fn params() -> OptionParser<Params> {
    let foreground = short('f').help("Run in the foreground").switch();

    let debug = short('d').help("Enable debug output (implies -f)").switch();

    let options = short('o')
        .long("options")
        .help(
            "Mount options (comma separated, repeatable): threads=N, cache_timeout=N, \
             max_isos=N, no_stereo, no_multichannel, edit_tags, allow_other",
        )
        .argument::<String>("OPTIONS")
        .many();

    let source_dir = positional::<PathBuf>("SOURCE_DIR").help("Directory containing SACD ISO images");

    let mount_point = positional::<PathBuf>("MOUNT_POINT").help("Where to mount the virtual filesystem");

    construct!(Params {
        foreground,
        debug,
        options,
        source_dir,
        mount_point
    })
    .to_options()
    .descr("sacdmount: present SACD disc images as directories of DSF files")
}

/// The `-o` option set, FUSE style.
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub threads: usize,
    pub cache_timeout: Duration,
    pub max_isos: usize,
    pub no_stereo: bool,
    pub no_multichannel: bool,
    pub edit_tags: bool,
    pub allow_other: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        MountOptions {
            threads: 0,
            cache_timeout: Duration::from_secs(300),
            max_isos: 0,
            no_stereo: false,
            no_multichannel: false,
            edit_tags: false,
            allow_other: false,
        }
    }
}

/// Parse the comma-separated `-o` strings. Unknown keys are rejected so that typos
/// do not silently change behavior.
pub fn parse_options(raw: &[String]) -> Result<MountOptions, String> {
    let mut options = MountOptions::default();

    for group in raw {
        for opt in group.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match opt.split_once('=') {
                Some(("threads", v)) => {
                    options.threads = v.parse().map_err(|_| format!("invalid threads value '{}'", v))?;
                }
                Some(("cache_timeout", v)) => {
                    let secs: u64 = v
                        .parse()
                        .map_err(|_| format!("invalid cache_timeout value '{}'", v))?;
                    options.cache_timeout = Duration::from_secs(secs);
                }
                Some(("max_isos", v)) => {
                    options.max_isos = v.parse().map_err(|_| format!("invalid max_isos value '{}'", v))?;
                }
                None if opt == "no_stereo" => options.no_stereo = true,
                None if opt == "no_multichannel" => options.no_multichannel = true,
                None if opt == "edit_tags" => options.edit_tags = true,
                None if opt == "allow_other" => options.allow_other = true,
                _ => return Err(format!("unknown mount option '{}'", opt)),
            }
        }
    }

    Ok(options)
}
