use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::BIN_NAME;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

/// One page for `tally`, plus `tally-<subcommand>` pages.
pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::output_dir(&args.out_dir)?;
    let cmd = tally::command();

    write_page(&out_dir, BIN_NAME, cmd.clone())?;
    for subcommand in cmd.get_subcommands() {
        let page = format!("{BIN_NAME}-{}", subcommand.get_name());
        write_page(&out_dir, &page, subcommand.clone())?;
    }

    Ok(())
}

fn write_page(out_dir: &Path, page: &str, cmd: clap::Command) -> Result<(), String> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render manpage for {page}: {e}"))?;

    let path = out_dir.join(format!("{page}.1"));
    fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
