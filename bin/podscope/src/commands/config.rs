//! `config` - show or initialize the config file.

use eyre::Result;

use crate::cli::ConfigArgs;
use crate::context::Context;

pub(crate) fn run(ctx: Context, args: &ConfigArgs) -> Result<()> {
    let path = ctx.dirs.config_file();
    if args.init {
        ctx.config.write(&path, args.force)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}
