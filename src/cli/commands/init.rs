use crate::config::Config;

pub fn cmd_init() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("Created config.toml with default settings.");
        println!("Set library.library_path, then run: anicat scan");
    } else {
        println!("config.toml already exists.");
    }
    Ok(())
}
