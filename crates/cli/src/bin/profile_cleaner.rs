use anyhow::Result;

fn main() -> Result<()> {
    profile_cleaner_cli::main_entry()
}
