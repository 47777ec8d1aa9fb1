//! Reset command: empty the ledger.

use std::io::Write;

use anyhow::Result;

use stt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("refusing to delete recorded time without --yes");
    }
    let removed = db.reset_ledger()?;
    writeln!(writer, "Removed {removed} ledger entries.")?;
    Ok(())
}
