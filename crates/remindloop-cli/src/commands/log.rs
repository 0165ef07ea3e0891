use remindloop_core::Database;

use super::CmdResult;

pub fn run(limit: usize) -> CmdResult {
    let db = Database::open()?;
    let entries = db.recent_log(limit)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
