/// Display version information
pub fn execute() {
    println!("rostergate {}", env!("CARGO_PKG_VERSION"));
    println!("Roster-verified Telegram group gatekeeper");
}
