use std::env;

use loragw_serial::config::BoardConfig;
use loragw_serial::hal::Concentrator;

const DEFAULT_TTY_PATH: &str = "/dev/ttyACM0";

/// Prints the EUI of the concentrator, `chip_id [tty_path]`
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        return Err("Provide at most 1 argument".into());
    }
    let tty_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_TTY_PATH);

    let mut concentrator: Concentrator = Concentrator::new();
    concentrator.configure_board(BoardConfig::new(tty_path))?;
    let eui = concentrator.get_eui()?;

    println!("\nINFO: concentrator EUI: 0x{:016x}\n", eui);
    Ok(())
}
