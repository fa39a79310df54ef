use std::{env, thread, time::Duration};

use loragw_serial::config::BoardConfig;
use loragw_serial::hal::airtime::time_on_air;
use loragw_serial::hal::types::{Bandwidth, CodingRate, SpreadingFactor, TxMode, TxPacket};
use loragw_serial::hal::Concentrator;

const PORT_NAME: &str = "/dev/ttyACM0";
const NB_PKT: u32 = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let port = env::args().nth(1).unwrap_or_else(|| PORT_NAME.to_string());

    let mut concentrator: Concentrator = Concentrator::new();
    concentrator.configure_board(BoardConfig::new(&port))?;
    concentrator.start()?;

    let mut pkt = TxPacket {
        freq_hz: 2_425_000_000,
        tx_mode: TxMode::Immediate,
        rf_power: 10,
        bandwidth: Bandwidth::Khz800,
        datarate: SpreadingFactor::Sf12,
        coderate: CodingRate::Li4_8,
        ..Default::default()
    };

    for i in 0..NB_PKT {
        pkt.set_payload(format!("PING {:04}", i).as_bytes())?;
        let toa = time_on_air(&pkt);
        // leave the radio twice the time on air before giving up
        let max_wait = Duration::from_millis(2 * toa.ms as u64 + 100);
        let status = concentrator.send_blocking(&pkt, max_wait)?;
        println!(
            "packet {} sent ({} bytes, {} ms on air): {:?}",
            i,
            pkt.size(),
            toa.ms,
            status
        );
        thread::sleep(Duration::from_millis(250));
    }

    concentrator.stop()?;
    Ok(())
}
