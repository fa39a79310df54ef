use std::{env, thread, time::Duration};

use loragw_serial::config::{BoardConfig, ConcentratorConfig};
use loragw_serial::hal::types::{Bandwidth, RxChannelConfig, SpreadingFactor};
use loragw_serial::hal::Concentrator;

const PORT_NAME: &str = "/dev/ttyACM0";
const NB_PKT_MAX: usize = 8;

fn default_config() -> ConcentratorConfig {
    let channel = |freq_hz| RxChannelConfig {
        enable: true,
        freq_hz,
        bandwidth: Bandwidth::Khz800,
        datarate: SpreadingFactor::Sf12,
        ..Default::default()
    };
    ConcentratorConfig {
        board: BoardConfig::new(PORT_NAME),
        rx_channels: vec![channel(2_403_000_000), channel(2_479_000_000)],
        tx: Default::default(),
    }
}

fn main() {
    env_logger::init();

    // optional JSON configuration file as first argument
    let config = match env::args().nth(1) {
        Some(path) => match ConcentratorConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load \"{}\". Error: {}", path, e);
                ::std::process::exit(1);
            }
        },
        None => default_config(),
    };

    let mut concentrator: Concentrator = match Concentrator::from_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration. Error: {}", e);
            ::std::process::exit(1);
        }
    };
    if let Err(e) = concentrator.start() {
        eprintln!("Failed to start the concentrator. Error: {}", e);
        ::std::process::exit(1);
    }

    let mut nb_pkt_received = 0;
    loop {
        match concentrator.receive(NB_PKT_MAX) {
            Ok(pkts) => {
                for pkt in pkts {
                    nb_pkt_received += 1;
                    println!(
                        "[{}] radio {}, {} Hz, count_us {}, rssi {:.1} dB, snr {:.1} dB, payload {:02x?}",
                        nb_pkt_received,
                        pkt.channel,
                        pkt.freq_hz,
                        pkt.count_us,
                        pkt.rssi,
                        pkt.snr,
                        &pkt.payload[..]
                    );
                }
            }
            Err(e) if e.desynchronizes_link() => {
                eprintln!("Link lost. Error: {}", e);
                let _ = concentrator.stop();
                ::std::process::exit(1);
            }
            Err(e) => eprintln!("{}", e),
        }
        thread::sleep(Duration::from_millis(10));
    }
}
