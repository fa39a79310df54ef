//! LoRa time on air
use super::types::{Bandwidth, TxPacket};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOnAir {
    /// ceiled to the next millisecond
    pub ms: u32,
    pub exact_ms: f64,
}

/// Symbol rate of the modem in kHz, which is slightly above the nominal bandwidth
fn symbol_rate_khz(bandwidth: Bandwidth) -> f64 {
    match bandwidth {
        Bandwidth::Khz200 => 203.0,
        Bandwidth::Khz400 => 406.0,
        Bandwidth::Khz800 => 812.0,
        Bandwidth::Khz1600 => 1625.0,
    }
}

/// Computes the time on air of `pkt` in milliseconds
pub fn time_on_air(pkt: &TxPacket) -> TimeOnAir {
    let sf = pkt.datarate as u8 as f64;
    let cr = pkt.coderate as u8 as f64;
    let size = pkt.size() as f64;

    let fine_synch = pkt.datarate as u8 <= 6;
    let long_interleaving = pkt.coderate.is_long_interleaving();

    let symbol_period = 2f64.powf(sf) / symbol_rate_khz(pkt.bandwidth);

    let fec_rate = if long_interleaving {
        // 4/8 is coded as 7
        let cr_is_7 = if pkt.coderate as u8 == 7 { 1.0 } else { 0.0 };
        4.0 / (cr + cr_is_7)
    } else {
        4.0 / (4.0 + cr)
    };

    let total_bytes_nb = size + if pkt.no_crc { 0.0 } else { 2.0 };
    let tx_bits_symbol = sf - if pkt.datarate as u8 >= 11 { 2.0 } else { 0.0 };

    let nsymbol_header = if pkt.no_header { 0.0 } else { 20.0 };
    let mut tx_infobits_header =
        sf * 4.0 + if fine_synch { 8.0 } else { 0.0 } - 8.0 - nsymbol_header;

    let symbols_nb_data = if !long_interleaving {
        let tx_infobits_payload = (8.0 * total_bytes_nb - tx_infobits_header).max(0.0);
        8.0 + (tx_infobits_payload / 4.0 / tx_bits_symbol).ceil() * (cr + 4.0)
    } else if !pkt.no_header {
        if tx_infobits_header < 8.0 * total_bytes_nb {
            tx_infobits_header = tx_infobits_header.min(8.0 * size);
        }
        let tx_infobits_payload = (8.0 * total_bytes_nb - tx_infobits_header).max(0.0);
        8.0 + (tx_infobits_payload / fec_rate / tx_bits_symbol).ceil()
    } else {
        let tx_bits_symbol_start = sf - 2.0 + if fine_synch { 2.0 } else { 0.0 };
        let symbols_nb_start = (8.0 * total_bytes_nb / fec_rate / tx_bits_symbol_start).ceil();
        if symbols_nb_start < 8.0 {
            symbols_nb_start
        } else {
            let tx_codedbits_header = tx_bits_symbol_start * 8.0;
            let tx_codedbits_payload = 8.0 * total_bytes_nb / fec_rate - tx_codedbits_header;
            8.0 + (tx_codedbits_payload / tx_bits_symbol).ceil()
        }
    };

    let symbols_nb_preamble = pkt.preamble as f64 + 4.25 + if fine_synch { 2.0 } else { 0.0 };
    let exact_ms = (symbols_nb_preamble + symbols_nb_data) * symbol_period;

    TimeOnAir {
        ms: exact_ms.ceil() as u32,
        exact_ms,
    }
}

/// Nominal bandwidth in kHz
pub fn bw_khz(bandwidth: Bandwidth) -> u16 {
    bandwidth.khz()
}
