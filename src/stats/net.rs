use std::collections::HashMap;

use super::frame::NetworkStats;

/// Returns the bytes received and transmitted, summed over all interfaces.
pub fn network_io(networks: &HashMap<String, NetworkStats>) -> (u64, u64) {
    networks.values().fold((0u64, 0u64), |(rx, tx), net| {
        (rx.saturating_add(net.rx_bytes), tx.saturating_add(net.tx_bytes))
    })
}
