//! Pre-built mock filesystem scenarios for testing.

use super::filesystem::MockFs;

const NET_DEV_HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

impl MockFs {
    /// Creates a host with loopback, one wired and one wireless interface.
    ///
    /// Totals across all interfaces: 1_000_000 received, 250_000 sent.
    pub fn typical_host() -> Self {
        let fs = Self::new();
        fs.set_uptime(12345.67);
        fs.set_net_dev(&[
            ("lo", 100_000, 100_000),
            ("eth0", 800_000, 120_000),
            ("wlan0", 100_000, 30_000),
        ]);
        fs
    }

    /// Creates a host with no network interfaces at all.
    pub fn no_interfaces() -> Self {
        let fs = Self::new();
        fs.set_uptime(60.0);
        fs.set_net_dev(&[]);
        fs
    }

    /// Rewrites `/proc/net/dev` with the given `(interface, rx_bytes, tx_bytes)` rows.
    pub fn set_net_dev(&self, interfaces: &[(&str, u64, u64)]) {
        let mut content = String::from(NET_DEV_HEADER);
        for (name, rx, tx) in interfaces {
            content.push_str(&format!(
                "{:>6}: {} 100 0 0 0 0 0 0 {} 100 0 0 0 0 0 0\n",
                name, rx, tx
            ));
        }
        self.add_file("/proc/net/dev", content);
    }

    /// Rewrites `/proc/uptime`.
    pub fn set_uptime(&self, seconds: f64) {
        self.add_file("/proc/uptime", format!("{:.2} {:.2}\n", seconds, seconds * 3.0));
    }
}
