use std::io::BufRead;

/// Byte and packet counters from `/proc/net/dev`, either for one interface or summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStat {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

impl NetworkStat {
    /// Bytes moved in either direction.
    pub fn total_bytes(&self) -> u64 {
        self.rx_bytes.saturating_add(self.tx_bytes)
    }

    /// Sums the counters of every physical-looking interface in a `/proc/net/dev` listing.
    ///
    /// Loopback and bridge/veth devices are left out, as they double-count container traffic.
    /// Rows with too few columns are skipped, unparsable counters read as zero.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = NetworkStat::default();
        for_each_interface(buf, |iface, s| {
            if !is_ignored_interface(iface) {
                stat += s;
            }
            true
        })?;
        Ok(stat)
    }

    /// Counters of the interface called `name`, or `None` when it is not listed.
    pub fn for_interface<R: BufRead>(buf: &mut R, name: &str) -> std::io::Result<Option<Self>> {
        let mut found = None;
        for_each_interface(buf, |iface, s| {
            if iface == name {
                found = Some(s);
                return false;
            }
            true
        })?;
        Ok(found)
    }
}

impl std::ops::AddAssign for NetworkStat {
    fn add_assign(&mut self, rhs: Self) {
        self.rx_bytes += rhs.rx_bytes;
        self.rx_packets += rhs.rx_packets;
        self.tx_bytes += rhs.tx_bytes;
        self.tx_packets += rhs.tx_packets;
    }
}

const IGNORED_INTERFACES: [&str; 4] = ["lo", "veth", "docker", "nerdctl"];

fn is_ignored_interface(iface: &str) -> bool {
    IGNORED_INTERFACES
        .iter()
        .any(|prefix| iface.starts_with(prefix))
}

/// Receive bytes and packets are columns 0 and 1, transmit bytes and packets columns 8 and 9.
fn stats_from_fields<'a>(fields: impl Iterator<Item = &'a str>) -> Option<NetworkStat> {
    let values: Vec<u64> = fields.map(|f| f.parse().unwrap_or(0)).collect();
    if values.len() < 16 {
        return None;
    }
    Some(NetworkStat {
        rx_bytes: values[0],
        rx_packets: values[1],
        tx_bytes: values[8],
        tx_packets: values[9],
    })
}

/// Walks the interface rows after the two header lines. `visit` returns `false` to stop early.
fn for_each_interface<R: BufRead>(
    buf: &mut R,
    mut visit: impl FnMut(&str, NetworkStat) -> bool,
) -> std::io::Result<()> {
    let mut line = String::new();

    for _ in 0..2 {
        buf.read_line(&mut line)?;
        line.clear();
    }

    while buf.read_line(&mut line)? != 0 {
        if let Some((iface, data)) = line.trim().split_once(':') {
            if let Some(s) = stats_from_fields(data.split_whitespace()) {
                if !visit(iface.trim(), s) {
                    break;
                }
            }
        }
        line.clear();
    }

    Ok(())
}
