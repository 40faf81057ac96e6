use ipnet::Ipv4Net;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;

/// IPv4 blocks that never host a publicly reachable proxy.
const NON_ROUTABLE: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 0, 0, 0), 24),
    (Ipv4Addr::new(192, 0, 2, 0), 24),
    (Ipv4Addr::new(192, 88, 99, 0), 24),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(198, 18, 0, 0), 15),
    (Ipv4Addr::new(198, 51, 100, 0), 24),
    (Ipv4Addr::new(203, 0, 113, 0), 24),
    (Ipv4Addr::new(224, 0, 0, 0), 4),
    (Ipv4Addr::new(240, 0, 0, 0), 4),
];

/// Whether `ip` lies outside every private, reserved and special-purpose block.
pub fn is_routable(ip: Ipv4Addr) -> bool {
    !NON_ROUTABLE.iter().any(|&(net, prefix)| {
        Ipv4Net::new(net, prefix)
            .map(|n| n.contains(&ip))
            .unwrap_or(false)
    })
}

/// Draws routable IPv4 candidates from a generator owned by a single worker.
#[derive(Debug)]
pub struct AddressSampler {
    rng: StdRng,
    rejected: u64,
}

impl AddressSampler {
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { rng, rejected: 0 }
    }

    /// Uniform over the 32-bit space, retrying until the draw is routable.
    pub fn sample(&mut self) -> Ipv4Addr {
        loop {
            let ip = Ipv4Addr::from(self.rng.gen::<u32>());
            if is_routable(ip) {
                return ip;
            }
            self.rejected += 1;
        }
    }

    /// Draws discarded as non-routable so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
