//! Manage tokens for remote client IPs.

use crc::{Crc, CRC_32_ISCSI};
use rand::Rng;
use std::{
    fmt::{self, Debug, Formatter},
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};

use tracing::trace;

use crate::common::WriteToken;

const SECRET_SIZE: usize = 20;
const TOKEN_SIZE: usize = 4;
const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Interval after which the current secret is rotated.
pub const TOKEN_ROTATE_INTERVAL: Duration = Duration::from_secs(60 * 5);

/// Tokens generator.
///
/// Tokens are bound to the requester's IP, and stay valid for one rotation
/// after the one they were issued in.
///
/// Read [BEP_0005](https://www.bittorrent.org/beps/bep_0005.html) for more information.
#[derive(Clone)]
pub struct Tokens {
    prev_secret: [u8; SECRET_SIZE],
    curr_secret: [u8; SECRET_SIZE],
    last_updated: Instant,
}

impl Debug for Tokens {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Tokens (_)")
    }
}

impl Tokens {
    /// Create a Tokens generator.
    pub fn new() -> Self {
        Tokens {
            prev_secret: random(),
            curr_secret: random(),
            last_updated: Instant::now(),
        }
    }

    // === Public Methods ===

    /// Returns `true` if the current secret needs to be updated after an interval.
    pub fn should_update(&self) -> bool {
        self.last_updated.elapsed() > TOKEN_ROTATE_INTERVAL
    }

    /// Validate that the token was generated with the current or previous secret.
    pub fn validate(&self, address: SocketAddr, token: &WriteToken) -> bool {
        let prev = internal_generate_token(address, self.prev_secret);
        let curr = internal_generate_token(address, self.curr_secret);

        token.as_bytes() == &curr[..] || token.as_bytes() == &prev[..]
    }

    /// Rotate the tokens secret.
    pub fn rotate(&mut self) {
        trace!("Rotating secrets");

        self.prev_secret = self.curr_secret;
        self.curr_secret = random();

        self.last_updated = Instant::now();
    }

    /// Generates a new token for a remote peer.
    pub fn generate_token(&self, address: SocketAddr) -> WriteToken {
        WriteToken::new(internal_generate_token(address, self.curr_secret).to_vec())
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Self::new()
    }
}

fn internal_generate_token(address: SocketAddr, secret: [u8; SECRET_SIZE]) -> [u8; TOKEN_SIZE] {
    let mut digest = CASTAGNOLI.digest();

    match address.ip() {
        IpAddr::V4(ip) => digest.update(&ip.octets()),
        IpAddr::V6(ip) => digest.update(&ip.octets()),
    }
    digest.update(&secret);

    let checksum = digest.finalize();

    checksum.to_be_bytes()
}

fn random() -> [u8; SECRET_SIZE] {
    rand::thread_rng().gen()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_tokens() {
        let tokens = Tokens::new();

        let address = SocketAddr::from(([127, 0, 0, 1], 6881));
        let token = tokens.generate_token(address);

        assert!(tokens.validate(address, &token))
    }

    #[test]
    fn token_bound_to_ip() {
        let tokens = Tokens::new();

        let token = tokens.generate_token(SocketAddr::from(([127, 0, 0, 1], 6881)));

        assert!(tokens.validate(SocketAddr::from(([127, 0, 0, 1], 9999)), &token));
        assert!(!tokens.validate(SocketAddr::from(([127, 0, 0, 2], 6881)), &token));
    }

    #[test]
    fn survives_one_rotation() {
        let mut tokens = Tokens::new();
        let address = SocketAddr::from(([127, 0, 0, 1], 6881));
        let token = tokens.generate_token(address);

        tokens.rotate();
        assert!(tokens.validate(address, &token));

        tokens.rotate();
        assert!(!tokens.validate(address, &token));
    }
}
