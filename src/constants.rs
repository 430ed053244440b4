//! Compile-time protocol and scheduling constants (RFC 4861 §6.2.1, RFC 8106).

use std::time::Duration;

/// Hard caps on the Configuration, mirrored from the wire: an RA this long
/// would no longer fit comfortably inside the Ethernet MTU.
pub const MAX_PREFIXES: usize = 8;
pub const MAX_RDNSS: usize = 3;

pub const ADV_VALID_LIFETIME: u32 = 86400;
pub const ADV_PREFERRED_LIFETIME: u32 = 14400;
pub const ADV_CUR_HOP_LIMIT: u8 = 64;
pub const ADV_RDNSS_LIFETIME: u32 = 1200;

pub const MIN_RTR_ADV_INTERVAL: Duration = Duration::from_secs(200);
pub const MAX_RTR_ADV_INTERVAL: Duration = Duration::from_secs(600);

pub const MAX_RA_DELAY_TIME: Duration = Duration::from_millis(500);
pub const MIN_DELAY_BETWEEN_RAS: Duration = Duration::from_millis(3000);

/// Required incoming/outgoing hop limit for all Neighbor Discovery traffic
/// (RFC 4861 §6.1.1/§6.1.2 "ND security" check).
pub const ND_HOP_LIMIT: u8 = 255;

pub const ICMPV6_ROUTER_SOLICIT: u8 = 133;
pub const ICMPV6_ROUTER_ADVERT: u8 = 134;

pub const ND_OPT_SOURCE_LINKADDR: u8 = 1;
pub const ND_OPT_PREFIX_INFORMATION: u8 = 3;
pub const ND_OPT_RDNSS: u8 = 25;

pub const ND_OPT_PI_FLAG_ONLINK: u8 = 0x80;
pub const ND_OPT_PI_FLAG_AUTO: u8 = 0x40;
