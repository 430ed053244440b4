//! Configuration object and CLI surface.
//!
//! The core never parses argv itself — `parse_args` is the one seam where
//! untrusted text becomes the immutable `Configuration` the rest of the
//! daemon is built around.

use std::net::Ipv6Addr;

use clap::{Arg, ArgAction, Command};

use crate::constants::{MAX_PREFIXES, MAX_RDNSS};
use crate::error::AppError;

/// A single advertised prefix (always /64).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixEntry {
    pub addr: Ipv6Addr,
    pub on_link: bool,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub ifname: String,
    pub prefixes: Vec<PrefixEntry>,
    pub rdnss: Vec<Ipv6Addr>,
    pub default_lifetime: u16,
}

/// Parses `addr` or `addr/64`. Any other prefix length, or a host part with
/// nonzero low 64 bits, is rejected.
pub fn parse_prefix(input: &str) -> Result<Ipv6Addr, AppError> {
    let (addr_str, len_str) = match input.split_once('/') {
        Some((a, l)) => (a, Some(l)),
        None => (input, None),
    };

    if let Some(len_str) = len_str {
        if len_str != "64" {
            return Err(AppError::Config(format!(
                "invalid prefix {input} (only prefixes of length 64 are supported)"
            )));
        }
    }

    let addr: Ipv6Addr = addr_str
        .parse()
        .map_err(|_| AppError::Config(format!("invalid prefix {input}")))?;

    let octets = addr.octets();
    if octets[8..] != [0u8; 8] {
        return Err(AppError::Config(format!(
            "invalid prefix {input} (only prefixes of length 64 are supported)"
        )));
    }

    Ok(addr)
}

fn build_command() -> Command {
    Command::new("radv6d")
        .about("Minimal IPv6 Router Advertisement daemon")
        .arg(
            Arg::new("interface")
                .short('i')
                .value_name("IFNAME")
                .help("Interface to advertise on")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("prefix_not_onlink")
                .short('a')
                .value_name("PREFIX")
                .help("Advertise PREFIX without the on-link flag")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("prefix_onlink")
                .short('p')
                .value_name("PREFIX")
                .help("Advertise PREFIX with the on-link flag")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("default_lifetime")
                .long("default-lifetime")
                .value_name("SECONDS")
                .help("Router lifetime in seconds (0 = not a default router)")
                .default_value("0")
                .num_args(1),
        )
        .arg(
            Arg::new("rdnss")
                .long("rdnss")
                .value_name("IPV6")
                .help("Recursive DNS server address")
                .action(ArgAction::Append),
        )
}

/// Parses `argv` (excluding the program name) into a `Configuration`.
///
/// Preserves the relative command-line order of `-a` and `-p` occurrences:
/// both flags append to the same ordered `prefixes` list, so
/// `-p 2001:db8::/64 -a 2001:db8:1::/64` and the flags swapped produce
/// different, externally observable option orderings in the emitted RA.
pub fn parse_args<I, T>(args: I) -> Result<Configuration, AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = match build_command().try_get_matches_from(args) {
        Ok(m) => m,
        Err(e)
            if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion =>
        {
            // clap's own usage/version text satisfies the `-h` contract;
            // print it and exit 0 without ever reaching AppError::Config's
            // exit-1 path.
            e.exit();
        }
        Err(e) => return Err(AppError::Config(e.to_string())),
    };

    if matches
        .get_occurrences::<String>("interface")
        .map(|o| o.count())
        .unwrap_or(0)
        > 1
    {
        return Err(AppError::Config(
            "multiple interfaces are not supported".to_string(),
        ));
    }
    let ifname = matches
        .get_one::<String>("interface")
        .expect("required")
        .clone();

    let mut ordered_prefixes: Vec<(usize, PrefixEntry)> = Vec::new();
    if let (Some(values), Some(indices)) = (
        matches.get_many::<String>("prefix_not_onlink"),
        matches.indices_of("prefix_not_onlink"),
    ) {
        for (idx, value) in indices.zip(values) {
            let addr = parse_prefix(value)?;
            ordered_prefixes.push((idx, PrefixEntry { addr, on_link: false }));
        }
    }
    if let (Some(values), Some(indices)) = (
        matches.get_many::<String>("prefix_onlink"),
        matches.indices_of("prefix_onlink"),
    ) {
        for (idx, value) in indices.zip(values) {
            let addr = parse_prefix(value)?;
            ordered_prefixes.push((idx, PrefixEntry { addr, on_link: true }));
        }
    }
    ordered_prefixes.sort_by_key(|(idx, _)| *idx);

    if ordered_prefixes.len() > MAX_PREFIXES {
        return Err(AppError::Config(format!(
            "maximum number of prefixes is {MAX_PREFIXES}"
        )));
    }
    if ordered_prefixes.is_empty() {
        return Err(AppError::Config(
            "interface and prefix arguments are required".to_string(),
        ));
    }
    let prefixes: Vec<PrefixEntry> = ordered_prefixes.into_iter().map(|(_, p)| p).collect();

    let mut rdnss = Vec::new();
    if let Some(values) = matches.get_many::<String>("rdnss") {
        for value in values {
            let addr: Ipv6Addr = value
                .parse()
                .map_err(|_| AppError::Config(format!("invalid RDNSS IP address {value}")))?;
            rdnss.push(addr);
        }
    }
    if rdnss.len() > MAX_RDNSS {
        return Err(AppError::Config(format!(
            "maximum number of RDNSS IPs is {MAX_RDNSS}"
        )));
    }

    let default_lifetime: u16 = matches
        .get_one::<String>("default_lifetime")
        .expect("has default")
        .parse()
        .map_err(|_| AppError::Config("invalid default lifetime".to_string()))?;

    Ok(Configuration {
        ifname,
        prefixes,
        rdnss,
        default_lifetime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("radv6d".to_string())
            .chain(v.iter().map(|s| s.to_string()))
            .collect()
    }

    #[test]
    fn accepts_slash_64_prefix() {
        assert!(parse_prefix("2001:db8::/64").is_ok());
        assert!(parse_prefix("2001:db8::").is_ok());
    }

    #[test]
    fn rejects_nonzero_host_bits() {
        assert!(parse_prefix("2001:db8::1/64").is_err());
    }

    #[test]
    fn rejects_non_64_length() {
        assert!(parse_prefix("2001:db8::/48").is_err());
    }

    #[test]
    fn on_link_flag_distinguishes_a_and_p() {
        let cfg = parse_args(args(&["-i", "eth0", "-p", "2001:db8::/64"])).unwrap();
        assert_eq!(cfg.prefixes[0].on_link, true);

        let cfg = parse_args(args(&["-i", "eth0", "-a", "2001:db8::/64"])).unwrap();
        assert_eq!(cfg.prefixes[0].on_link, false);
    }

    #[test]
    fn preserves_interleaved_order_across_a_and_p() {
        let cfg = parse_args(args(&[
            "-i",
            "eth0",
            "-p",
            "2001:db8::/64",
            "-a",
            "2001:db8:1::/64",
        ]))
        .unwrap();
        assert_eq!(cfg.prefixes.len(), 2);
        assert_eq!(cfg.prefixes[0].addr, "2001:db8::".parse::<Ipv6Addr>().unwrap());
        assert!(cfg.prefixes[0].on_link);
        assert_eq!(
            cfg.prefixes[1].addr,
            "2001:db8:1::".parse::<Ipv6Addr>().unwrap()
        );
        assert!(!cfg.prefixes[1].on_link);
    }

    #[test]
    fn rejects_duplicate_interface_flag() {
        let err = parse_args(args(&[
            "-i", "eth0", "-i", "eth1", "-p", "2001:db8::/64",
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn rejects_too_many_rdnss() {
        let err = parse_args(args(&[
            "-i", "eth0", "-p", "2001:db8::/64",
            "--rdnss", "2001:db8::1",
            "--rdnss", "2001:db8::2",
            "--rdnss", "2001:db8::3",
            "--rdnss", "2001:db8::4",
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn default_lifetime_parses() {
        let cfg = parse_args(args(&[
            "-i",
            "eth0",
            "-p",
            "2001:db8::/64",
            "--default-lifetime",
            "1800",
        ]))
        .unwrap();
        assert_eq!(cfg.default_lifetime, 1800);
    }
}
