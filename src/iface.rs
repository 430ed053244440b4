//! Interface liveness tracking: resolves the configured interface's
//! (ifindex, MAC, link-local address), joins the all-routers multicast
//! group on the ICMP socket, and reacts to kernel link/address change
//! notifications.

use std::mem::size_of;
use std::net::Ipv6Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tokio::io::unix::{AsyncFd, AsyncFdReadyGuard};
use tracing::warn;

use crate::error::AppError;
use crate::icmp::{IcmpEndpoint, JoinOutcome};
use crate::netlink_abi::{
    self, IfAddrMsg, IfInfoMsg, SockAddrNl, NLMSG_DONE, NLMSG_ERROR, RTMGRP_IPV6_IFADDR,
    RTMGRP_LINK, RTM_DELADDR, RTM_DELLINK, RTM_NEWADDR, RTM_NEWLINK, RTM_SETLINK,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceState {
    pub ok: bool,
    pub ifindex: Option<u32>,
    pub mac: Option<[u8; 6]>,
    pub link_local_addr: Option<Ipv6Addr>,
}

pub struct InterfaceMonitor {
    ifname: String,
    state: InterfaceState,
    notify: AsyncFd<OwnedFd>,
}

impl InterfaceMonitor {
    /// Opens the `NETLINK_ROUTE` notification socket and performs the
    /// initial `refresh()` so the interface state reflects reality before
    /// the event loop starts waiting on anything.
    pub fn new(ifname: String, icmp: &IcmpEndpoint) -> Result<Self, AppError> {
        let notify = open_rtnl_socket()?;
        let mut monitor = Self {
            ifname,
            state: InterfaceState::default(),
            notify,
        };
        monitor.refresh(icmp);
        Ok(monitor)
    }

    pub fn state(&self) -> InterfaceState {
        self.state
    }

    pub async fn notification_readable(&self) -> std::io::Result<AsyncFdReadyGuard<'_, OwnedFd>> {
        self.notify.readable().await
    }

    /// Re-evaluates interface readiness end to end.
    /// Returns `true` if an immediate RA should be scheduled.
    pub fn refresh(&mut self, icmp: &IcmpEndpoint) -> bool {
        let previous = self.state;
        let mut next = InterfaceState::default();

        let ifindex = match nix::net::if_::if_nametoindex(self.ifname.as_str()) {
            Ok(idx) if idx != 0 => idx,
            _ => {
                self.state = next;
                return false;
            }
        };
        next.ifindex = Some(ifindex);

        let Some((mac, link_local)) = resolve_mac_and_link_local(&self.ifname) else {
            self.state = next;
            return false;
        };
        let Some(mac) = mac else {
            self.state = next;
            return false;
        };
        next.mac = Some(mac);
        let Some(link_local) = link_local else {
            self.state = next;
            return false;
        };
        next.link_local_addr = Some(link_local);

        let joined = match icmp.join_all_routers(ifindex) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "can't join multicast group");
                self.state = next;
                return false;
            }
        };

        if let Err(e) = icmp.bind_to_device(&self.ifname) {
            warn!(error = %e, "can't bind to device");
        }

        next.ok = true;
        self.state = next;

        previous != next || joined == JoinOutcome::Fresh
    }

    /// Drains one pending notification datagram through the readiness
    /// `guard`, routed through `AsyncFdReadyGuard::try_io` so tokio clears
    /// readiness correctly on `EWOULDBLOCK` (the same pattern
    /// `IcmpEndpoint::poll_rs` uses). A free function rather than a method:
    /// it must not hold any borrow of the `InterfaceMonitor` the guard
    /// itself borrows from, so the caller is free to pass the result into
    /// `process_notification(&mut self, ...)` afterwards.
    pub fn recv_notification(
        guard: &mut AsyncFdReadyGuard<'_, OwnedFd>,
    ) -> Result<Option<Vec<u8>>, AppError> {
        let mut buf = [0u8; 4096];
        match guard.try_io(|fd| {
            let ret = unsafe {
                libc::recv(fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
            };
            if ret < 0 {
                Err(std::io::Error::last_os_error())
            } else {
                Ok(ret as usize)
            }
        }) {
            Ok(Ok(n)) => Ok(Some(buf[..n].to_vec())),
            Ok(Err(e)) => Err(AppError::Io(e)),
            Err(_would_block) => Ok(None),
        }
    }

    /// Parses a drained notification datagram and decides whether it
    /// warrants a `refresh()`.
    pub fn process_notification(&mut self, buf: &[u8], icmp: &IcmpEndpoint) -> Result<bool, AppError> {
        for msg in netlink_abi::iter_messages(buf) {
            match msg.header.nlmsg_type {
                NLMSG_DONE => return Ok(false),
                NLMSG_ERROR => {
                    return Err(AppError::Other(anyhow::anyhow!("netlink error reply")));
                }
                RTM_NEWLINK | RTM_DELLINK | RTM_SETLINK => {
                    if self.link_event_matters(msg.header.nlmsg_type, msg.payload) {
                        return Ok(self.refresh(icmp));
                    }
                }
                RTM_NEWADDR | RTM_DELADDR => {
                    if self.addr_event_matters(msg.header.nlmsg_type, msg.payload) {
                        return Ok(self.refresh(icmp));
                    }
                }
                _ => {}
            }
        }

        Ok(false)
    }

    fn link_event_matters(&self, kind: u16, payload: &[u8]) -> bool {
        let Some(info) = parse_ifinfomsg(payload) else {
            return false;
        };
        let tracked = self.state.ifindex;
        match kind {
            RTM_NEWLINK => !self.state.ok,
            RTM_SETLINK => {
                if tracked == Some(info.ifi_index as u32) {
                    true
                } else {
                    !self.state.ok
                }
            }
            RTM_DELLINK => self.state.ok && tracked == Some(info.ifi_index as u32),
            _ => false,
        }
    }

    fn addr_event_matters(&self, kind: u16, payload: &[u8]) -> bool {
        let Some(info) = parse_ifaddrmsg(payload) else {
            return false;
        };
        let tracked = self.state.ifindex;
        match kind {
            RTM_NEWADDR => !self.state.ok && tracked == Some(info.ifa_index),
            RTM_DELADDR => self.state.ok && tracked == Some(info.ifa_index),
            _ => false,
        }
    }
}

fn parse_ifinfomsg(payload: &[u8]) -> Option<IfInfoMsg> {
    if payload.len() < size_of::<IfInfoMsg>() {
        return None;
    }
    let mut raw = [0u8; size_of::<IfInfoMsg>()];
    raw.copy_from_slice(&payload[..size_of::<IfInfoMsg>()]);
    Some(unsafe { std::mem::transmute(raw) })
}

fn parse_ifaddrmsg(payload: &[u8]) -> Option<IfAddrMsg> {
    if payload.len() < size_of::<IfAddrMsg>() {
        return None;
    }
    let mut raw = [0u8; size_of::<IfAddrMsg>()];
    raw.copy_from_slice(&payload[..size_of::<IfAddrMsg>()]);
    Some(unsafe { std::mem::transmute(raw) })
}

fn open_rtnl_socket() -> Result<AsyncFd<OwnedFd>, AppError> {
    let fd = unsafe {
        libc::socket(
            libc::AF_NETLINK,
            libc::SOCK_DGRAM | libc::SOCK_NONBLOCK,
            libc::NETLINK_ROUTE,
        )
    };
    if fd < 0 {
        return Err(AppError::Io(std::io::Error::last_os_error()));
    }
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };

    let addr = SockAddrNl {
        nl_family: libc::AF_NETLINK as libc::sa_family_t,
        nl_pad: 0,
        nl_pid: 0,
        nl_groups: RTMGRP_LINK | RTMGRP_IPV6_IFADDR,
    };
    let ret = unsafe {
        libc::bind(
            owned.as_raw_fd(),
            &addr as *const SockAddrNl as *const libc::sockaddr,
            size_of::<SockAddrNl>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(AppError::Io(std::io::Error::last_os_error()));
    }

    AsyncFd::new(owned).map_err(AppError::Io)
}

/// Queries the hardware address and first `fe80::/10` address assigned to
/// `ifname` via `getifaddrs(3)`.
fn resolve_mac_and_link_local(ifname: &str) -> Option<(Option<[u8; 6]>, Option<Ipv6Addr>)> {
    let addrs = match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!(error = %e, "getifaddrs");
            return None;
        }
    };

    let mut mac = None;
    let mut link_local = None;

    for addr in addrs {
        if addr.interface_name != ifname {
            continue;
        }

        if mac.is_none() {
            if let Some(link_addr) = addr.address.as_ref().and_then(|a| a.as_link_addr()) {
                if let Some(bytes) = link_addr.addr() {
                    mac = Some(bytes);
                }
            }
        }

        if link_local.is_none() {
            if let Some(sockaddr_in6) = addr.address.as_ref().and_then(|a| a.as_sockaddr_in6()) {
                let candidate = sockaddr_in6.ip();
                if is_link_local(&candidate) {
                    link_local = Some(candidate);
                }
            }
        }
    }

    Some((mac, link_local))
}

fn is_link_local(addr: &Ipv6Addr) -> bool {
    let segs = addr.segments();
    (segs[0] & 0xffc0) == 0xfe80
}
