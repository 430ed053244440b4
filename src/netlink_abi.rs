//! Hand-rolled Linux `NETLINK_ROUTE`/`ICMP6_FILTER` kernel ABI structures.
//!
//! These mirror `<linux/netlink.h>`/`<linux/rtnetlink.h>`/`<netinet/icmp6.h>`
//! exactly; they are stable kernel-facing layouts, not library types, which is
//! why they are defined locally rather than pulled from a crate.

use std::mem::size_of;

pub const NLMSG_ALIGNTO: usize = 4;

pub const NLMSG_NOOP: u16 = 1;
pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;

pub const RTM_NEWLINK: u16 = 16;
pub const RTM_DELLINK: u16 = 17;
pub const RTM_SETLINK: u16 = 19;
pub const RTM_NEWADDR: u16 = 20;
pub const RTM_DELADDR: u16 = 21;

pub const RTMGRP_LINK: u32 = 0x1;
pub const RTMGRP_IPV6_IFADDR: u32 = 0x100;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub __ifi_pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SockAddrNl {
    pub nl_family: libc::sa_family_t,
    pub nl_pad: u16,
    pub nl_pid: u32,
    pub nl_groups: u32,
}

fn align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// One decoded netlink message header plus its payload, borrowed from the
/// receive buffer (`NLMSG_OK`/`NLMSG_NEXT` walked by hand).
pub struct NlMsg<'a> {
    pub header: NlMsgHdr,
    pub payload: &'a [u8],
}

/// Walks a netlink receive buffer, yielding each well-formed message.
/// Stops (without error) at the first malformed trailer, mirroring
/// `NLMSG_OK`'s "ignore the rest" behavior.
pub fn iter_messages(buf: &[u8]) -> impl Iterator<Item = NlMsg<'_>> {
    NlMsgIter { buf }
}

struct NlMsgIter<'a> {
    buf: &'a [u8],
}

impl<'a> Iterator for NlMsgIter<'a> {
    type Item = NlMsg<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let hdr_len = size_of::<NlMsgHdr>();
        if self.buf.len() < hdr_len {
            return None;
        }

        let mut raw = [0u8; size_of::<NlMsgHdr>()];
        raw.copy_from_slice(&self.buf[..hdr_len]);
        let header = unsafe { std::mem::transmute::<_, NlMsgHdr>(raw) };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < hdr_len || msg_len > self.buf.len() {
            self.buf = &[];
            return None;
        }

        let payload = &self.buf[hdr_len..msg_len];
        let advance = align(msg_len).min(self.buf.len());
        self.buf = &self.buf[advance..];

        Some(NlMsg { header, payload })
    }
}

/// `ICMP6_FILTER` socket-option payload (`struct icmp6_filter`): a 256-bit
/// bitmap, one bit per ICMPv6 type, indexed `type / 32` / `type % 32`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Icmp6Filter {
    pub filt: [u32; 8],
}

impl Icmp6Filter {
    pub fn block_all() -> Self {
        Self { filt: [0xffff_ffff; 8] }
    }

    pub fn pass(&mut self, icmp_type: u8) {
        let idx = (icmp_type / 32) as usize;
        let bit = (icmp_type % 32) as u32;
        self.filt[idx] &= !(1 << bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_pass_clears_only_the_target_bit() {
        let mut filter = Icmp6Filter::block_all();
        filter.pass(133);
        for (i, word) in filter.filt.iter().enumerate() {
            if i == 133 / 32 {
                assert_eq!(*word, !(1u32 << (133 % 32)));
            } else {
                assert_eq!(*word, 0xffff_ffff);
            }
        }
    }

    #[test]
    fn iter_messages_stops_at_truncated_trailer() {
        let mut buf = vec![0u8; 20];
        buf[0..4].copy_from_slice(&20u32.to_ne_bytes());
        buf[4..6].copy_from_slice(&RTM_NEWLINK.to_ne_bytes());
        let msgs: Vec<_> = iter_messages(&buf).collect();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].header.nlmsg_type, RTM_NEWLINK);

        let truncated = vec![0u8; 3];
        assert_eq!(iter_messages(&truncated).count(), 0);
    }
}
