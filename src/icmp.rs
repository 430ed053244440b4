//! Raw ICMPv6 socket: RA emission, RS reception/validation, and the
//! all-routers multicast membership/bind-to-device calls `InterfaceMonitor`
//! drives through it.

use std::net::Ipv6Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::unix::AsyncFd;

use crate::config::Configuration;
use crate::constants::ND_HOP_LIMIT;
use crate::error::AppError;
use crate::iface::InterfaceState;
use crate::netlink_abi::Icmp6Filter;
use crate::packet::{self, validate_router_solicit};

const ALL_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);
const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Fresh,
    Already,
}

pub struct IcmpEndpoint {
    fd: AsyncFd<OwnedFd>,
}

impl IcmpEndpoint {
    /// Opens the raw ICMPv6 socket and applies the fixed options:
    /// hop-limit 255 on multicast sends, loopback enabled, hop
    /// limit delivered on receive, and only RS (133) passed by the kernel
    /// filter.
    pub fn new() -> Result<Self, AppError> {
        let socket = Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6))
            .map_err(AppError::Io)?;
        socket.set_multicast_hops_v6(255).map_err(AppError::Io)?;
        socket.set_multicast_loop_v6(true).map_err(AppError::Io)?;
        socket.set_nonblocking(true).map_err(AppError::Io)?;

        let raw_fd = socket.as_raw_fd();
        std::mem::forget(socket);
        let owned = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        set_recv_hoplimit(owned.as_raw_fd())?;
        set_icmp6_filter(owned.as_raw_fd())?;

        let fd = AsyncFd::new(owned).map_err(AppError::Io)?;
        Ok(Self { fd })
    }

    /// Joins `ff02::2` scoped to `ifindex`, reporting the FRESH/ALREADY
    /// outcome `InterfaceMonitor` needs. Returns `Err` for any other
    /// `setsockopt` failure so the caller can log and retry on the next
    /// notification.
    pub fn join_all_routers(&self, ifindex: u32) -> std::io::Result<JoinOutcome> {
        let mreq = libc::ipv6_mreq {
            ipv6mr_multiaddr: libc::in6_addr {
                s6_addr: ALL_ROUTERS.octets(),
            },
            ipv6mr_interface: ifindex,
        };
        let ret = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::IPPROTO_IPV6,
                libc::IPV6_ADD_MEMBERSHIP,
                &mreq as *const libc::ipv6_mreq as *const libc::c_void,
                std::mem::size_of::<libc::ipv6_mreq>() as libc::socklen_t,
            )
        };
        if ret == 0 {
            return Ok(JoinOutcome::Fresh);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EADDRINUSE) {
            return Ok(JoinOutcome::Already);
        }
        Err(err)
    }

    /// `SO_BINDTODEVICE`.
    pub fn bind_to_device(&self, ifname: &str) -> std::io::Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_BINDTODEVICE,
                ifname.as_ptr() as *const libc::c_void,
                ifname.len() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    pub async fn readable(
        &self,
    ) -> std::io::Result<tokio::io::unix::AsyncFdReadyGuard<'_, OwnedFd>> {
        self.fd.readable().await
    }

    /// Builds and sends one RA to `ff02::1` scoped to `iface.ifindex`.
    /// Returns `Ok(false)` (not an error) if the
    /// interface isn't ready; `Err` on a genuine send failure, which the
    /// caller treats as loss of readiness.
    pub fn send_advert(&self, cfg: &Configuration, iface: &InterfaceState) -> Result<bool, AppError> {
        let (Some(ifindex), Some(mac), Some(src)) = (iface.ifindex, iface.mac, iface.link_local_addr)
        else {
            return Ok(false);
        };
        if !iface.ok {
            return Ok(false);
        }

        let payload = packet::build_advert(cfg, mac);

        let dest = libc::sockaddr_in6 {
            sin6_family: libc::AF_INET6 as libc::sa_family_t,
            sin6_port: 0,
            sin6_flowinfo: 0,
            sin6_addr: libc::in6_addr {
                s6_addr: ALL_NODES.octets(),
            },
            sin6_scope_id: ifindex,
        };

        let mut cbuf = cmsg::PktInfoCmsg::new(src, ifindex);
        let iov = libc::iovec {
            iov_base: payload.as_ptr() as *mut libc::c_void,
            iov_len: payload.len(),
        };
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_name = &dest as *const libc::sockaddr_in6 as *mut libc::c_void;
        msg.msg_namelen = std::mem::size_of::<libc::sockaddr_in6>() as u32;
        msg.msg_iov = &iov as *const libc::iovec as *mut libc::iovec;
        msg.msg_iovlen = 1;
        msg.msg_control = cbuf.as_mut_ptr();
        msg.msg_controllen = cbuf.len();

        let ret = unsafe { libc::sendmsg(self.fd.as_raw_fd(), &msg, 0) };
        if ret < 0 {
            return Err(AppError::Io(std::io::Error::last_os_error()));
        }
        Ok(true)
    }

    /// Reads one pending datagram through the readiness `guard` and
    /// validates it as an RS. Routing the syscall
    /// through `AsyncFdReadyGuard::try_io` lets tokio clear readiness
    /// correctly on `EWOULDBLOCK`, the same pattern this pack's raw-socket
    /// handlers use for their read loops.
    ///
    /// `Ok(None)` covers every form of "nothing to act on" — no data,
    /// malformed packet, wrong hop limit — all silently discarded.
    pub fn poll_rs(
        &self,
        guard: &mut tokio::io::unix::AsyncFdReadyGuard<'_, OwnedFd>,
    ) -> Result<Option<()>, AppError> {
        match guard.try_io(|_| self.recv_and_validate_rs()) {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(AppError::Io(e)),
            Err(_would_block) => Ok(None),
        }
    }

    fn recv_and_validate_rs(&self) -> std::io::Result<Option<()>> {
        let mut buf = [0u8; 1500];
        let mut cbuf = [0u8; 256];
        let mut src: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };

        let iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_name = &mut src as *mut libc::sockaddr_in6 as *mut libc::c_void;
        msg.msg_namelen = std::mem::size_of::<libc::sockaddr_in6>() as u32;
        msg.msg_iov = &iov as *const libc::iovec as *mut libc::iovec;
        msg.msg_iovlen = 1;
        msg.msg_control = cbuf.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = cbuf.len();

        let n = unsafe { libc::recvmsg(self.fd.as_raw_fd(), &mut msg, 0) };
        if n < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let hop_limit = cmsg::find_hoplimit(&msg);
        if hop_limit != Some(ND_HOP_LIMIT as i32) {
            return Ok(None);
        }

        let data = &buf[..n as usize];
        let src_unspecified = unsafe { src.sin6_addr.s6_addr } == [0u8; 16];
        match validate_router_solicit(data, src_unspecified) {
            Some(_options) => Ok(Some(())),
            None => Ok(None),
        }
    }
}

fn set_recv_hoplimit(fd: std::os::fd::RawFd) -> Result<(), AppError> {
    let one: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IPV6,
            libc::IPV6_RECVHOPLIMIT,
            &one as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(AppError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn set_icmp6_filter(fd: std::os::fd::RawFd) -> Result<(), AppError> {
    let mut filter = Icmp6Filter::block_all();
    filter.pass(crate::constants::ICMPV6_ROUTER_SOLICIT);
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_ICMPV6,
            libc::ICMP6_FILTER,
            &filter as *const Icmp6Filter as *const libc::c_void,
            std::mem::size_of::<Icmp6Filter>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(AppError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Ancillary-data (cmsg) helpers: hand-rolled `CMSG_*` macro equivalents,
/// since `nix`'s `ControlMessageOwned` doesn't cover `IPV6_PKTINFO` send
/// construction at the raw-fd level used here.
mod cmsg {
    use std::net::Ipv6Addr;

    fn cmsg_align(len: usize) -> usize {
        (len + std::mem::size_of::<usize>() - 1) & !(std::mem::size_of::<usize>() - 1)
    }

    fn cmsg_space(len: usize) -> usize {
        cmsg_align(std::mem::size_of::<libc::cmsghdr>()) + cmsg_align(len)
    }

    pub struct PktInfoCmsg {
        buf: Vec<u8>,
    }

    impl PktInfoCmsg {
        pub fn new(src: Ipv6Addr, ifindex: u32) -> Self {
            let data_len = std::mem::size_of::<libc::in6_pktinfo>();
            let mut buf = vec![0u8; cmsg_space(data_len)];

            let hdr_len = cmsg_align(std::mem::size_of::<libc::cmsghdr>()) + data_len;
            let header = libc::cmsghdr {
                cmsg_len: hdr_len as _,
                cmsg_level: libc::IPPROTO_IPV6,
                cmsg_type: libc::IPV6_PKTINFO,
            };
            let pktinfo = libc::in6_pktinfo {
                ipi6_addr: libc::in6_addr { s6_addr: src.octets() },
                ipi6_ifindex: ifindex as i32,
            };

            unsafe {
                std::ptr::write_unaligned(buf.as_mut_ptr() as *mut libc::cmsghdr, header);
                let data_ptr = buf.as_mut_ptr().add(cmsg_align(std::mem::size_of::<libc::cmsghdr>()));
                std::ptr::write_unaligned(data_ptr as *mut libc::in6_pktinfo, pktinfo);
            }

            Self { buf }
        }

        pub fn as_mut_ptr(&mut self) -> *mut libc::c_void {
            self.buf.as_mut_ptr() as *mut libc::c_void
        }

        pub fn len(&self) -> usize {
            self.buf.len()
        }
    }

    /// Walks the ancillary-data buffer attached to a received message and
    /// returns the `IPV6_HOPLIMIT` value if present.
    pub fn find_hoplimit(msg: &libc::msghdr) -> Option<i32> {
        let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(msg) };
        while !cmsg.is_null() {
            let header = unsafe { std::ptr::read_unaligned(cmsg) };
            if header.cmsg_level == libc::IPPROTO_IPV6 && header.cmsg_type == libc::IPV6_HOPLIMIT {
                let data_ptr = unsafe { libc::CMSG_DATA(cmsg) } as *const libc::c_int;
                let value = unsafe { std::ptr::read_unaligned(data_ptr) };
                return Some(value);
            }
            cmsg = unsafe { libc::CMSG_NXTHDR(msg as *const _ as *mut _, cmsg) };
        }
        None
    }
}
