//! Single-threaded cooperative event loop tying together the notification
//! socket, the ICMP socket, and the RA deadline.

use tracing::{error, warn};

use crate::clock::Clock;
use crate::config::Configuration;
use crate::icmp::IcmpEndpoint;
use crate::iface::InterfaceMonitor;
use crate::random::RandomSource;
use crate::scheduler::Scheduler;

pub struct Daemon<'a> {
    cfg: Configuration,
    icmp: IcmpEndpoint,
    iface: InterfaceMonitor,
    scheduler: Scheduler<'a>,
}

impl<'a> Daemon<'a> {
    pub fn new(
        cfg: Configuration,
        clock: &'a dyn Clock,
        random: &'a dyn RandomSource,
    ) -> Result<Self, crate::error::AppError> {
        let icmp = IcmpEndpoint::new()?;
        let iface = InterfaceMonitor::new(cfg.ifname.clone(), &icmp)?;
        let scheduler = Scheduler::new(clock, random);
        Ok(Self {
            cfg,
            icmp,
            iface,
            scheduler,
        })
    }

    /// Runs forever. Only a fatal notification-channel error returns.
    pub async fn run(&mut self) -> Result<(), crate::error::AppError> {
        loop {
            tokio::select! {
                biased;

                notify_guard = self.iface.notification_readable() => {
                    let mut guard = notify_guard.map_err(crate::error::AppError::Io)?;
                    if let Some(bytes) = InterfaceMonitor::recv_notification(&mut guard)? {
                        let schedule_now = self.iface.process_notification(&bytes, &self.icmp)?;
                        if schedule_now {
                            self.scheduler.schedule(true);
                        }
                    }
                }

                icmp_guard = self.icmp.readable() => {
                    let mut guard = icmp_guard.map_err(crate::error::AppError::Io)?;
                    match self.icmp.poll_rs(&mut guard) {
                        Ok(Some(())) => self.scheduler.schedule(true),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "error reading RS"),
                    }
                }

                _ = async {
                    if self.iface.state().ok {
                        tokio::time::sleep(self.scheduler.timeout()).await
                    } else {
                        // Not ready: no deadline to wait for. Block until a
                        // notification or RS wakes one of the branches above.
                        std::future::pending::<()>().await
                    }
                } => {}
            }

            if self.scheduler.is_due() {
                match self.icmp.send_advert(&self.cfg, &self.iface.state()) {
                    Ok(true) => self.scheduler.after_send(),
                    Ok(false) => {
                        // Interface not ready; wait for the next readiness
                        // transition instead of busy-looping on the deadline.
                        self.scheduler.schedule(false);
                    }
                    Err(e) => {
                        warn!(error = %e, "send_advert failed");
                        self.scheduler.schedule(false);
                    }
                }
            }
        }
    }
}

pub fn log_fatal(err: &crate::error::AppError) {
    error!(error = %err, "fatal error, exiting");
}
