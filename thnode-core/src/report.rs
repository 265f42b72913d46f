//! Report delivery coordination
//!
//! The transport itself is a collaborator; this module holds the types
//! the scheduler and the transport agree on, plus [`ReportJob`], the
//! reusable per-cycle value that tracks one report from composition to
//! completion. There is no task to tear down between cycles, just a value
//! to reset.

use crate::hal::NodeAddr;
use crate::payload::ReportBody;

/// How a report is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Best effort, no failure accounting. A retransmitting transport
    /// could stay awake for a minute waiting out its backoff; the node
    /// would rather lose a sample than burn that much battery.
    #[default]
    Unconfirmed,
    /// Acknowledged delivery, used for reachability checks. Failure to
    /// acknowledge counts against the node's failure budget.
    Confirmed,
}

/// One report handed to the transport collaborator.
#[derive(Debug, Clone, Copy)]
pub struct ReportRequest<'a> {
    /// Destination address.
    pub addr: NodeAddr,
    /// Destination port.
    pub port: u16,
    /// Resource path on the sink.
    pub path: &'a str,
    /// Payload bytes, one composed line.
    pub body: &'a str,
    /// Delivery mode.
    pub mode: DeliveryMode,
}

/// Per-cycle report state.
///
/// Holds the composed body and delivery mode from composition until the
/// completion event, then gets reset for the next cycle.
#[derive(Debug, Default)]
pub struct ReportJob {
    body: ReportBody,
    mode: DeliveryMode,
    in_flight: bool,
}

impl ReportJob {
    /// Fresh idle job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a composed body for delivery.
    pub fn prepare(&mut self, body: ReportBody, mode: DeliveryMode) {
        self.body = body;
        self.mode = mode;
        self.in_flight = false;
    }

    /// Mark the staged report as submitted.
    pub fn submitted(&mut self) {
        self.in_flight = true;
    }

    /// Mark the exchange finished.
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    /// Clear everything for the next cycle.
    pub fn reset(&mut self) {
        self.body.clear();
        self.mode = DeliveryMode::Unconfirmed;
        self.in_flight = false;
    }

    /// The staged delivery mode.
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// True while a confirmed exchange is awaiting its completion event.
    pub fn confirm_pending(&self) -> bool {
        self.in_flight && self.mode == DeliveryMode::Confirmed
    }

    /// Build the transport request for the staged body.
    pub fn request<'a>(&'a self, addr: NodeAddr, port: u16, path: &'a str) -> ReportRequest<'a> {
        ReportRequest {
            addr,
            port,
            path,
            body: self.body.as_str(),
            mode: self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ReportBody;

    fn body(s: &str) -> ReportBody {
        let mut b = ReportBody::new();
        let _ = b.push_str(s);
        b
    }

    #[test]
    fn job_lifecycle() {
        let mut job = ReportJob::new();
        assert!(!job.confirm_pending());

        job.prepare(body("{}"), DeliveryMode::Confirmed);
        assert!(!job.confirm_pending());

        job.submitted();
        assert!(job.confirm_pending());

        job.complete();
        assert!(!job.confirm_pending());
    }

    #[test]
    fn unconfirmed_never_reports_pending_confirm() {
        let mut job = ReportJob::new();
        job.prepare(body("{}"), DeliveryMode::Unconfirmed);
        job.submitted();
        assert!(!job.confirm_pending());
    }

    #[test]
    fn reset_clears_staged_body() {
        let mut job = ReportJob::new();
        job.prepare(body("{\"x\":1}"), DeliveryMode::Confirmed);
        job.reset();

        let req = job.request(NodeAddr::UNSPECIFIED, 5683, "/th12");
        assert_eq!(req.body, "");
        assert_eq!(req.mode, DeliveryMode::Unconfirmed);
    }
}
