//! Timing utilities for outbound request measurements.

use crate::proxy::types::TimingInfo;
use std::time::Instant;

fn span_ms(start: Option<Instant>, end: Option<Instant>) -> Option<u64> {
    match (start, end) {
        (Some(s), Some(e)) => Some(e.saturating_duration_since(s).as_millis() as u64),
        _ => None,
    }
}

/// Phase timestamps for a single outbound call.
///
/// The total window opens at construction (dispatch) and closes at
/// [`DetailedTiming::finish`]. Phases are recorded for the first hop only;
/// redirect hops only extend the total.
#[derive(Debug)]
pub struct DetailedTiming {
    pub dns_start: Option<Instant>,
    pub dns_end: Option<Instant>,
    pub tcp_start: Option<Instant>,
    pub tcp_end: Option<Instant>,
    pub tls_start: Option<Instant>,
    pub tls_end: Option<Instant>,
    pub request_start: Option<Instant>,
    pub ttfb: Option<Instant>,
    pub download_start: Option<Instant>,
    pub download_end: Option<Instant>,
    pub total_start: Instant,
    pub total_end: Option<Instant>,
}

impl DetailedTiming {
    /// Starts the total timer.
    pub fn new() -> Self {
        Self {
            dns_start: None,
            dns_end: None,
            tcp_start: None,
            tcp_end: None,
            tls_start: None,
            tls_end: None,
            request_start: None,
            ttfb: None,
            download_start: None,
            download_end: None,
            total_start: Instant::now(),
            total_end: None,
        }
    }

    /// Stops the total timer. Later calls keep the first stop time.
    pub fn finish(&mut self) {
        self.total_end.get_or_insert_with(Instant::now);
    }

    /// Elapsed milliseconds of the total window, up to now if not finished.
    pub fn total_ms(&self) -> u64 {
        self.total_end
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.total_start)
            .as_millis() as u64
    }

    pub fn to_timing_info(&self) -> TimingInfo {
        TimingInfo {
            total: self.total_ms(),
            dns: span_ms(self.dns_start, self.dns_end),
            tcp: span_ms(self.tcp_start, self.tcp_end),
            tls: span_ms(self.tls_start, self.tls_end),
            ttfb: span_ms(self.request_start, self.ttfb),
            download: span_ms(self.download_start, self.download_end),
        }
    }

    pub fn start_dns(&mut self) {
        self.dns_start = Some(Instant::now());
    }

    pub fn end_dns(&mut self) {
        self.dns_end = Some(Instant::now());
    }

    pub fn start_tcp(&mut self) {
        self.tcp_start = Some(Instant::now());
    }

    pub fn end_tcp(&mut self) {
        self.tcp_end = Some(Instant::now());
    }

    pub fn start_tls(&mut self) {
        self.tls_start = Some(Instant::now());
    }

    pub fn end_tls(&mut self) {
        self.tls_end = Some(Instant::now());
    }

    pub fn start_request(&mut self) {
        self.request_start = Some(Instant::now());
    }

    /// Marks the time to first byte (TTFB).
    pub fn mark_ttfb(&mut self) {
        self.ttfb = Some(Instant::now());
    }

    pub fn start_download(&mut self) {
        self.download_start = Some(Instant::now());
    }

    pub fn end_download(&mut self) {
        self.download_end = Some(Instant::now());
    }
}

impl Default for DetailedTiming {
    fn default() -> Self {
        Self::new()
    }
}
