// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress reporting.
//
// Internal counters are turned into a single `ProgressUpdate` with one
// normalised percentage:
//
//   scanning   current_scan * 50 / total_scans   (25 when the total is unknown)
//   capturing  current_page * 50 / total_pages   (25 when the limit is unknown)
//   draining   50 + finished * 50 / submitted
//   saving     50 + saved * 50 / targets

use scanwerk_core::{ProgressStage, ProgressUpdate};

/// Which counter set the snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Orchestrator announcing or waiting for an invocation.
    Scanning,
    /// Pipeline pulling pages from the device.
    Capturing,
    /// Pipeline waiting for in-flight post-processing.
    Draining { finished: u32, submitted: u32 },
    /// Output routing.
    Saving { saved: u32, targets: u32 },
}

/// Counters at one meaningful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    pub current_scan: u32,
    pub total_scans: Option<u32>,
    pub current_page: u32,
    pub total_pages: Option<u32>,
    pub message: String,
}

fn share(current: u32, total: Option<u32>, unknown: u32) -> u32 {
    match total {
        Some(total) if total > 0 => (current.min(total) as u64 * 50 / total as u64) as u32,
        _ => unknown,
    }
}

/// Convert a snapshot into the update delivered to the caller's callback.
pub fn report(snapshot: &ProgressSnapshot) -> ProgressUpdate {
    let (stage, percent) = match snapshot.phase {
        ProgressPhase::Scanning => (
            ProgressStage::Scanning,
            share(snapshot.current_scan, snapshot.total_scans, 25),
        ),
        ProgressPhase::Capturing => (
            ProgressStage::Scanning,
            share(snapshot.current_page, snapshot.total_pages, 25),
        ),
        ProgressPhase::Draining {
            finished,
            submitted,
        } => (
            ProgressStage::Scanning,
            50 + share(finished, Some(submitted), 50),
        ),
        ProgressPhase::Saving { saved, targets } => (
            ProgressStage::Saving,
            50 + share(saved, Some(targets), 50),
        ),
    };

    ProgressUpdate {
        stage,
        current_scan: snapshot.current_scan,
        total_scans: snapshot.total_scans,
        current_page: snapshot.current_page,
        total_pages: snapshot.total_pages,
        message: snapshot.message.clone(),
        percent_complete: percent.min(100) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase: ProgressPhase) -> ProgressSnapshot {
        ProgressSnapshot {
            phase,
            current_scan: 0,
            total_scans: None,
            current_page: 0,
            total_pages: None,
            message: String::new(),
        }
    }

    #[test]
    fn scanning_is_proportional_to_invocations() {
        let mut s = snapshot(ProgressPhase::Scanning);
        s.current_scan = 2;
        s.total_scans = Some(5);
        let update = report(&s);
        assert_eq!(update.stage, ProgressStage::Scanning);
        assert_eq!(update.percent_complete, 20);
    }

    #[test]
    fn unknown_totals_report_quarter() {
        let mut s = snapshot(ProgressPhase::Scanning);
        s.current_scan = 1;
        assert_eq!(report(&s).percent_complete, 25);

        let mut s = snapshot(ProgressPhase::Capturing);
        s.current_page = 7;
        assert_eq!(report(&s).percent_complete, 25);
    }

    #[test]
    fn capture_stays_in_lower_half() {
        let mut s = snapshot(ProgressPhase::Capturing);
        s.current_page = 12;
        s.total_pages = Some(10);
        assert_eq!(report(&s).percent_complete, 50);
    }

    #[test]
    fn drain_moves_through_upper_half() {
        let s = snapshot(ProgressPhase::Draining {
            finished: 1,
            submitted: 4,
        });
        assert_eq!(report(&s).percent_complete, 62);

        let done = snapshot(ProgressPhase::Draining {
            finished: 0,
            submitted: 0,
        });
        assert_eq!(report(&done).percent_complete, 100);
    }

    #[test]
    fn saving_uses_saving_stage() {
        let s = snapshot(ProgressPhase::Saving {
            saved: 3,
            targets: 3,
        });
        let update = report(&s);
        assert_eq!(update.stage, ProgressStage::Saving);
        assert_eq!(update.percent_complete, 100);
    }
}
