//! Reserved transponder codes.

use std::fmt;

/// Kind of alert signalled by a reserved squawk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Hijack,
    RadioFailure,
    Emergency,
}

/// A recognised alert squawk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquawkAlert {
    pub code: &'static str,
    pub label: &'static str,
    pub severity: AlertSeverity,
}

const ALERTS: [SquawkAlert; 3] = [
    SquawkAlert {
        code: "7500",
        label: "Hijack",
        severity: AlertSeverity::Hijack,
    },
    SquawkAlert {
        code: "7600",
        label: "Radio Failure",
        severity: AlertSeverity::RadioFailure,
    },
    SquawkAlert {
        code: "7700",
        label: "Emergency",
        severity: AlertSeverity::Emergency,
    },
];

/// Look up the alert for a squawk code, if it is a reserved one.
pub fn squawk_alert(squawk: Option<&str>) -> Option<&'static SquawkAlert> {
    let code = squawk?;
    ALERTS.iter().find(|a| a.code == code)
}

impl fmt::Display for SquawkAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.code)
    }
}
